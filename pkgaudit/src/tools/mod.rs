mod grype;
mod syft;

pub use grype::GrypeCli;
pub use syft::SyftCli;

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::ToolError;

pub(crate) const TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Produces a CycloneDX SBOM for a downloaded package artifact.
#[async_trait]
pub trait SbomGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, artifact: &Path) -> Result<Value, ToolError>;
}

/// Scans a persisted SBOM file for known vulnerabilities.
#[async_trait]
pub trait VulnerabilityScanner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scan(&self, sbom_file: &Path) -> Result<Value, ToolError>;
}

pub(crate) fn resolve_binary(
    binary: &str,
    tool: &str,
    install_hint: &str,
) -> Result<PathBuf, ToolError> {
    which::which(binary).map_err(|_| {
        ToolError::NotFound(format!(
            "{tool} CLI not found (looked for '{binary}'); install it from {install_hint}"
        ))
    })
}

pub(crate) async fn run_tool(binary: &Path, args: &[&str], tool: &str) -> Result<Output, ToolError> {
    let mut command = Command::new(binary);
    command.args(args).kill_on_drop(true);
    let output = timeout(TOOL_TIMEOUT, command.output())
        .await
        .map_err(|_| {
            ToolError::Failed(format!(
                "{tool} timed out after {} seconds",
                TOOL_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| ToolError::Failed(format!("failed to run {tool}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(ToolError::Failed(format!(
            "{tool} exited with {}: {detail}",
            output.status
        )));
    }
    Ok(output)
}

pub(crate) fn parse_tool_json(output: &Output, tool: &str) -> Result<Value, ToolError> {
    serde_json::from_slice(&output.stdout)
        .map_err(|e| ToolError::Failed(format!("failed to parse {tool} JSON output: {e}")))
}
