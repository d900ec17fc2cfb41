use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use super::{parse_tool_json, resolve_binary, run_tool, VulnerabilityScanner};
use crate::error::ToolError;

pub const GRYPE_BIN_ENV: &str = "PKGAUDIT_GRYPE_BIN";
const INSTALL_HINT: &str = "https://github.com/anchore/grype";

/// Adapter around the `grype` CLI; `PKGAUDIT_GRYPE_BIN` overrides the
/// binary name or points at an exact path.
pub struct GrypeCli {
    binary: String,
}

impl GrypeCli {
    pub fn new() -> Self {
        Self {
            binary: std::env::var(GRYPE_BIN_ENV).unwrap_or_else(|_| "grype".to_string()),
        }
    }
}

impl Default for GrypeCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VulnerabilityScanner for GrypeCli {
    fn name(&self) -> &'static str {
        "grype"
    }

    #[instrument(skip(self), fields(sbom = %sbom_file.display()))]
    async fn scan(&self, sbom_file: &Path) -> Result<Value, ToolError> {
        let binary = resolve_binary(&self.binary, self.name(), INSTALL_HINT)?;
        if !sbom_file.is_file() {
            return Err(ToolError::Failed(format!(
                "SBOM file does not exist: {}",
                sbom_file.display()
            )));
        }
        let source = format!("sbom:{}", sbom_file.display());
        let output = run_tool(&binary, &[&source, "-o", "json"], self.name()).await?;
        parse_tool_json(&output, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let tool = GrypeCli {
            binary: "pkgaudit-no-such-grype-binary".into(),
        };
        let err = tool.scan(Path::new("/tmp/sbom.json")).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)), "got: {err}");
    }

    #[tokio::test]
    async fn missing_sbom_file_is_failure() {
        let Ok(sh) = which::which("sh") else {
            return;
        };
        let tool = GrypeCli {
            binary: sh.to_string_lossy().into_owned(),
        };
        let err = tool
            .scan(Path::new("/no/such/sbom/file.json"))
            .await
            .unwrap_err();
        match err {
            ToolError::Failed(message) => {
                assert!(message.contains("does not exist"), "got: {message}")
            }
            other => panic!("expected Failed, got: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_stub_binary_and_parses_output() {
        use super::super::test_support::stub_script;

        let dir = tempfile::tempdir().unwrap();
        let script = stub_script(
            dir.path(),
            "fake-grype",
            r#"echo '{"matches": [{"vulnerability": {"id": "CVE-2024-1"}}]}'"#,
        );
        let sbom = dir.path().join("sbom.json");
        std::fs::write(&sbom, b"{}").unwrap();

        let tool = GrypeCli {
            binary: script.to_string_lossy().into_owned(),
        };
        let value = tool.scan(&sbom).await.unwrap();
        assert_eq!(value["matches"][0]["vulnerability"]["id"], "CVE-2024-1");
    }
}
