use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tracing::instrument;

use super::{parse_tool_json, resolve_binary, run_tool, SbomGenerator};
use crate::error::ToolError;

pub const SYFT_BIN_ENV: &str = "PKGAUDIT_SYFT_BIN";
const INSTALL_HINT: &str = "https://github.com/anchore/syft";

/// Adapter around the `syft` CLI. The binary is looked up per call so a
/// tool installed mid-session is picked up; `PKGAUDIT_SYFT_BIN` overrides
/// the name or points at an exact path.
pub struct SyftCli {
    binary: String,
}

impl SyftCli {
    pub fn new() -> Self {
        Self {
            binary: std::env::var(SYFT_BIN_ENV).unwrap_or_else(|_| "syft".to_string()),
        }
    }
}

impl Default for SyftCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SbomGenerator for SyftCli {
    fn name(&self) -> &'static str {
        "syft"
    }

    #[instrument(skip(self), fields(artifact = %artifact.display()))]
    async fn generate(&self, artifact: &Path) -> Result<Value, ToolError> {
        let binary = resolve_binary(&self.binary, self.name(), INSTALL_HINT)?;
        if !artifact.exists() {
            return Err(ToolError::Failed(format!(
                "artifact path does not exist: {}",
                artifact.display()
            )));
        }

        // Wheels are zip archives; syft catalogues them much better as an
        // unpacked directory than as an opaque file.
        let mut wheel_scratch: Option<TempDir> = None;
        let source = if artifact.is_dir() {
            format!("dir:{}", artifact.display())
        } else if is_wheel(artifact) {
            let scratch = unpack_wheel(artifact).await?;
            let source = format!("dir:{}", scratch.path().display());
            wheel_scratch = Some(scratch);
            source
        } else {
            format!("file:{}", artifact.display())
        };

        let result = run_tool(&binary, &[&source, "-o", "cyclonedx-json"], self.name()).await;
        drop(wheel_scratch);
        parse_tool_json(&result?, self.name())
    }
}

fn is_wheel(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("whl"))
}

async fn unpack_wheel(wheel: &Path) -> Result<TempDir, ToolError> {
    let wheel = wheel.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let scratch = tempfile::Builder::new()
            .prefix("pkgaudit-wheel-")
            .tempdir()
            .map_err(|e| ToolError::Failed(format!("failed to create scratch dir: {e}")))?;
        let file = std::fs::File::open(&wheel).map_err(|e| {
            ToolError::Failed(format!("failed to open wheel {}: {e}", wheel.display()))
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            ToolError::Failed(format!("failed to read wheel {}: {e}", wheel.display()))
        })?;
        archive.extract(scratch.path()).map_err(|e| {
            ToolError::Failed(format!("failed to unpack wheel {}: {e}", wheel.display()))
        })?;
        Ok(scratch)
    })
    .await
    .map_err(|e| ToolError::Failed(format!("wheel unpack task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_detection_by_extension() {
        assert!(is_wheel(Path::new("demo-1.0.0-py3-none-any.whl")));
        assert!(is_wheel(Path::new("demo-1.0.0-py3-none-any.WHL")));
        assert!(!is_wheel(Path::new("demo-1.0.0.tar.gz")));
        assert!(!is_wheel(Path::new("demo")));
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let tool = SyftCli {
            binary: "pkgaudit-no-such-syft-binary".into(),
        };
        let err = tool.generate(Path::new("/tmp")).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_stub_binary_and_parses_output() {
        use super::super::test_support::stub_script;

        let dir = tempfile::tempdir().unwrap();
        let script = stub_script(
            dir.path(),
            "fake-syft",
            r#"echo '{"components": [{"name": "demo"}], "dependencies": []}'"#,
        );
        let artifact = dir.path().join("artifact.tar.gz");
        std::fs::write(&artifact, b"not really a tarball").unwrap();

        let tool = SyftCli {
            binary: script.to_string_lossy().into_owned(),
        };
        let value = tool.generate(&artifact).await.unwrap();
        assert_eq!(value["components"][0]["name"], "demo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_binary_reports_stderr() {
        use super::super::test_support::stub_script;

        let dir = tempfile::tempdir().unwrap();
        let script = stub_script(dir.path(), "fake-syft", "echo 'boom' >&2; exit 3");
        let artifact = dir.path().join("artifact.bin");
        std::fs::write(&artifact, b"x").unwrap();

        let tool = SyftCli {
            binary: script.to_string_lossy().into_owned(),
        };
        let err = tool.generate(&artifact).await.unwrap_err();
        match err {
            ToolError::Failed(message) => assert!(message.contains("boom"), "got: {message}"),
            other => panic!("expected Failed, got: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_failure_not_not_found() {
        // Needs a real binary on PATH so resolution succeeds first.
        let Ok(sh) = which::which("sh") else {
            return;
        };
        let tool = SyftCli {
            binary: sh.to_string_lossy().into_owned(),
        };
        let err = tool
            .generate(Path::new("/definitely/not/a/real/path"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)), "got: {err}");
    }
}
