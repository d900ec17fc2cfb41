use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::artifacts;
use crate::context::{Context, Sbom};
use crate::error::FatalError;
use crate::finding::Severity;
use crate::pipeline::Task;
use crate::sbom;
use crate::tools::SbomGenerator;

/// Generates a CycloneDX SBOM for the downloaded artifact and persists it
/// to the artifacts directory.
///
/// Generation failures are fatal. A persistence failure only degrades the
/// audit: analysis still runs on the in-memory document, scanning will
/// later halt on the missing file.
pub struct GenerateSbomTask {
    generator: Arc<dyn SbomGenerator>,
}

impl GenerateSbomTask {
    pub fn new(generator: Arc<dyn SbomGenerator>) -> Self {
        Self { generator }
    }

    async fn persist(&self, ctx: &Context, raw: &Value) -> anyhow::Result<PathBuf> {
        let dir = artifacts::artifacts_dir().context("could not create artifacts directory")?;
        let slug = artifacts::artifact_slug(&ctx.package_name);
        let file_name = match ctx.resolved_version() {
            Some(version) => format!("pkgaudit-{slug}-{version}-sbom.json"),
            None => format!("pkgaudit-{slug}-sbom.json"),
        };
        let path = dir.join(file_name);
        let body = serde_json::to_vec_pretty(raw).context("could not serialize SBOM")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("could not write SBOM to {}", path.display()))?;
        Ok(path)
    }
}

#[async_trait]
impl Task for GenerateSbomTask {
    fn name(&self) -> &'static str {
        "generate_sbom"
    }

    fn status_message(&self, ctx: &Context) -> String {
        format!("Generating SBOM for {}", ctx.package_name)
    }

    #[instrument(skip(self, ctx), fields(package = %ctx.package_name, generator = self.generator.name()))]
    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let Some(artifact) = ctx.download.as_ref().and_then(|d| d.local_path.clone()) else {
            return Err(FatalError::in_task(
                self.name(),
                "cannot generate SBOM: no downloaded artifact",
            )
            .into());
        };

        let raw = self
            .generator
            .generate(&artifact)
            .await
            .map_err(|err| FatalError::in_task(self.name(), err.to_string()))?;

        let component_count = raw
            .get("components")
            .and_then(Value::as_array)
            .map(|components| components.len())
            .unwrap_or(0);
        debug!(components = component_count, "SBOM generated");

        let file_path = match self.persist(ctx, &raw).await {
            Ok(path) => {
                ctx.emit(&format!("SBOM written to {}", path.display()));
                Some(path)
            }
            Err(err) => {
                let message = format!("could not persist SBOM: {err:#}");
                ctx.emit_error(&message);
                ctx.push_finding(self.name(), message, Severity::Warning);
                None
            }
        };

        if component_count == 0 {
            ctx.push_finding(
                self.name(),
                "SBOM is empty (0 components found), downstream results will be limited",
                Severity::Warning,
            );
        } else {
            ctx.push_finding(
                self.name(),
                format!("generated SBOM with {component_count} components"),
                Severity::Info,
            );
        }

        match sbom::analyze_sbom(&raw, ctx.package.as_ref()) {
            Ok(analysis) => {
                ctx.emit(&format!("Components: {}", analysis.total_components));
                ctx.emit(&format!(
                    "Direct dependencies: {}",
                    analysis.direct_dependencies
                ));
                ctx.emit(&format!(
                    "Transitive dependencies: {}",
                    analysis.transitive_dependencies
                ));
                ctx.emit(&format!("Max dependency depth: {}", analysis.max_depth));
                ctx.emit(&format!("Unique licenses: {}", analysis.unique_licenses));
            }
            Err(err) => debug!(error = %err, "structural analysis skipped"),
        }

        ctx.sbom = Some(Sbom { raw, file_path });
        Ok(())
    }
}
