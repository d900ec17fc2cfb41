use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::artifacts;
use crate::context::Context;
use crate::error::FatalError;
use crate::finding::Severity;
use crate::pipeline::Task;
use crate::report::ReportRenderer;

/// Renders the extracted report data to the artifacts directory.
pub struct GenerateReportTask {
    renderer: Arc<dyn ReportRenderer>,
}

impl GenerateReportTask {
    pub fn new(renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Task for GenerateReportTask {
    fn name(&self) -> &'static str {
        "generate_report"
    }

    fn status_message(&self, ctx: &Context) -> String {
        format!("Generating report for {}", ctx.package_name)
    }

    #[instrument(skip(self, ctx), fields(package = %ctx.package_name, renderer = self.renderer.name()))]
    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let Some(data) = ctx.report_data.as_ref() else {
            return Err(FatalError::in_task(
                self.name(),
                "cannot generate report: no report data extracted",
            )
            .into());
        };
        let out_dir = artifacts::artifacts_dir().map_err(|err| {
            FatalError::in_task(
                self.name(),
                format!("could not create artifacts directory: {err}"),
            )
        })?;
        let path = self
            .renderer
            .render(data, &ctx.package_name, &out_dir)
            .await
            .map_err(|err| {
                FatalError::in_task(self.name(), format!("could not render report: {err:#}"))
            })?;

        ctx.emit(&format!("Report written to {}", path.display()));
        if let Some(hint) = artifacts::host_hint(&path) {
            ctx.emit(&hint);
        }
        ctx.push_finding(
            self.name(),
            format!("report written to {}", path.display()),
            Severity::Info,
        );
        ctx.report_path = Some(path);
        Ok(())
    }
}
