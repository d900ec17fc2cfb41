use async_trait::async_trait;
use tracing::instrument;

use crate::context::Context;
use crate::finding::Severity;
use crate::pipeline::Task;
use crate::report::{ComponentMetrics, ReportData, VulnerabilityMetrics};
use crate::sbom;
use crate::vuln;

/// Distills everything the chain collected into the structured report
/// payload.
///
/// Never fatal: whatever cannot be derived is left out of the report with
/// a warning, and placeholders cover missing metadata.
pub struct ExtractReportDataTask;

#[async_trait]
impl Task for ExtractReportDataTask {
    fn name(&self) -> &'static str {
        "extract_report_data"
    }

    fn status_message(&self, _ctx: &Context) -> String {
        "Extracting report data".to_string()
    }

    #[instrument(skip(self, ctx), fields(package = %ctx.package_name))]
    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let analyzed = ctx
            .sbom
            .as_ref()
            .map(|s| sbom::analyze_sbom(&s.raw, ctx.package.as_ref()));
        let components = match analyzed {
            Some(Ok(analysis)) => Some(ComponentMetrics::from(&analysis)),
            Some(Err(err)) => {
                ctx.push_finding(
                    self.name(),
                    format!("could not analyze SBOM: {err}"),
                    Severity::Warning,
                );
                None
            }
            None => None,
        };

        let processed = ctx.vulns.as_ref().map(|report| {
            let sbom = ctx.sbom.as_ref().map(|s| &s.raw);
            vuln::process_report(&report.raw, sbom)
        });
        let vulnerabilities = match processed {
            Some(Ok(summary)) => Some(VulnerabilityMetrics::from_summary(&summary)),
            Some(Err(err)) => {
                ctx.push_finding(
                    self.name(),
                    format!("could not process vulnerability data: {err}"),
                    Severity::Warning,
                );
                None
            }
            None => None,
        };

        ctx.report_data = Some(ReportData::assemble(ctx, components, vulnerabilities));
        ctx.push_finding(self.name(), "extracted report data", Severity::Info);
        Ok(())
    }
}
