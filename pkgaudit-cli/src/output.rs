use serde::Serialize;

use pkgaudit::{AuditResult, Finding, RepoSource};

/// Serialized view of one audit outcome.
#[derive(Serialize)]
struct AuditSummary<'a> {
    package: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    source: RepoSource,
    score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_path: Option<String>,
    findings: &'a [Finding],
}

impl<'a> AuditSummary<'a> {
    fn from_result(result: &'a AuditResult) -> Self {
        Self {
            package: &result.context.package_name,
            version: result.context.resolved_version(),
            source: result.context.source,
            score: result.score,
            report_path: result
                .report_path
                .as_ref()
                .map(|path| path.display().to_string()),
            findings: &result.context.findings,
        }
    }
}

pub trait OutputFormatter {
    fn write_result(
        &self,
        result: &AuditResult,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()>;
}

pub struct TextOutput;

impl OutputFormatter for TextOutput {
    fn write_result(
        &self,
        result: &AuditResult,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let ctx = &result.context;
        writeln!(
            writer,
            "{} ({})",
            ctx.package_name,
            ctx.source.registry_name()
        )?;
        if let Some(version) = ctx.resolved_version() {
            writeln!(writer, "  version: {version}")?;
        }
        writeln!(writer, "  risk score: {}", result.score)?;
        match &result.report_path {
            Some(path) => writeln!(writer, "  report: {}", path.display())?,
            None => writeln!(writer, "  report: not generated")?,
        }
        if ctx.findings.is_empty() {
            writeln!(writer, "  findings: none")?;
        } else {
            writeln!(writer, "  findings:")?;
            for finding in &ctx.findings {
                writeln!(writer, "    {finding}")?;
            }
        }
        Ok(())
    }
}

pub struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn write_result(
        &self,
        result: &AuditResult,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, &AuditSummary::from_result(result))?;
        writeln!(writer)?;
        Ok(())
    }
}

pub fn formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput)
    } else {
        Box::new(TextOutput)
    }
}
