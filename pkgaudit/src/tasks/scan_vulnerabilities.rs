use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::context::{Context, VulnReport};
use crate::error::{FatalError, ToolError};
use crate::finding::Severity;
use crate::pipeline::Task;
use crate::vuln::{self, VulnSeverity};

/// Scans the persisted SBOM for known vulnerabilities and turns each
/// deduplicated hit into a finding.
///
/// A missing scanner binary is a critical finding but not fatal: the audit
/// finishes with a zero score and the report says why. A scanner that ran
/// and failed degrades to a warning the same way.
pub struct ScanVulnerabilitiesTask {
    scanner: Arc<dyn crate::tools::VulnerabilityScanner>,
}

impl ScanVulnerabilitiesTask {
    pub fn new(scanner: Arc<dyn crate::tools::VulnerabilityScanner>) -> Self {
        Self { scanner }
    }
}

#[async_trait]
impl Task for ScanVulnerabilitiesTask {
    fn name(&self) -> &'static str {
        "scan_vulnerabilities"
    }

    fn status_message(&self, ctx: &Context) -> String {
        format!("Scanning {} for known vulnerabilities", ctx.package_name)
    }

    #[instrument(skip(self, ctx), fields(package = %ctx.package_name, scanner = self.scanner.name()))]
    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let Some(sbom_file) = ctx.sbom.as_ref().and_then(|s| s.file_path.clone()) else {
            return Err(FatalError::in_task(
                self.name(),
                "cannot scan for vulnerabilities: no SBOM file available",
            )
            .into());
        };

        let raw = match self.scanner.scan(&sbom_file).await {
            Ok(raw) => raw,
            Err(err @ ToolError::NotFound(_)) => {
                warn!(error = %err, "scanner unavailable, audit continues unscanned");
                let message = format!("vulnerability scan skipped: {err}");
                ctx.emit_error(&message);
                ctx.push_finding(self.name(), message, Severity::Critical);
                ctx.vulns = Some(VulnReport::empty());
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "scan failed");
                let message = format!("vulnerability scan failed: {err}");
                ctx.emit_error(&message);
                ctx.push_finding(self.name(), message, Severity::Warning);
                ctx.vulns = Some(VulnReport::empty());
                return Ok(());
            }
        };

        let processed = {
            let sbom = ctx.sbom.as_ref().map(|s| &s.raw);
            vuln::process_report(&raw, sbom)
        };
        match processed {
            Ok(summary) => {
                debug!(
                    matches = summary.total_matches,
                    unique = summary.unique_count(),
                    "scan complete"
                );
                for vulnerability in &summary.unique {
                    ctx.push_finding(
                        self.scanner.name(),
                        vulnerability.finding_message(),
                        Severity::from(vulnerability.severity),
                    );
                }
                for severity in VulnSeverity::ALL {
                    for vulnerability in summary.unique.iter().filter(|v| v.severity == severity) {
                        let line = format!("[{severity}] {}", vulnerability.finding_message());
                        if matches!(severity, VulnSeverity::Critical | VulnSeverity::High) {
                            ctx.emit_error(&line);
                        } else {
                            ctx.emit(&line);
                        }
                    }
                }
                let message = if summary.unique.is_empty() {
                    "no known vulnerabilities found".to_string()
                } else {
                    format!(
                        "found {} unique vulnerabilities ({} matches)",
                        summary.unique_count(),
                        summary.total_matches
                    )
                };
                ctx.push_finding(self.name(), message, Severity::Info);
            }
            Err(err) => {
                ctx.push_finding(
                    self.name(),
                    format!("could not parse scanner output: {err}"),
                    Severity::Warning,
                );
            }
        }

        ctx.vulns = Some(VulnReport::new(raw));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use serde_json::{json, Value};

    use crate::context::Sbom;
    use crate::package::RepoSource;
    use crate::tools::VulnerabilityScanner;

    struct StubScanner {
        outcome: std::sync::Mutex<Option<Result<Value, ToolError>>>,
    }

    impl StubScanner {
        fn with(outcome: Result<Value, ToolError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: std::sync::Mutex::new(Some(outcome)),
            })
        }
    }

    #[async_trait]
    impl VulnerabilityScanner for StubScanner {
        fn name(&self) -> &'static str {
            "stub-scanner"
        }

        async fn scan(&self, _sbom_file: &Path) -> Result<Value, ToolError> {
            self.outcome
                .lock()
                .unwrap()
                .take()
                .expect("scan called more than once")
        }
    }

    fn ctx_with_sbom_file() -> Context {
        let mut ctx = Context::new("demo", RepoSource::Pypi);
        ctx.sbom = Some(Sbom {
            raw: json!({ "components": [], "dependencies": [] }),
            file_path: Some(std::env::temp_dir().join("pkgaudit-test-sbom.json")),
        });
        ctx
    }

    #[tokio::test]
    async fn missing_sbom_file_is_fatal() {
        let task = ScanVulnerabilitiesTask::new(StubScanner::with(Ok(json!({}))));
        let mut ctx = Context::new("demo", RepoSource::Pypi);
        ctx.sbom = Some(Sbom {
            raw: json!({}),
            file_path: None,
        });

        let err = task.run(&mut ctx).await.unwrap_err();
        let fatal = err.downcast::<FatalError>().unwrap();
        assert_eq!(fatal.task.as_deref(), Some("scan_vulnerabilities"));
    }

    #[tokio::test]
    async fn missing_scanner_is_critical_but_not_fatal() {
        let task = ScanVulnerabilitiesTask::new(StubScanner::with(Err(ToolError::NotFound(
            "grype CLI not found (looked for 'grype'); install it from https://github.com/anchore/grype".into(),
        ))));
        let mut ctx = ctx_with_sbom_file();

        task.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.findings.len(), 1);
        assert_eq!(ctx.findings[0].severity, Severity::Critical);
        assert!(
            ctx.findings[0].message.contains("scan skipped"),
            "got: {}",
            ctx.findings[0].message
        );
        assert_eq!(
            ctx.vulns.unwrap().raw["matches"].as_array().unwrap().len(),
            0
        );
    }

    #[tokio::test]
    async fn failed_scan_degrades_to_warning() {
        let task = ScanVulnerabilitiesTask::new(StubScanner::with(Err(ToolError::Failed(
            "grype exited with exit status: 1".into(),
        ))));
        let mut ctx = ctx_with_sbom_file();

        task.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.findings.len(), 1);
        assert_eq!(ctx.findings[0].severity, Severity::Warning);
        assert!(ctx.vulns.is_some());
    }

    #[tokio::test]
    async fn findings_are_deduplicated_and_summarized() {
        let report = json!({
            "matches": [
                {
                    "vulnerability": { "id": "CVE-2024-1", "severity": "High" },
                    "artifact": { "name": "libfoo", "version": "1.0.0" },
                },
                {
                    "vulnerability": { "id": "CVE-2024-1", "severity": "High" },
                    "artifact": { "name": "libfoo", "version": "1.0.0" },
                },
            ],
        });
        let task = ScanVulnerabilitiesTask::new(StubScanner::with(Ok(report.clone())));
        let mut ctx = ctx_with_sbom_file();

        task.run(&mut ctx).await.unwrap();

        let vuln_findings: Vec<_> = ctx
            .findings
            .iter()
            .filter(|f| f.source == "stub-scanner")
            .collect();
        assert_eq!(vuln_findings.len(), 1);
        assert_eq!(vuln_findings[0].severity, Severity::High);
        assert!(
            vuln_findings[0].message.contains("CVE-2024-1"),
            "got: {}",
            vuln_findings[0].message
        );

        let summary = ctx.findings.last().unwrap();
        assert_eq!(summary.severity, Severity::Info);
        assert!(
            summary.message.contains("1 unique vulnerabilities (2 matches)"),
            "got: {}",
            summary.message
        );
        assert_eq!(ctx.vulns.unwrap().raw, report);
    }

    #[tokio::test]
    async fn clean_scan_reports_no_vulnerabilities() {
        let task = ScanVulnerabilitiesTask::new(StubScanner::with(Ok(json!({ "matches": [] }))));
        let mut ctx = ctx_with_sbom_file();

        task.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.findings.len(), 1);
        assert_eq!(ctx.findings[0].severity, Severity::Info);
        assert_eq!(ctx.findings[0].message, "no known vulnerabilities found");
    }
}
