use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::finding::{Finding, Severity};
use crate::metadata::PackageMetadata;
use crate::package::{PackageRequest, RepoSource};
use crate::progress::ProgressSink;
use crate::report::ReportData;

/// Where and how a package artifact can be (or was) downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
    pub url: String,
    pub filename: String,
    /// Registry-specific artifact kind: `bdist_wheel`, `sdist`,
    /// `npm-tarball` or `rust-crate`.
    pub package_type: String,
    /// Set once the artifact has been fetched: the downloaded file, or the
    /// extracted directory for tarball artifacts.
    pub local_path: Option<PathBuf>,
}

/// A generated SBOM plus where it was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sbom {
    pub raw: Value,
    /// None when the document could not be written to the artifacts
    /// directory; scanning needs the file, analysis only needs `raw`.
    pub file_path: Option<PathBuf>,
}

/// Raw scanner output, kept verbatim so later consumers can re-derive
/// whatever view they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulnReport {
    pub raw: Value,
}

impl VulnReport {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Report with zero matches, used when scanning was skipped.
    pub fn empty() -> Self {
        Self {
            raw: serde_json::json!({ "matches": [] }),
        }
    }
}

/// Mutable state threaded through the task chain.
pub struct Context {
    pub package_name: String,
    pub requested_version: Option<String>,
    pub source: RepoSource,
    pub package: Option<PackageMetadata>,
    pub download: Option<DownloadInfo>,
    pub sbom: Option<Sbom>,
    pub vulns: Option<VulnReport>,
    pub findings: Vec<Finding>,
    pub report_data: Option<ReportData>,
    pub report_path: Option<PathBuf>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Context {
    pub fn new(package_name: impl Into<String>, source: RepoSource) -> Self {
        Self {
            package_name: package_name.into(),
            requested_version: None,
            source,
            package: None,
            download: None,
            sbom: None,
            vulns: None,
            findings: Vec::new(),
            report_data: None,
            report_path: None,
            sink: None,
        }
    }

    pub fn from_request(request: PackageRequest, source: RepoSource) -> Self {
        let mut ctx = Self::new(request.name, source);
        ctx.requested_version = request.requested_version;
        ctx
    }

    pub fn with_requested_version(mut self, version: impl Into<String>) -> Self {
        self.requested_version = Some(version.into());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The version the audit is actually operating on: the registry-resolved
    /// version when metadata is present, otherwise whatever was requested.
    pub fn resolved_version(&self) -> Option<&str> {
        self.package
            .as_ref()
            .and_then(|p| p.version.as_deref())
            .or(self.requested_version.as_deref())
    }

    pub fn push_finding(&mut self, source: &str, message: impl Into<String>, severity: Severity) {
        self.findings.push(Finding::new(source, message, severity));
    }

    pub fn has_critical_finding(&self) -> bool {
        self.findings.iter().any(Finding::is_critical)
    }

    pub fn emit(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.write(message);
        }
    }

    pub fn emit_error(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.write_error(message);
        }
    }

    pub fn emit_status(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.status(message);
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("package_name", &self.package_name)
            .field("requested_version", &self.requested_version)
            .field("source", &self.source)
            .field("package", &self.package)
            .field("download", &self.download)
            .field("sbom", &self.sbom)
            .field("vulns", &self.vulns)
            .field("findings", &self.findings)
            .field("report_data", &self.report_data)
            .field("report_path", &self.report_path)
            .finish_non_exhaustive()
    }
}

/// Outcome of a pipeline run. Always produced, even when the chain halted
/// early; `context.findings` then explains how far it got.
#[derive(Debug)]
pub struct AuditResult {
    pub context: Context,
    pub score: u32,
    pub report_path: Option<PathBuf>,
}

impl AuditResult {
    pub fn has_critical_finding(&self) -> bool {
        self.context.has_critical_finding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ChannelSink, ProgressMessage};

    #[test]
    fn resolved_version_prefers_registry_metadata() {
        let mut ctx = Context::new("serde", RepoSource::Rust).with_requested_version("0.9.0");
        assert_eq!(ctx.resolved_version(), Some("0.9.0"));

        ctx.package = Some(PackageMetadata {
            name: "serde".into(),
            version: Some("1.0.200".into()),
            ..PackageMetadata::default()
        });
        assert_eq!(ctx.resolved_version(), Some("1.0.200"));
    }

    #[test]
    fn resolved_version_none_without_any_source() {
        let ctx = Context::new("serde", RepoSource::Rust);
        assert_eq!(ctx.resolved_version(), None);
    }

    #[test]
    fn from_request_carries_version() {
        let request = "left-pad@1.3.0".parse::<PackageRequest>().unwrap();
        let ctx = Context::from_request(request, RepoSource::Npm);
        assert_eq!(ctx.package_name, "left-pad");
        assert_eq!(ctx.requested_version.as_deref(), Some("1.3.0"));
    }

    #[test]
    fn emit_goes_to_sink_when_attached() {
        let (sink, mut rx) = ChannelSink::new();
        let ctx = Context::new("demo", RepoSource::Pypi).with_sink(Arc::new(sink));
        ctx.emit("hello");
        ctx.emit_status("Fetch");
        assert_eq!(rx.try_recv().unwrap(), ProgressMessage::Info("hello".into()));
        assert_eq!(rx.try_recv().unwrap(), ProgressMessage::Status("Fetch".into()));
    }

    #[test]
    fn emit_without_sink_is_a_no_op() {
        let ctx = Context::new("demo", RepoSource::Pypi);
        ctx.emit("nobody home");
        ctx.emit_error("still nobody");
    }

    #[test]
    fn critical_finding_detection() {
        let mut ctx = Context::new("demo", RepoSource::Pypi);
        assert!(!ctx.has_critical_finding());
        ctx.push_finding("pipeline", "boom", Severity::Critical);
        assert!(ctx.has_critical_finding());
    }

    #[test]
    fn empty_vuln_report_has_no_matches() {
        let report = VulnReport::empty();
        assert_eq!(report.raw["matches"].as_array().unwrap().len(), 0);
    }
}
