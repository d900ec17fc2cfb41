pub mod analyzer;
pub mod artifacts;
pub mod context;
pub mod error;
pub mod finding;
pub mod metadata;
pub mod package;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod report;
pub mod sbom;
pub mod score;
pub mod tasks;
pub mod tools;
pub mod vuln;

pub use analyzer::{default_analyzers, Analyzer, MetadataAnalyzer};
pub use context::{AuditResult, Context, DownloadInfo, Sbom, VulnReport};
pub use error::{FatalError, RegistryError, ToolError};
pub use finding::{Finding, Severity};
pub use metadata::PackageMetadata;
pub use package::{PackageRequest, RepoSource};
pub use pipeline::{
    run_chain, run_pipeline, surrounding_status_messages, task_chain, Task, TaskRegistry,
};
pub use progress::{ChannelSink, ProgressMessage, ProgressSink, TracingSink};
pub use report::{JsonReportRenderer, ReportData, ReportRenderer};
pub use sbom::{analyze_sbom, SbomAnalysis};
pub use score::{risk_score, score_context};
pub use vuln::{process_report, SeverityCounts, UniqueVulnerability, VulnSeverity, VulnSummary};
