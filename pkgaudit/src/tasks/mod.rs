//! The audit task chain: fetch metadata, download the artifact, generate
//! and analyze an SBOM, scan it, then distill everything into a report.

mod download;
mod extract_report_data;
mod fetch;
mod generate_report;
mod generate_sbom;
mod run_analyses;
mod scan_vulnerabilities;

pub use download::DownloadTask;
pub use extract_report_data::ExtractReportDataTask;
pub use fetch::FetchTask;
pub use generate_report::GenerateReportTask;
pub use generate_sbom::GenerateSbomTask;
pub use run_analyses::RunAnalysesTask;
pub use scan_vulnerabilities::ScanVulnerabilitiesTask;
