use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Serialize;

use crate::artifacts;
use crate::context::Context;
use crate::package::RepoSource;
use crate::sbom::SbomAnalysis;
use crate::vuln::{VulnSeverity, VulnSummary};

/// Flattened, render-ready view of one audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
    pub package_name: String,
    pub package_version: String,
    pub package_source: RepoSource,
    pub package_url: String,
    pub repository_health: RepositoryHealth,
    /// None when no SBOM was produced or it could not be analyzed.
    pub components: Option<ComponentMetrics>,
    /// None when no vulnerability scan ran or its output was unreadable.
    pub vulnerabilities: Option<VulnerabilityMetrics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryHealth {
    pub repository: String,
    pub license: String,
    pub total_releases: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentMetrics {
    pub total_components: usize,
    pub dependency_depth: usize,
    pub direct_dependencies: usize,
    pub transitive_dependencies: usize,
}

impl From<&SbomAnalysis> for ComponentMetrics {
    fn from(analysis: &SbomAnalysis) -> Self {
        Self {
            total_components: analysis.total_components,
            dependency_depth: analysis.max_depth,
            direct_dependencies: analysis.direct_dependencies,
            transitive_dependencies: analysis.transitive_dependencies,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VulnerabilityMetrics {
    pub total_matches: usize,
    pub unique_vulnerabilities: usize,
    pub critical_severity: usize,
    pub high_severity: usize,
    pub moderate_severity: usize,
    pub low_severity: usize,
    pub vulnerabilities_found: Vec<VulnerabilityEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VulnerabilityEntry {
    pub id: String,
    pub package: String,
    pub version: String,
    pub severity: VulnSeverity,
}

impl VulnerabilityMetrics {
    pub fn from_summary(summary: &VulnSummary) -> Self {
        Self {
            total_matches: summary.total_matches,
            unique_vulnerabilities: summary.unique_count(),
            critical_severity: summary.severity_counts.critical,
            high_severity: summary.severity_counts.high,
            moderate_severity: summary.severity_counts.medium,
            low_severity: summary.severity_counts.low,
            vulnerabilities_found: summary
                .unique
                .iter()
                .map(|v| VulnerabilityEntry {
                    id: v.id.clone(),
                    package: v.package.clone(),
                    version: v.version.clone(),
                    severity: v.severity,
                })
                .collect(),
        }
    }
}

impl ReportData {
    /// Builds report data from whatever the pipeline managed to collect,
    /// with explicit placeholders where data is missing.
    pub fn assemble(
        ctx: &Context,
        components: Option<ComponentMetrics>,
        vulnerabilities: Option<VulnerabilityMetrics>,
    ) -> Self {
        let package = ctx.package.as_ref();
        let package_version = ctx
            .resolved_version()
            .map(str::to_string)
            .unwrap_or_else(|| "N/A".to_string());

        let package_url = package
            .and_then(|p| p.homepage.clone())
            .or_else(|| package.and_then(|p| p.homepage_like_url().map(str::to_string)))
            .or_else(|| {
                package.and_then(|p| p.project_urls.first().map(|(_, url)| url.clone()))
            })
            .or_else(|| ctx.download.as_ref().map(|d| d.url.clone()))
            .or_else(|| {
                (ctx.source == RepoSource::Pypi)
                    .then(|| format!("https://pypi.org/project/{}/", ctx.package_name))
            })
            .unwrap_or_else(|| "N/A".to_string());

        let repository_health = RepositoryHealth {
            repository: package
                .and_then(|p| p.repository_url().map(str::to_string))
                .unwrap_or_else(|| "None found".to_string()),
            license: package
                .and_then(|p| p.license.clone())
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| "No license found".to_string()),
            total_releases: package.and_then(|p| p.release_count),
        };

        Self {
            package_name: ctx.package_name.clone(),
            package_version,
            package_source: ctx.source,
            package_url,
            repository_health,
            components,
            vulnerabilities,
        }
    }
}

/// Renders assembled report data to a file and returns its path.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(
        &self,
        data: &ReportData,
        package_name: &str,
        out_dir: &Path,
    ) -> anyhow::Result<PathBuf>;

    fn name(&self) -> &'static str;
}

/// Writes the report as pretty-printed JSON.
pub struct JsonReportRenderer;

#[async_trait]
impl ReportRenderer for JsonReportRenderer {
    async fn render(
        &self,
        data: &ReportData,
        package_name: &str,
        out_dir: &Path,
    ) -> anyhow::Result<PathBuf> {
        let path = out_dir.join(format!(
            "pkgaudit-{}-report.json",
            artifacts::artifact_slug(package_name)
        ));
        let body = serde_json::to_vec_pretty(data).context("failed to serialize report")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PackageMetadata;
    use serde_json::json;

    #[test]
    fn assemble_uses_placeholders_for_empty_context() {
        let ctx = Context::new("ghost", RepoSource::Npm);
        let data = ReportData::assemble(&ctx, None, None);
        assert_eq!(data.package_version, "N/A");
        assert_eq!(data.package_url, "N/A");
        assert_eq!(data.repository_health.repository, "None found");
        assert_eq!(data.repository_health.license, "No license found");
        assert_eq!(data.repository_health.total_releases, None);
        assert_eq!(data.components, None);
        assert_eq!(data.vulnerabilities, None);
    }

    #[test]
    fn assemble_constructs_pypi_url_as_last_resort() {
        let ctx = Context::new("requests", RepoSource::Pypi);
        let data = ReportData::assemble(&ctx, None, None);
        assert_eq!(data.package_url, "https://pypi.org/project/requests/");
    }

    #[test]
    fn assemble_prefers_homepage_over_constructed_url() {
        let mut ctx = Context::new("requests", RepoSource::Pypi);
        ctx.package = Some(PackageMetadata {
            name: "requests".into(),
            homepage: Some("https://requests.readthedocs.io".into()),
            ..PackageMetadata::default()
        });
        let data = ReportData::assemble(&ctx, None, None);
        assert_eq!(data.package_url, "https://requests.readthedocs.io");
    }

    #[test]
    fn assemble_falls_back_to_download_url() {
        let mut ctx = Context::new("left-pad", RepoSource::Npm);
        ctx.download = Some(crate::context::DownloadInfo {
            url: "https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz".into(),
            filename: "left-pad-1.3.0.tgz".into(),
            package_type: "npm-tarball".into(),
            local_path: None,
        });
        let data = ReportData::assemble(&ctx, None, None);
        assert_eq!(
            data.package_url,
            "https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz"
        );
    }

    #[test]
    fn assemble_reads_repository_and_license_from_metadata() {
        let mut ctx = Context::new("requests", RepoSource::Pypi).with_requested_version("2.31.0");
        ctx.package = Some(PackageMetadata {
            name: "requests".into(),
            version: Some("2.31.0".into()),
            project_urls: vec![("Source".into(), "https://github.com/psf/requests".into())],
            license: Some("Apache 2.0".into()),
            release_count: Some(50),
            ..PackageMetadata::default()
        });
        let data = ReportData::assemble(&ctx, None, None);
        assert_eq!(data.package_version, "2.31.0");
        assert_eq!(
            data.repository_health.repository,
            "https://github.com/psf/requests"
        );
        assert_eq!(data.repository_health.license, "Apache 2.0");
        assert_eq!(data.repository_health.total_releases, Some(50));
    }

    #[test]
    fn blank_license_counts_as_missing() {
        let mut ctx = Context::new("demo", RepoSource::Pypi);
        ctx.package = Some(PackageMetadata {
            name: "demo".into(),
            license: Some("   ".into()),
            ..PackageMetadata::default()
        });
        let data = ReportData::assemble(&ctx, None, None);
        assert_eq!(data.repository_health.license, "No license found");
    }

    #[test]
    fn metrics_from_summary_counts_severities() {
        let raw = json!({
            "matches": [
                {
                    "vulnerability": { "id": "CVE-1", "severity": "critical" },
                    "artifact": { "name": "a", "version": "1" },
                },
                {
                    "vulnerability": { "id": "CVE-2", "severity": "medium" },
                    "artifact": { "name": "b", "version": "2" },
                },
            ],
        });
        let summary = crate::vuln::process_report(&raw, None).unwrap();
        let metrics = VulnerabilityMetrics::from_summary(&summary);
        assert_eq!(metrics.total_matches, 2);
        assert_eq!(metrics.unique_vulnerabilities, 2);
        assert_eq!(metrics.critical_severity, 1);
        assert_eq!(metrics.moderate_severity, 1);
        assert_eq!(metrics.vulnerabilities_found.len(), 2);
        assert_eq!(metrics.vulnerabilities_found[0].id, "CVE-1");
    }

    #[tokio::test]
    async fn json_renderer_writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new("@scope/pkg", RepoSource::Npm);
        let data = ReportData::assemble(&ctx, None, None);

        let path = JsonReportRenderer
            .render(&data, "@scope/pkg", dir.path())
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "pkgaudit-scope-pkg-report.json"
        );

        let body: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(body["package_name"], "@scope/pkg");
        assert_eq!(body["package_source"], "npm");
        assert_eq!(body["repository_health"]["license"], "No license found");
    }
}
