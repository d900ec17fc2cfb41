use std::sync::Arc;

use crate::context::Context;
use crate::finding::{Finding, Severity};

/// Read-only inspection that turns collected audit state into findings.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &Context) -> Vec<Finding>;
}

/// Flags metadata hygiene problems: packages that declare no license or
/// point at no source repository.
pub struct MetadataAnalyzer;

impl Analyzer for MetadataAnalyzer {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn run(&self, ctx: &Context) -> Vec<Finding> {
        let Some(package) = ctx.package.as_ref() else {
            return vec![Finding::new(
                self.name(),
                "package metadata is missing, nothing to analyze",
                Severity::Info,
            )];
        };

        let mut findings = Vec::new();
        if package
            .license
            .as_deref()
            .map_or(true, |l| l.trim().is_empty())
        {
            findings.push(Finding::new(
                self.name(),
                format!("no license declared for {}", package.name),
                Severity::Low,
            ));
        }
        if package.repository_url().is_none() {
            findings.push(Finding::new(
                self.name(),
                format!("no repository URL declared for {}", package.name),
                Severity::Low,
            ));
        }
        findings.push(Finding::new(
            self.name(),
            format!(
                "analyzed metadata for {} version {}",
                package.name,
                package.version.as_deref().unwrap_or("unknown")
            ),
            Severity::Info,
        ));
        findings
    }
}

pub fn default_analyzers() -> Vec<Arc<dyn Analyzer>> {
    vec![Arc::new(MetadataAnalyzer)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PackageMetadata;
    use crate::package::RepoSource;

    #[test]
    fn missing_metadata_yields_single_info_finding() {
        let ctx = Context::new("ghost", RepoSource::Pypi);
        let findings = MetadataAnalyzer.run(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn flags_missing_license_and_repository() {
        let mut ctx = Context::new("demo", RepoSource::Pypi);
        ctx.package = Some(PackageMetadata {
            name: "demo".into(),
            version: Some("1.0.0".into()),
            ..PackageMetadata::default()
        });
        let findings = MetadataAnalyzer.run(&ctx);
        let lows: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.severity == Severity::Low)
            .collect();
        assert_eq!(lows.len(), 2);
        assert!(lows.iter().any(|f| f.message.contains("license")));
        assert!(lows.iter().any(|f| f.message.contains("repository")));
    }

    #[test]
    fn healthy_metadata_only_reports_analysis() {
        let mut ctx = Context::new("demo", RepoSource::Pypi);
        ctx.package = Some(PackageMetadata {
            name: "demo".into(),
            version: Some("1.0.0".into()),
            license: Some("MIT".into()),
            project_urls: vec![("Source".into(), "https://github.com/d/demo".into())],
            ..PackageMetadata::default()
        });
        let findings = MetadataAnalyzer.run(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.contains("1.0.0"));
    }

    #[test]
    fn blank_license_counts_as_missing() {
        let mut ctx = Context::new("demo", RepoSource::Pypi);
        ctx.package = Some(PackageMetadata {
            name: "demo".into(),
            license: Some("  ".into()),
            ..PackageMetadata::default()
        });
        let findings = MetadataAnalyzer.run(&ctx);
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Low && f.message.contains("license")));
    }

    #[test]
    fn default_set_contains_metadata_analyzer() {
        let analyzers = default_analyzers();
        assert_eq!(analyzers.len(), 1);
        assert_eq!(analyzers[0].name(), "metadata");
    }
}
