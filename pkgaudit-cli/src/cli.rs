use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

use pkgaudit::RepoSource;

/// Audit a package from a public registry: metadata, SBOM, known
/// vulnerabilities and a risk-scored report
#[derive(Parser)]
#[command(name = "pkgaudit", version)]
pub struct Cli {
    /// Package to audit, optionally pinned as name@version
    pub package: String,

    /// Package registry: pypi, npm or rust
    #[arg(short, long, default_value = "pypi")]
    pub source: RepoSource,

    /// Exact version to audit; overrides a name@version pin
    #[arg(long)]
    pub package_version: Option<String>,

    /// Print the audit summary as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Directory reports and SBOMs are written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_pypi() {
        let cli = Cli::parse_from(["pkgaudit", "requests"]);
        assert_eq!(cli.package, "requests");
        assert_eq!(cli.source, RepoSource::Pypi);
        assert!(!cli.json);
        assert_eq!(cli.package_version, None);
    }

    #[test]
    fn source_aliases_parse() {
        let cli = Cli::parse_from(["pkgaudit", "serde", "--source", "crates.io"]);
        assert_eq!(cli.source, RepoSource::Rust);
    }

    #[test]
    fn unknown_source_is_rejected() {
        let result = Cli::try_parse_from(["pkgaudit", "requests", "--source", "maven"]);
        assert!(result.is_err());
    }

    #[test]
    fn version_pin_and_flags() {
        let cli = Cli::parse_from([
            "pkgaudit",
            "left-pad",
            "-s",
            "npm",
            "--package-version",
            "1.3.0",
            "--json",
            "--output-dir",
            "/tmp/out",
        ]);
        assert_eq!(cli.source, RepoSource::Npm);
        assert_eq!(cli.package_version.as_deref(), Some("1.3.0"));
        assert!(cli.json);
        assert_eq!(cli.output_dir.as_deref(), Some(std::path::Path::new("/tmp/out")));
    }
}
