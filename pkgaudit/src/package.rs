use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::Serialize;

/// Package registry a subject package is audited from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoSource {
    Pypi,
    Npm,
    Rust,
}

impl RepoSource {
    /// Human-facing registry name, e.g. for status lines.
    pub fn registry_name(self) -> &'static str {
        match self {
            RepoSource::Pypi => "PyPI",
            RepoSource::Npm => "npm",
            RepoSource::Rust => "crates.io",
        }
    }
}

impl FromStr for RepoSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pypi" => Ok(RepoSource::Pypi),
            "npm" | "node" => Ok(RepoSource::Npm),
            "rust" | "crates" | "crates.io" | "cargo" => Ok(RepoSource::Rust),
            other => bail!("unknown package source '{other}' (expected pypi, npm or rust)"),
        }
    }
}

impl fmt::Display for RepoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepoSource::Pypi => "pypi",
            RepoSource::Npm => "npm",
            RepoSource::Rust => "rust",
        };
        write!(f, "{s}")
    }
}

/// A package to audit, optionally pinned to a version.
///
/// Parsed from `name` or `name@version`. npm scoped packages keep their
/// leading `@`, so only an `@` past the first character splits off a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub name: String,
    pub requested_version: Option<String>,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requested_version: None,
        }
    }

    pub fn with_version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requested_version: Some(version.into()),
        }
    }
}

impl FromStr for PackageRequest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            bail!("package name must not be empty");
        }
        match raw.rfind('@').filter(|&at| at > 0) {
            Some(at) => {
                let name = &raw[..at];
                let version = &raw[at + 1..];
                if version.is_empty() {
                    bail!("missing version after '@' in '{raw}'");
                }
                Ok(PackageRequest::with_version(name, version))
            }
            None => Ok(PackageRequest::new(raw)),
        }
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.requested_version {
            Some(version) => write!(f, "{}@{version}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
