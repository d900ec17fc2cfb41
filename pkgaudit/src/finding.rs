use std::fmt;

use serde::Serialize;

use crate::vuln::VulnSeverity;

/// Severity attached to a pipeline finding.
///
/// `Warning` marks a recoverable task failure rather than a vulnerability
/// level; vulnerability findings carry the scanner severity mapped through
/// [`VulnSeverity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Warning => "warning",
        };
        write!(f, "{s}")
    }
}

impl From<VulnSeverity> for Severity {
    fn from(severity: VulnSeverity) -> Self {
        match severity {
            VulnSeverity::Critical => Severity::Critical,
            VulnSeverity::High => Severity::High,
            VulnSeverity::Medium => Severity::Medium,
            VulnSeverity::Low => Severity::Low,
            VulnSeverity::Info => Severity::Info,
        }
    }
}

/// One observation produced while auditing a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub source: String,
    pub message: String,
    pub severity: Severity,
}

impl Finding {
    pub fn new(source: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.source, self.message)
    }
}
