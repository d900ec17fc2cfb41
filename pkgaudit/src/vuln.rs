use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const DESCRIPTION_LIMIT: usize = 100;

/// Scanner-reported severity, normalized.
///
/// `from_scanner` is total: unrecognized, empty or missing severities all
/// land on `Info` so one odd match can never sink the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl VulnSeverity {
    /// Most to least severe, the order reports list severities in.
    pub const ALL: [VulnSeverity; 5] = [
        VulnSeverity::Critical,
        VulnSeverity::High,
        VulnSeverity::Medium,
        VulnSeverity::Low,
        VulnSeverity::Info,
    ];

    pub fn from_scanner(raw: Option<&str>) -> Self {
        match raw.unwrap_or("").trim().to_ascii_lowercase().as_str() {
            "critical" => VulnSeverity::Critical,
            "high" => VulnSeverity::High,
            "medium" => VulnSeverity::Medium,
            "low" => VulnSeverity::Low,
            _ => VulnSeverity::Info,
        }
    }

    /// Contribution of one unique vulnerability to the risk score.
    pub fn weight(self) -> u32 {
        match self {
            VulnSeverity::Critical => 10,
            VulnSeverity::High => 5,
            VulnSeverity::Medium => 2,
            VulnSeverity::Low => 1,
            VulnSeverity::Info => 0,
        }
    }
}

impl fmt::Display for VulnSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VulnSeverity::Critical => "critical",
            VulnSeverity::High => "high",
            VulnSeverity::Medium => "medium",
            VulnSeverity::Low => "low",
            VulnSeverity::Info => "info",
        };
        write!(f, "{s}")
    }
}

/// Unique-vulnerability tally per severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: VulnSeverity) {
        match severity {
            VulnSeverity::Critical => self.critical += 1,
            VulnSeverity::High => self.high += 1,
            VulnSeverity::Medium => self.medium += 1,
            VulnSeverity::Low => self.low += 1,
            VulnSeverity::Info => self.info += 1,
        }
    }

    pub fn get(&self, severity: VulnSeverity) -> usize {
        match severity {
            VulnSeverity::Critical => self.critical,
            VulnSeverity::High => self.high,
            VulnSeverity::Medium => self.medium,
            VulnSeverity::Low => self.low,
            VulnSeverity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// One deduplicated vulnerability: a (vulnerability id, artifact name,
/// artifact version) group collapsed to a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueVulnerability {
    pub id: String,
    pub package: String,
    pub version: String,
    pub severity: VulnSeverity,
    pub fixed_version: Option<String>,
    /// `bom-ref` of the matching SBOM component, when one could be linked.
    pub component_ref: Option<String>,
    /// How many raw matches collapsed into this record.
    pub match_count: usize,
    pub description: Option<String>,
}

impl UniqueVulnerability {
    /// Finding message for this vulnerability.
    pub fn finding_message(&self) -> String {
        let mut message = format!("{}: {}@{}", self.id, self.package, self.version);
        match &self.fixed_version {
            Some(version) => message.push_str(&format!(" (fixed in {version})")),
            None => message.push_str(" (no fix available)"),
        }
        if self.match_count > 1 {
            message.push_str(&format!(" affects {} components", self.match_count));
        }
        if let Some(bom_ref) = &self.component_ref {
            message.push_str(&format!(" [sbom: {bom_ref}]"));
        }
        if let Some(description) = &self.description {
            message.push_str(&format!(" - {}", truncate(description, DESCRIPTION_LIMIT)));
        }
        message
    }
}

/// Deduplicated view of one scanner report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VulnSummary {
    pub total_matches: usize,
    pub unique: Vec<UniqueVulnerability>,
    pub severity_counts: SeverityCounts,
}

impl VulnSummary {
    pub fn unique_count(&self) -> usize {
        self.unique.len()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ScannerReport {
    #[serde(default)]
    matches: Vec<ScannerMatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ScannerMatch {
    #[serde(default)]
    vulnerability: ScannerVulnerability,
    #[serde(default)]
    artifact: ScannerArtifact,
}

#[derive(Debug, Default, Deserialize)]
struct ScannerVulnerability {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fix: ScannerFix,
}

#[derive(Debug, Default, Deserialize)]
struct ScannerFix {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScannerArtifact {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    purl: Option<String>,
}

/// Deduplicates a raw scanner report into one record per (vulnerability,
/// artifact name, artifact version), preserving first-seen order.
///
/// When the SBOM that was scanned is supplied, each record is linked back to
/// a component `bom-ref`, by purl first and by (name, version) second.
pub fn process_report(raw: &Value, sbom: Option<&Value>) -> Result<VulnSummary, serde_json::Error> {
    let report = ScannerReport::deserialize(raw)?;
    let index = sbom.map(ComponentIndex::build).unwrap_or_default();

    let mut order: Vec<(String, String, String)> = Vec::new();
    let mut groups: HashMap<(String, String, String), UniqueVulnerability> = HashMap::new();

    for m in &report.matches {
        let id = m.vulnerability.id.clone().unwrap_or_else(|| "UNKNOWN".into());
        let package = m.artifact.name.clone().unwrap_or_else(|| "unknown".into());
        let version = m.artifact.version.clone().unwrap_or_else(|| "unknown".into());
        let key = (id.clone(), package.clone(), version.clone());

        match groups.get_mut(&key) {
            Some(existing) => {
                existing.match_count += 1;
            }
            None => {
                let component_ref = index.lookup(m.artifact.purl.as_deref(), &package, &version);
                groups.insert(
                    key.clone(),
                    UniqueVulnerability {
                        id,
                        package,
                        version,
                        severity: VulnSeverity::from_scanner(m.vulnerability.severity.as_deref()),
                        fixed_version: m.vulnerability.fix.versions.first().cloned(),
                        component_ref,
                        match_count: 1,
                        description: m.vulnerability.description.clone(),
                    },
                );
                order.push(key);
            }
        }
    }

    let mut summary = VulnSummary {
        total_matches: report.matches.len(),
        unique: Vec::with_capacity(order.len()),
        severity_counts: SeverityCounts::default(),
    };
    for key in order {
        if let Some(vuln) = groups.remove(&key) {
            summary.severity_counts.record(vuln.severity);
            summary.unique.push(vuln);
        }
    }
    Ok(summary)
}

#[derive(Default)]
struct ComponentIndex {
    by_purl: HashMap<String, String>,
    by_name_version: HashMap<(String, String), String>,
}

impl ComponentIndex {
    fn build(sbom: &Value) -> Self {
        let mut index = ComponentIndex::default();
        let components = sbom
            .get("components")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for component in components {
            let Some(bom_ref) = component.get("bom-ref").and_then(Value::as_str) else {
                continue;
            };
            if let Some(purl) = component.get("purl").and_then(Value::as_str) {
                index.by_purl.insert(purl.to_string(), bom_ref.to_string());
            }
            if let (Some(name), Some(version)) = (
                component.get("name").and_then(Value::as_str),
                component.get("version").and_then(Value::as_str),
            ) {
                index
                    .by_name_version
                    .insert((name.to_string(), version.to_string()), bom_ref.to_string());
            }
        }
        index
    }

    fn lookup(&self, purl: Option<&str>, name: &str, version: &str) -> Option<String> {
        if let Some(purl) = purl {
            if let Some(bom_ref) = self.by_purl.get(purl) {
                return Some(bom_ref.clone());
            }
        }
        self.by_name_version
            .get(&(name.to_string(), version.to_string()))
            .cloned()
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        let cut: String = s.chars().take(limit).collect();
        format!("{cut}...")
    }
}
