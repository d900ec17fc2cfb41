use crate::context::Context;
use crate::vuln::{self, SeverityCounts, VulnSeverity};

/// Weighted risk score over deduplicated vulnerability counts:
/// critical 10, high 5, medium 2, low 1, info 0.
pub fn risk_score(counts: &SeverityCounts) -> u32 {
    VulnSeverity::ALL
        .iter()
        .map(|severity| severity.weight() * counts.get(*severity) as u32)
        .sum()
}

/// Risk score for whatever scan data the context holds. No scan data, or
/// scan data that cannot be read, scores zero.
pub fn score_context(ctx: &Context) -> u32 {
    let Some(report) = ctx.vulns.as_ref() else {
        return 0;
    };
    let sbom = ctx.sbom.as_ref().map(|s| &s.raw);
    match vuln::process_report(&report.raw, sbom) {
        Ok(summary) => risk_score(&summary.severity_counts),
        Err(_) => 0,
    }
}
