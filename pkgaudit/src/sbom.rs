use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Deserialize;
use serde_json::Value;

use crate::metadata::PackageMetadata;

/// Component types that can act as dependency roots when the SBOM carries
/// no dependency edges.
const ROOT_COMPONENT_TYPES: [&str; 3] = ["library", "application", "framework"];

/// Minimal CycloneDX view. Every field defaults so a sparse or slightly
/// off-spec document still parses.
#[derive(Debug, Default, Deserialize)]
pub struct SbomDocument {
    #[serde(default)]
    pub components: Vec<SbomComponent>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEdge>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SbomComponent {
    #[serde(default, rename = "bom-ref")]
    pub bom_ref: Option<String>,
    #[serde(default, rename = "type")]
    pub component_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub purl: Option<String>,
    #[serde(default)]
    pub licenses: Vec<LicenseEntry>,
}

/// CycloneDX license entries come as `{"license": {"id"|"name": ...}}`,
/// as bare strings, or as other shapes we do not count.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LicenseEntry {
    Named { license: LicenseId },
    Raw(String),
    Other(Value),
}

#[derive(Debug, Default, Deserialize)]
pub struct LicenseId {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl LicenseEntry {
    fn identifier(&self) -> Option<&str> {
        match self {
            LicenseEntry::Named { license } => license.id.as_deref().or(license.name.as_deref()),
            LicenseEntry::Raw(raw) => Some(raw.as_str()),
            LicenseEntry::Other(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DependencyEdge {
    #[serde(default, rename = "ref")]
    pub parent: Option<String>,
    #[serde(default, rename = "dependsOn")]
    pub depends_on: Vec<String>,
}

/// Structural metrics derived from one SBOM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SbomAnalysis {
    pub total_components: usize,
    /// Longest dependency path from any root, counting a root's direct
    /// children as depth 1.
    pub max_depth: usize,
    pub direct_dependencies: usize,
    pub transitive_dependencies: usize,
    pub root_components: usize,
    pub component_types: BTreeMap<String, usize>,
    pub unique_licenses: usize,
    /// True when depth metrics came from the package's declared dependency
    /// list instead of SBOM edges.
    pub used_metadata_fallback: bool,
}

/// Derives structural metrics from a raw CycloneDX document.
///
/// Roots are components that appear in dependency edges but never as a
/// child. When the document has no edges, components typed as library,
/// application or framework stand in as roots; when the audited package
/// additionally declares dependencies in its registry metadata, those
/// declarations supply the direct-dependency count at depth 1.
pub fn analyze_sbom(
    raw: &Value,
    package: Option<&PackageMetadata>,
) -> Result<SbomAnalysis, serde_json::Error> {
    let doc = SbomDocument::deserialize(raw)?;
    Ok(analyze_document(&doc, package))
}

fn analyze_document(doc: &SbomDocument, package: Option<&PackageMetadata>) -> SbomAnalysis {
    let mut component_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut licenses: HashSet<&str> = HashSet::new();
    for component in &doc.components {
        let kind = component.component_type.as_deref().unwrap_or("unknown");
        *component_types.entry(kind.to_string()).or_insert(0) += 1;
        for entry in &component.licenses {
            if let Some(identifier) = entry.identifier() {
                licenses.insert(identifier);
            }
        }
    }

    let mut deps_map: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut all_refs: HashSet<&str> = HashSet::new();
    let mut children: HashSet<&str> = HashSet::new();
    for edge in &doc.dependencies {
        let Some(parent) = edge.parent.as_deref() else {
            continue;
        };
        all_refs.insert(parent);
        for child in &edge.depends_on {
            deps_map.entry(parent).or_default().push(child.as_str());
            children.insert(child.as_str());
            all_refs.insert(child.as_str());
        }
    }
    let mut roots: HashSet<&str> = all_refs.difference(&children).copied().collect();

    let mut declared_count = 0;
    let mut used_metadata_fallback = false;
    if doc.dependencies.is_empty() && !doc.components.is_empty() {
        for component in &doc.components {
            let Some(bom_ref) = component.bom_ref.as_deref() else {
                continue;
            };
            let kind = component
                .component_type
                .as_deref()
                .unwrap_or("")
                .to_ascii_lowercase();
            if ROOT_COMPONENT_TYPES.contains(&kind.as_str()) && !children.contains(bom_ref) {
                roots.insert(bom_ref);
            }
        }
        if let Some(package) = package {
            declared_count = package.declared_dependency_count();
            if declared_count > 0 {
                used_metadata_fallback = true;
            }
        }
    }

    let mut max_depth = 0;
    let mut direct: HashSet<&str> = HashSet::new();
    let mut transitive: HashSet<&str> = HashSet::new();
    if used_metadata_fallback {
        max_depth = 1;
    } else {
        for root in &roots {
            let walk = walk_from(root, &deps_map);
            max_depth = max_depth.max(walk.max_depth);
            direct.extend(walk.direct);
            transitive.extend(walk.transitive);
        }
    }

    SbomAnalysis {
        total_components: doc.components.len(),
        max_depth,
        direct_dependencies: if used_metadata_fallback {
            declared_count
        } else {
            direct.len()
        },
        transitive_dependencies: if used_metadata_fallback {
            0
        } else {
            transitive.len()
        },
        root_components: roots.len(),
        component_types,
        unique_licenses: licenses.len(),
        used_metadata_fallback,
    }
}

struct Walk<'a> {
    max_depth: usize,
    direct: HashSet<&'a str>,
    transitive: HashSet<&'a str>,
}

/// Breadth-first walk from one root. Direct children sit at depth 1; each
/// node is visited once, so cycles are truncated rather than followed.
fn walk_from<'a>(start: &'a str, deps_map: &HashMap<&'a str, Vec<&'a str>>) -> Walk<'a> {
    let direct: HashSet<&str> = deps_map
        .get(start)
        .map(|children| children.iter().copied().collect())
        .unwrap_or_default();
    if direct.is_empty() {
        return Walk {
            max_depth: 0,
            direct,
            transitive: HashSet::new(),
        };
    }

    let mut seen: HashSet<&str> = direct.clone();
    seen.insert(start);
    let mut transitive: HashSet<&str> = HashSet::new();
    let mut max_depth = 1;
    let mut queue: VecDeque<(&str, usize)> = direct.iter().map(|child| (*child, 1)).collect();
    while let Some((node, depth)) = queue.pop_front() {
        max_depth = max_depth.max(depth);
        for next in deps_map.get(node).into_iter().flatten() {
            if seen.insert(next) {
                transitive.insert(next);
                queue.push_back((next, depth + 1));
            }
        }
    }

    Walk {
        max_depth,
        direct,
        transitive,
    }
}
