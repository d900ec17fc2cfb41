use serde::Serialize;

const REPOSITORY_KEYS: [&str; 3] = ["repository", "source", "code"];
const HOMEPAGE_KEYS: [&str; 6] = [
    "homepage",
    "home",
    "project-url",
    "project",
    "documentation",
    "docs",
];

/// Normalized package metadata, shaped the same regardless of which
/// registry it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: Option<String>,
    pub summary: Option<String>,
    pub homepage: Option<String>,
    /// Labelled project URLs in registry order.
    pub project_urls: Vec<(String, String)>,
    /// Dependency declarations as the registry spells them, e.g.
    /// `requests>=2.0` or `lodash@^4.17.21`.
    pub declared_dependencies: Vec<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub release_count: Option<usize>,
}

impl PackageMetadata {
    /// Number of non-empty dependency declarations.
    pub fn declared_dependency_count(&self) -> usize {
        self.declared_dependencies
            .iter()
            .filter(|d| !d.trim().is_empty())
            .count()
    }

    /// URL of the source repository, if any project URL looks like one.
    pub fn repository_url(&self) -> Option<&str> {
        self.url_for_keys(&REPOSITORY_KEYS)
    }

    /// URL most likely to be the project homepage among the labelled URLs.
    pub fn homepage_like_url(&self) -> Option<&str> {
        self.url_for_keys(&HOMEPAGE_KEYS)
    }

    fn url_for_keys(&self, keys: &[&str]) -> Option<&str> {
        for key in keys {
            let hit = self
                .project_urls
                .iter()
                .find(|(label, _)| label.to_ascii_lowercase().contains(key));
            if let Some((_, url)) = hit {
                return Some(url.as_str());
            }
        }
        None
    }

    /// Summary lines shown after a successful metadata fetch.
    pub fn info_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Package: {}", self.name)];
        if let Some(version) = &self.version {
            lines.push(format!("Version: {version}"));
        }
        if let Some(summary) = &self.summary {
            lines.push(format!("Summary: {summary}"));
        }
        let deps = self.declared_dependency_count();
        if deps > 0 {
            lines.push(format!("Dependencies: {deps} direct"));
        }
        if let Some(repo) = self.repository_url() {
            lines.push(format!("Repository: {repo}"));
        } else if let Some(homepage) = &self.homepage {
            lines.push(format!("Homepage: {homepage}"));
        }
        if let Some(author) = &self.author {
            lines.push(format!("Author: {author}"));
        }
        if let Some(license) = &self.license {
            lines.push(format!("License: {license}"));
        }
        if let Some(count) = self.release_count {
            lines.push(format!("Total releases: {count}"));
        }
        lines
    }
}
