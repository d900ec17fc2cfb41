use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::{base_url_from_env, http_client, none_if_empty, transport_error, RegistryClient};
use crate::artifacts;
use crate::context::DownloadInfo;
use crate::error::RegistryError;
use crate::metadata::PackageMetadata;

const DEFAULT_BASE_URL: &str = "https://registry.npmjs.org";
pub const BASE_URL_ENV: &str = "PKGAUDIT_NPM_BASE_URL";

pub struct NpmClient {
    client: reqwest::Client,
    base_url: String,
}

impl NpmClient {
    pub fn new() -> Self {
        Self::with_base_url(base_url_from_env(BASE_URL_ENV, DEFAULT_BASE_URL))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        not_found: String,
    ) -> Result<T, RegistryError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(not_found));
        }
        if !status.is_success() {
            return Err(RegistryError::Other(format!(
                "npm registry returned HTTP {status} for '{path}'"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| transport_error(self.name(), e))
    }
}

impl Default for NpmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for NpmClient {
    fn name(&self) -> &'static str {
        "npm"
    }

    #[instrument(skip(self), fields(package = name))]
    async fn fetch_metadata(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<PackageMetadata, RegistryError> {
        match version {
            Some(version) => {
                let data: NpmVersion = self
                    .get_json(
                        &format!("{name}/{version}"),
                        format!("version '{version}' of package '{name}' not found on npm"),
                    )
                    .await?;
                Ok(to_metadata(data, name, None))
            }
            None => {
                let packument: NpmPackument = self
                    .get_json(name, format!("package '{name}' not found on npm"))
                    .await?;
                let release_count = (!packument.versions.is_empty()).then_some(packument.versions.len());
                let latest = packument
                    .dist_tags
                    .get("latest")
                    .and_then(|tag| packument.versions.get(tag))
                    .cloned()
                    .unwrap_or_default();
                Ok(to_metadata(latest, name, release_count))
            }
        }
    }

    #[instrument(skip(self), fields(package = name, version = version))]
    async fn download_info(
        &self,
        name: &str,
        version: &str,
    ) -> Result<DownloadInfo, RegistryError> {
        let data: NpmVersion = self
            .get_json(
                &format!("{name}/{version}"),
                format!("version '{version}' of package '{name}' not found on npm"),
            )
            .await?;
        let tarball = data.dist.tarball.ok_or_else(|| {
            RegistryError::Other(format!("no tarball listed for '{name}' {version} on npm"))
        })?;
        let filename = tarball
            .rsplit('/')
            .next()
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{version}.tgz", artifacts::artifact_slug(name)));
        Ok(DownloadInfo {
            url: tarball,
            filename,
            package_type: "npm-tarball".to_string(),
            local_path: None,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct NpmPackument {
    #[serde(default, rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    versions: BTreeMap<String, NpmVersion>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct NpmVersion {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    homepage: Option<String>,
    author: Option<NpmPerson>,
    repository: Option<NpmLink>,
    bugs: Option<NpmLink>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    license: Option<NpmLicense>,
    #[serde(default)]
    dist: NpmDist,
}

/// npm people fields are either `{"name": ..., "email": ...}` or a raw
/// `"Name <email>"` string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NpmPerson {
    Structured {
        name: Option<String>,
        email: Option<String>,
    },
    Raw(String),
}

impl NpmPerson {
    fn display_name(&self) -> Option<String> {
        match self {
            NpmPerson::Structured { name, email } => match (name, email) {
                (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
                (Some(name), None) => Some(name.clone()),
                (None, Some(email)) => Some(email.clone()),
                (None, None) => None,
            },
            NpmPerson::Raw(raw) => none_if_empty(Some(raw.clone())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NpmLink {
    Structured { url: Option<String> },
    Raw(String),
}

impl NpmLink {
    fn url(&self) -> Option<String> {
        match self {
            NpmLink::Structured { url } => url.clone(),
            NpmLink::Raw(raw) => none_if_empty(Some(raw.clone())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NpmLicense {
    Structured {
        #[serde(rename = "type")]
        license_type: Option<String>,
    },
    Raw(String),
}

impl NpmLicense {
    fn value(&self) -> Option<String> {
        match self {
            NpmLicense::Structured { license_type } => license_type.clone(),
            NpmLicense::Raw(raw) => none_if_empty(Some(raw.clone())),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
struct NpmDist {
    tarball: Option<String>,
}

fn to_metadata(data: NpmVersion, requested_name: &str, release_count: Option<usize>) -> PackageMetadata {
    let mut project_urls = Vec::new();
    if let Some(homepage) = none_if_empty(data.homepage.clone()) {
        project_urls.push(("Homepage".to_string(), homepage));
    }
    if let Some(url) = data.repository.as_ref().and_then(NpmLink::url) {
        project_urls.push(("Repository".to_string(), url));
    }
    if let Some(url) = data.bugs.as_ref().and_then(NpmLink::url) {
        project_urls.push(("Bug Tracker".to_string(), url));
    }
    PackageMetadata {
        name: data.name.unwrap_or_else(|| requested_name.to_string()),
        version: data.version,
        summary: none_if_empty(data.description),
        homepage: none_if_empty(data.homepage),
        project_urls,
        declared_dependencies: data
            .dependencies
            .iter()
            .map(|(dep, range)| format!("{dep}@{range}"))
            .collect(),
        author: data.author.as_ref().and_then(NpmPerson::display_name),
        license: data.license.as_ref().and_then(NpmLicense::value),
        release_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn version(value: serde_json::Value) -> NpmVersion {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_version_document() {
        let data = version(json!({
            "name": "left-pad",
            "version": "1.3.0",
            "description": "String left pad",
            "homepage": "https://github.com/stevemao/left-pad",
            "author": { "name": "Steve Mao", "email": "sm@example.com" },
            "repository": { "type": "git", "url": "git+https://github.com/stevemao/left-pad.git" },
            "license": "WTFPL",
            "dependencies": { "lodash": "^4.17.21" },
            "dist": { "tarball": "https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz" },
        }));
        let meta = to_metadata(data, "left-pad", Some(10));
        assert_eq!(meta.name, "left-pad");
        assert_eq!(meta.version.as_deref(), Some("1.3.0"));
        assert_eq!(meta.author.as_deref(), Some("Steve Mao <sm@example.com>"));
        assert_eq!(meta.license.as_deref(), Some("WTFPL"));
        assert_eq!(meta.declared_dependencies, vec!["lodash@^4.17.21".to_string()]);
        assert_eq!(meta.release_count, Some(10));
        assert_eq!(
            meta.repository_url(),
            Some("git+https://github.com/stevemao/left-pad.git")
        );
    }

    #[test]
    fn author_as_string_is_kept_verbatim() {
        let data = version(json!({ "name": "x", "author": "Jane Doe <jane@example.com>" }));
        let meta = to_metadata(data, "x", None);
        assert_eq!(meta.author.as_deref(), Some("Jane Doe <jane@example.com>"));
    }

    #[test]
    fn license_object_uses_type_field() {
        let data = version(json!({ "name": "x", "license": { "type": "MIT", "url": "..." } }));
        let meta = to_metadata(data, "x", None);
        assert_eq!(meta.license.as_deref(), Some("MIT"));
    }

    #[test]
    fn repository_as_plain_string() {
        let data = version(json!({ "name": "x", "repository": "github:user/repo" }));
        let meta = to_metadata(data, "x", None);
        assert_eq!(meta.repository_url(), Some("github:user/repo"));
    }

    #[test]
    fn missing_fields_stay_none() {
        let meta = to_metadata(version(json!({})), "ghost", None);
        assert_eq!(meta.name, "ghost");
        assert_eq!(meta.author, None);
        assert_eq!(meta.license, None);
        assert!(meta.project_urls.is_empty());
        assert!(meta.declared_dependencies.is_empty());
    }

    #[test]
    fn packument_resolves_latest_tag() {
        let packument: NpmPackument = serde_json::from_value(json!({
            "dist-tags": { "latest": "2.0.0" },
            "versions": {
                "1.0.0": { "name": "demo", "version": "1.0.0" },
                "2.0.0": { "name": "demo", "version": "2.0.0" },
            },
        }))
        .unwrap();
        let latest = packument
            .dist_tags
            .get("latest")
            .and_then(|tag| packument.versions.get(tag))
            .cloned()
            .unwrap();
        assert_eq!(latest.version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn scoped_tarball_fallback_filename_is_safe() {
        let fallback = format!("{}-{}.tgz", artifacts::artifact_slug("@types/node"), "20.1.0");
        assert_eq!(fallback, "types-node-20.1.0.tgz");
    }
}
