use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::{base_url_from_env, http_client, none_if_empty, transport_error, RegistryClient};
use crate::context::DownloadInfo;
use crate::error::RegistryError;
use crate::metadata::PackageMetadata;

const DEFAULT_BASE_URL: &str = "https://crates.io";
const DEFAULT_STATIC_BASE_URL: &str = "https://static.crates.io";
pub const BASE_URL_ENV: &str = "PKGAUDIT_CRATES_BASE_URL";

/// crates.io API client. Downloads come from the static CDN, which shares
/// the API host only when a base URL override points both at one server.
pub struct CratesIoClient {
    client: reqwest::Client,
    base_url: String,
    static_base_url: String,
}

impl CratesIoClient {
    pub fn new() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(custom) if !custom.is_empty() => {
                Self::with_base_url(custom.trim_end_matches('/'))
            }
            _ => Self {
                client: http_client(),
                base_url: base_url_from_env(BASE_URL_ENV, DEFAULT_BASE_URL),
                static_base_url: DEFAULT_STATIC_BASE_URL.to_string(),
            },
        }
    }

    /// Points both the API and the download CDN at one base, for tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: http_client(),
            static_base_url: base_url.clone(),
            base_url,
        }
    }

    async fn get_crate(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<CratesResponse, RegistryError> {
        let url = match version {
            Some(version) => format!("{}/api/v1/crates/{name}/{version}", self.base_url),
            None => format!("{}/api/v1/crates/{name}", self.base_url),
        };
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(match version {
                Some(v) => format!("version '{v}' of crate '{name}' not found on crates.io"),
                None => format!("crate '{name}' not found on crates.io"),
            }));
        }
        if !status.is_success() {
            return Err(RegistryError::Other(format!(
                "crates.io returned HTTP {status} for '{name}'"
            )));
        }
        response
            .json::<CratesResponse>()
            .await
            .map_err(|e| transport_error(self.name(), e))
    }
}

impl Default for CratesIoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for CratesIoClient {
    fn name(&self) -> &'static str {
        "crates.io"
    }

    #[instrument(skip(self), fields(package = name))]
    async fn fetch_metadata(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<PackageMetadata, RegistryError> {
        let response = self.get_crate(name, version).await?;
        Ok(to_metadata(response, name))
    }

    #[instrument(skip(self), fields(package = name, version = version))]
    async fn download_info(
        &self,
        name: &str,
        version: &str,
    ) -> Result<DownloadInfo, RegistryError> {
        // Validates existence through the API before constructing the CDN URL.
        self.get_crate(name, Some(version)).await?;
        Ok(DownloadInfo {
            url: format!(
                "{}/crates/{name}/{name}-{version}.crate",
                self.static_base_url
            ),
            filename: format!("{name}-{version}.crate"),
            package_type: "rust-crate".to_string(),
            local_path: None,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct CratesResponse {
    #[serde(rename = "crate")]
    krate: Option<CrateData>,
    version: Option<CrateVersion>,
    #[serde(default)]
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct CrateData {
    name: Option<String>,
    description: Option<String>,
    homepage: Option<String>,
    repository: Option<String>,
    documentation: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct CrateVersion {
    num: Option<String>,
    license: Option<String>,
    #[serde(default)]
    deps: Vec<CrateDep>,
}

#[derive(Debug, Clone, Deserialize)]
struct CrateDep {
    crate_id: Option<String>,
    req: Option<String>,
}

fn to_metadata(response: CratesResponse, requested_name: &str) -> PackageMetadata {
    let krate = response.krate.unwrap_or_default();
    let release_count = (!response.versions.is_empty()).then_some(response.versions.len());
    // Version endpoint responses carry `version`; crate-level responses
    // list `versions` newest first.
    let version = response
        .version
        .or_else(|| response.versions.into_iter().next())
        .unwrap_or_default();

    let mut project_urls = Vec::new();
    if let Some(homepage) = none_if_empty(krate.homepage.clone()) {
        project_urls.push(("Homepage".to_string(), homepage));
    }
    if let Some(repository) = none_if_empty(krate.repository) {
        project_urls.push(("Repository".to_string(), repository));
    }
    if let Some(documentation) = none_if_empty(krate.documentation) {
        project_urls.push(("Documentation".to_string(), documentation));
    }

    PackageMetadata {
        name: krate.name.unwrap_or_else(|| requested_name.to_string()),
        version: version.num,
        summary: none_if_empty(krate.description),
        homepage: none_if_empty(krate.homepage),
        project_urls,
        declared_dependencies: version
            .deps
            .iter()
            .filter_map(|dep| {
                dep.crate_id
                    .as_ref()
                    .map(|id| format!("{id}:{}", dep.req.as_deref().unwrap_or("*")))
            })
            .collect(),
        author: None,
        license: none_if_empty(version.license),
        release_count,
    }
}
