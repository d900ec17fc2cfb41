use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::{base_url_from_env, http_client, none_if_empty, transport_error, RegistryClient};
use crate::context::DownloadInfo;
use crate::error::RegistryError;
use crate::metadata::PackageMetadata;

const DEFAULT_BASE_URL: &str = "https://pypi.org";
pub const BASE_URL_ENV: &str = "PKGAUDIT_PYPI_BASE_URL";

pub struct PyPiClient {
    client: reqwest::Client,
    base_url: String,
}

impl PyPiClient {
    pub fn new() -> Self {
        Self::with_base_url(base_url_from_env(BASE_URL_ENV, DEFAULT_BASE_URL))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
        }
    }

    fn json_url(&self, name: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}/pypi/{name}/{version}/json", self.base_url),
            None => format!("{}/pypi/{name}/json", self.base_url),
        }
    }

    async fn get_package(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<PyPiResponse, RegistryError> {
        let url = self.json_url(name, version);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(match version {
                Some(v) => format!("version '{v}' of package '{name}' not found on PyPI"),
                None => format!("package '{name}' not found on PyPI"),
            }));
        }
        if !status.is_success() {
            return Err(RegistryError::Other(format!(
                "PyPI returned HTTP {status} for '{name}'"
            )));
        }
        response
            .json::<PyPiResponse>()
            .await
            .map_err(|e| transport_error(self.name(), e))
    }
}

impl Default for PyPiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for PyPiClient {
    fn name(&self) -> &'static str {
        "PyPI"
    }

    #[instrument(skip(self), fields(package = name))]
    async fn fetch_metadata(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<PackageMetadata, RegistryError> {
        let response = self.get_package(name, version).await?;
        Ok(to_metadata(response, name))
    }

    #[instrument(skip(self), fields(package = name, version = version))]
    async fn download_info(
        &self,
        name: &str,
        version: &str,
    ) -> Result<DownloadInfo, RegistryError> {
        let response = self.get_package(name, Some(version)).await?;
        let mut files = response.urls;
        if files.is_empty() {
            if let Some(mut releases) = response.releases {
                if let Some(release_files) = releases.remove(version) {
                    files = release_files;
                }
            }
        }
        let file = select_file(&files).ok_or_else(|| {
            RegistryError::Other(format!(
                "no downloadable files for '{name}' {version} on PyPI"
            ))
        })?;
        Ok(DownloadInfo {
            url: file.url.clone(),
            filename: file.filename.clone(),
            package_type: file.packagetype.clone(),
            local_path: None,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct PyPiResponse {
    #[serde(default)]
    info: PyPiInfo,
    releases: Option<HashMap<String, Vec<PyPiFile>>>,
    #[serde(default)]
    urls: Vec<PyPiFile>,
}

#[derive(Debug, Default, Deserialize)]
struct PyPiInfo {
    name: Option<String>,
    version: Option<String>,
    summary: Option<String>,
    home_page: Option<String>,
    project_urls: Option<BTreeMap<String, Option<String>>>,
    requires_dist: Option<Vec<String>>,
    author: Option<String>,
    license: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct PyPiFile {
    #[serde(default)]
    url: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    packagetype: String,
}

fn to_metadata(response: PyPiResponse, requested_name: &str) -> PackageMetadata {
    let release_count = response
        .releases
        .as_ref()
        .filter(|r| !r.is_empty())
        .map(HashMap::len);
    let info = response.info;
    let project_urls = info
        .project_urls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(label, url)| url.map(|u| (label, u)))
        .collect();
    PackageMetadata {
        name: info.name.unwrap_or_else(|| requested_name.to_string()),
        version: info.version,
        summary: none_if_empty(info.summary),
        homepage: none_if_empty(info.home_page),
        project_urls,
        declared_dependencies: info.requires_dist.unwrap_or_default(),
        author: none_if_empty(info.author),
        license: none_if_empty(info.license),
        release_count,
    }
}

/// Wheels are preferred because syft can unpack and catalogue them
/// directly; otherwise take whatever the registry lists first.
fn select_file(files: &[PyPiFile]) -> Option<&PyPiFile> {
    files
        .iter()
        .find(|f| f.packagetype == "bdist_wheel")
        .or_else(|| files.first())
}
