mod crates_io;
mod npm;
mod pypi;

pub use crates_io::CratesIoClient;
pub use npm::NpmClient;
pub use pypi::PyPiClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::DownloadInfo;
use crate::error::RegistryError;
use crate::metadata::PackageMetadata;
use crate::package::RepoSource;

pub(crate) const USER_AGENT: &str = "pkgaudit";
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only client for one package registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Registry display name, e.g. "PyPI".
    fn name(&self) -> &'static str;

    /// Fetches normalized metadata for a package, at a pinned version when
    /// one is given and at the registry's latest otherwise.
    async fn fetch_metadata(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<PackageMetadata, RegistryError>;

    /// Resolves where the artifact for an exact version can be downloaded.
    async fn download_info(
        &self,
        name: &str,
        version: &str,
    ) -> Result<DownloadInfo, RegistryError>;
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("failed to build HTTP client")
}

pub(crate) fn base_url_from_env(env_var: &str, default: &str) -> String {
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => value.trim_end_matches('/').to_string(),
        _ => default.to_string(),
    }
}

/// Folds reqwest failures into the registry error taxonomy: body decoding
/// problems are `Other`, everything transport-shaped is `Network`.
pub(crate) fn transport_error(registry: &str, err: reqwest::Error) -> RegistryError {
    if err.is_decode() {
        RegistryError::Other(format!("invalid JSON response from {registry}: {err}"))
    } else if err.is_timeout() {
        RegistryError::Network(format!("request to {registry} timed out"))
    } else {
        RegistryError::Network(format!("network error talking to {registry}: {err}"))
    }
}

pub(crate) fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Maps each package source to its registry client. Built once at startup;
/// tests swap individual clients for stubs.
pub struct RegistryRouter {
    pypi: Arc<dyn RegistryClient>,
    npm: Arc<dyn RegistryClient>,
    rust: Arc<dyn RegistryClient>,
}

impl RegistryRouter {
    pub fn new(
        pypi: Arc<dyn RegistryClient>,
        npm: Arc<dyn RegistryClient>,
        rust: Arc<dyn RegistryClient>,
    ) -> Self {
        Self { pypi, npm, rust }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(PyPiClient::new()),
            Arc::new(NpmClient::new()),
            Arc::new(CratesIoClient::new()),
        )
    }

    pub fn client_for(&self, source: RepoSource) -> &dyn RegistryClient {
        match source {
            RepoSource::Pypi => self.pypi.as_ref(),
            RepoSource::Npm => self.npm.as_ref(),
            RepoSource::Rust => self.rust.as_ref(),
        }
    }
}

impl Default for RegistryRouter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_maps_sources_to_clients() {
        let router = RegistryRouter::with_defaults();
        assert_eq!(router.client_for(RepoSource::Pypi).name(), "PyPI");
        assert_eq!(router.client_for(RepoSource::Npm).name(), "npm");
        assert_eq!(router.client_for(RepoSource::Rust).name(), "crates.io");
    }

    #[test]
    fn none_if_empty_drops_blank_strings() {
        assert_eq!(none_if_empty(Some("".into())), None);
        assert_eq!(none_if_empty(Some("  ".into())), None);
        assert_eq!(none_if_empty(Some("x".into())), Some("x".into()));
        assert_eq!(none_if_empty(None), None);
    }
}
