use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tracing::{debug, instrument};

use crate::context::Context;
use crate::error::FatalError;
use crate::finding::Severity;
use crate::pipeline::Task;
use crate::registry::RegistryRouter;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads the package artifact for the resolved version into a scratch
/// directory and unpacks tarball artifacts so later tasks can point tools
/// at a directory.
///
/// Every failure here is fatal: without an artifact there is nothing left
/// to audit.
pub struct DownloadTask {
    registry: Arc<RegistryRouter>,
    http: reqwest::Client,
}

impl DownloadTask {
    pub fn new(registry: Arc<RegistryRouter>) -> Self {
        // No overall timeout: artifact sizes vary too much for one. The
        // connect timeout still catches dead mirrors quickly.
        let http = reqwest::Client::builder()
            .user_agent(crate::registry::USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { registry, http }
    }
}

#[async_trait]
impl Task for DownloadTask {
    fn name(&self) -> &'static str {
        "download"
    }

    fn status_message(&self, ctx: &Context) -> String {
        match ctx.resolved_version() {
            Some(version) => format!("Downloading {} {}", ctx.package_name, version),
            None => format!("Downloading {}", ctx.package_name),
        }
    }

    #[instrument(skip(self, ctx), fields(package = %ctx.package_name, source = %ctx.source))]
    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        if ctx.package.is_none() {
            return Err(FatalError::in_task(
                self.name(),
                "cannot download package: metadata not available",
            )
            .into());
        }
        let Some(version) = ctx.resolved_version().map(str::to_string) else {
            return Err(FatalError::in_task(
                self.name(),
                format!("no version resolved for {}", ctx.package_name),
            )
            .into());
        };

        let client = self.registry.client_for(ctx.source);
        let mut info = client
            .download_info(&ctx.package_name, &version)
            .await
            .map_err(|err| {
                FatalError::in_task(
                    self.name(),
                    format!(
                        "could not resolve download for {} {}: {err}",
                        ctx.package_name, version
                    ),
                )
            })?;
        debug!(url = %info.url, kind = %info.package_type, "resolved artifact");

        let scratch = tempfile::Builder::new()
            .prefix("pkgaudit-dl-")
            .tempdir()
            .map_err(|err| {
                FatalError::in_task(
                    self.name(),
                    format!("could not create download directory: {err}"),
                )
            })?
            .keep();

        let response = self.http.get(&info.url).send().await.map_err(|err| {
            FatalError::in_task(self.name(), format!("download of {} failed: {err}", info.url))
        })?;
        if !response.status().is_success() {
            return Err(FatalError::in_task(
                self.name(),
                format!(
                    "download of {} failed with HTTP {}",
                    info.url,
                    response.status()
                ),
            )
            .into());
        }
        let bytes = response.bytes().await.map_err(|err| {
            FatalError::in_task(self.name(), format!("download of {} failed: {err}", info.url))
        })?;

        let file_path = scratch.join(&info.filename);
        tokio::fs::write(&file_path, &bytes).await.map_err(|err| {
            FatalError::in_task(
                self.name(),
                format!("could not write {}: {err}", file_path.display()),
            )
        })?;
        ctx.emit(&format!(
            "Downloaded {} ({} bytes)",
            info.filename,
            bytes.len()
        ));

        // npm tarballs and .crate files are gzipped tars; both scan better
        // unpacked. Wheels and sdists are handed over as files.
        let local_path = match info.package_type.as_str() {
            "npm-tarball" | "rust-crate" => {
                let dest = scratch.join("unpacked");
                let archive = file_path.clone();
                let unpack_dest = dest.clone();
                tokio::task::spawn_blocking(move || unpack_tarball(&archive, &unpack_dest))
                    .await
                    .map_err(|err| {
                        FatalError::in_task(self.name(), format!("unpack task failed: {err}"))
                    })?
                    .map_err(|err| {
                        FatalError::in_task(
                            self.name(),
                            format!("could not unpack {}: {err}", info.filename),
                        )
                    })?
            }
            _ => file_path,
        };
        debug!(path = %local_path.display(), "artifact ready");

        ctx.push_finding(
            self.name(),
            format!("downloaded {} ({} bytes)", info.filename, bytes.len()),
            Severity::Info,
        );
        info.local_path = Some(local_path);
        ctx.download = Some(info);
        Ok(())
    }
}

/// Unpacks a gzipped tarball and returns the directory tools should scan:
/// the conventional `package/` root of npm tarballs, otherwise the single
/// top-level directory of .crate files, otherwise the extraction root.
fn unpack_tarball(archive: &Path, dest: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dest)?;
    let file = std::fs::File::open(archive)?;
    tar::Archive::new(GzDecoder::new(file)).unpack(dest)?;

    let package_dir = dest.join("package");
    if package_dir.is_dir() {
        return Ok(package_dir);
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dest)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    Ok(subdirs.into_iter().next().unwrap_or_else(|| dest.to_path_buf()))
}
