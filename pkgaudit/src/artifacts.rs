use std::env;
use std::io;
use std::path::{Path, PathBuf};

pub const ARTIFACTS_DIR_ENV: &str = "PKGAUDIT_ARTIFACTS_DIR";
pub const HOST_PATH_ENV: &str = "PKGAUDIT_ARTIFACTS_HOST_PATH";

/// Directory report and SBOM files are written to, created on demand.
/// Defaults to `pkgaudit` under the system temp dir; override with
/// `PKGAUDIT_ARTIFACTS_DIR`.
pub fn artifacts_dir() -> io::Result<PathBuf> {
    let dir = match env::var(ARTIFACTS_DIR_ENV) {
        Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => env::temp_dir().join("pkgaudit"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Hint shown next to artifact paths when the process runs in a container
/// and the path the user sees differs from ours.
pub fn host_hint(container_path: &Path) -> Option<String> {
    if let Ok(host) = env::var(HOST_PATH_ENV) {
        if !host.is_empty() {
            let name = container_path.file_name()?.to_string_lossy();
            return Some(format!("available on the host at {host}/{name}"));
        }
    }
    None
}

/// Package name made safe for use in a file name; npm scoped names carry
/// `@` and `/`.
pub fn artifact_slug(package_name: &str) -> String {
    package_name.trim_start_matches('@').replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_passes_plain_names_through() {
        assert_eq!(artifact_slug("requests"), "requests");
        assert_eq!(artifact_slug("left-pad"), "left-pad");
    }

    #[test]
    fn slug_flattens_scoped_npm_names() {
        assert_eq!(artifact_slug("@types/node"), "types-node");
        assert_eq!(artifact_slug("@scope/deep/name"), "scope-deep-name");
    }

    #[test]
    fn default_artifacts_dir_lives_under_temp() {
        // Guarded so a custom dir in the environment does not break the run.
        if env::var(ARTIFACTS_DIR_ENV).is_ok() {
            return;
        }
        let dir = artifacts_dir().unwrap();
        assert!(dir.ends_with("pkgaudit"), "got: {}", dir.display());
        assert!(dir.is_dir());
    }
}
