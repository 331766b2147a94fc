//! Per-request download directories.

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Fresh, not yet created directory for one request under `base`.
///
/// Each request writes into its own directory so concurrent downloads of the
/// same video never share output paths.
pub fn request_dir(base: &Path) -> PathBuf {
    base.join(uuid::Uuid::new_v4().to_string())
}

/// Remove a request directory and everything in it.
///
/// Returns `Ok(false)` when there was nothing to remove.
pub async fn remove_request_dir(dir: &Path) -> io::Result<bool> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed request directory");
            Ok(true)
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a single file. Returns `Ok(false)` when it did not exist.
pub async fn remove_file(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
