//! Best-effort removal of temporary files.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

/// Remove a file, ignoring any failure.
///
/// Returns true if a file was actually removed.
pub async fn remove_quietly(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed temporary file {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            debug!("Failed to remove temporary file {}: {}", path.display(), e);
            false
        }
    }
}

/// Remove an uploaded reference image together with its derived `.jpg`.
pub async fn remove_upload(path: impl AsRef<Path>) {
    let path = path.as_ref();
    remove_quietly(path).await;

    let derived = path.with_extension("jpg");
    if derived != path {
        remove_quietly(&derived).await;
    }
}
