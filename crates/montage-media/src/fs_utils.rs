//! Filesystem helpers for render outputs and scratch files.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// A plain rename is tried first. On EXDEV the file is copied next to the
/// destination and renamed into place, then the source is removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("partial");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Whether a deletion failure is likely transient (file still open, busy
/// mount, sharing violation).
pub fn is_lock_error(e: &std::io::Error) -> bool {
    if e.kind() == ErrorKind::PermissionDenied {
        return true;
    }
    // EBUSY, ETXTBSY, ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(e.raw_os_error(), Some(16) | Some(26) | Some(32) | Some(33))
}

/// Remove a file or directory tree.
///
/// Returns `Ok(false)` if nothing was there, so repeated calls are harmless.
/// Lock-like failures map to [`MediaError::ResourceLocked`].
pub async fn remove_artifact(path: impl AsRef<Path>) -> MediaResult<bool> {
    let path = path.as_ref();

    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let result = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) if is_lock_error(&e) => Err(MediaError::resource_locked(path, e.to_string())),
        Err(e) => Err(e.into()),
    }
}
