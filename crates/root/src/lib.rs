#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Filesystem operations for kiln
//!
//! Every durable write kiln performs (manifests, artifacts, metadata records)
//! goes through a temporary file in the destination directory followed by a
//! rename, so readers observe either the old file or the complete new one.

use kiln_errors::{Error, StorageError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Result type for filesystem operations
type Result<T> = std::result::Result<T, Error>;

/// Prefix for temporary files created next to their destination
pub const TEMP_PREFIX: &str = ".kiln-tmp-";

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write `contents` to `path` atomically
///
/// The data is written to a temporary file in the same directory, synced,
/// then renamed over `path`. On failure the temporary file is removed and
/// `path` is left untouched.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written, or
/// if the final rename fails.
pub async fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let target = path.to_path_buf();
    let data = contents.to_vec();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = parent_dir(&target);
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&dir)
            .map_err(|e| StorageError::from_io_with_path(&e, &dir))?;

        tmp.write_all(&data)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StorageError::AtomicWriteFailed {
                path: target.display().to_string(),
                message: e.to_string(),
            })?;

        tmp.persist(&target)
            .map_err(|e| StorageError::AtomicWriteFailed {
                path: target.display().to_string(),
                message: e.error.to_string(),
            })?;
        Ok(())
    })
    .await
    .map_err(|e| Error::internal(format!("atomic write task failed: {e}")))?
}

/// Rename `src` to `dst`, replacing `dst` if it is a file
///
/// # Errors
///
/// Returns an error if the rename fails (permissions, cross-device, etc.)
pub async fn atomic_rename(src: &Path, dst: &Path) -> Result<()> {
    fs::rename(src, dst).await.map_err(|e| {
        StorageError::AtomicWriteFailed {
            path: dst.display().to_string(),
            message: format!("rename from {} failed: {e}", src.display()),
        }
        .into()
    })
}

/// Move a file, falling back to copy + remove across filesystems
///
/// # Errors
///
/// Returns an error if neither rename nor copy succeeds.
pub async fn move_file(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(src, dst)
                .await
                .map_err(|e| StorageError::from_io_with_path(&e, dst))?;
            remove_file(src).await
        }
        Err(e) => Err(StorageError::from_io_with_path(&e, src).into()),
    }
}

/// Create a directory and all missing parents
///
/// # Errors
///
/// Returns an error if permission is denied or any I/O operation fails.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| StorageError::from_io_with_path(&e, path).into())
}

/// Remove a directory and all its contents; a missing directory is not an error
///
/// # Errors
///
/// Returns an error if the removal fails for any other reason.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(StorageError::from_io_with_path(&e, path).into())
        }
        _ => Ok(()),
    }
}

/// Remove a single file; a missing file is not an error
///
/// # Errors
///
/// Returns an error if the removal fails for any other reason.
pub async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(StorageError::from_io_with_path(&e, path).into())
        }
        _ => Ok(()),
    }
}

/// Check if a path exists
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Check if a path is an existing directory
pub async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

/// Ensure a directory exists and is empty
///
/// # Errors
///
/// Returns an error if directory removal or creation fails.
pub async fn ensure_empty_dir(path: &Path) -> Result<()> {
    remove_dir_all(path).await?;
    create_dir_all(path).await
}

/// Remove empty directories from `start` upwards, stopping at `stop`
///
/// `stop` itself is never removed. Non-empty directories end the walk.
pub async fn prune_empty_dirs(start: &Path, stop: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        if fs::remove_dir(dir).await.is_err() {
            break;
        }
        current = dir.parent();
    }
}
