//! Filesystem errors for environments, caches and artifacts

use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::Path;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("no such file or directory: {path}")]
    PathNotFound { path: String },

    #[error("{path} already exists")]
    AlreadyExists { path: String },

    #[error("{path}: {message}")]
    IoError { path: String, message: String },

    #[error("corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("could not atomically replace {path}: {message}")]
    AtomicWriteFailed { path: String, message: String },
}

impl StorageError {
    /// Classify an I/O failure on `path`
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &Path) -> Self {
        let path = path.display().to_string();
        match err.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            ErrorKind::NotFound => Self::PathNotFound { path },
            ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::IoError {
                path,
                message: err.to_string(),
            },
        }
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PermissionDenied { .. } => Some("Check ownership of the environment and cache."),
            Self::CorruptedData { .. } => Some("Delete the cached copy and retry."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::IoError { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::PathNotFound { .. } => "storage.path_not_found",
            Self::AlreadyExists { .. } => "storage.already_exists",
            Self::IoError { .. } => "storage.io_error",
            Self::CorruptedData { .. } => "storage.corrupted_data",
            Self::AtomicWriteFailed { .. } => "storage.atomic_write_failed",
        })
    }
}
