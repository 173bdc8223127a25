//! Project manifest error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ManifestError {
    #[error("manifest not found: {path}")]
    NotFound { path: String },

    #[error("malformed manifest {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("dependency already declared: {name}")]
    DuplicateDependency { name: String },

    #[error("invalid dependency specification {spec}: {message}")]
    InvalidDependency { spec: String, message: String },

    #[error("failed to write manifest {path}: {message}")]
    WriteFailed { path: String, message: String },
}

impl UserFacingError for ManifestError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Pass --manifest-path pointing at a kiln.toml or its directory.")
            }
            Self::Malformed { .. } | Self::InvalidDependency { .. } => {
                Some("Fix the manifest contents and retry the command.")
            }
            Self::DuplicateDependency { .. } => {
                Some("Edit the existing entry instead of adding the dependency again.")
            }
            Self::WriteFailed { .. } => Some("Ensure the manifest directory is writable."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "manifest.not_found",
            Self::Malformed { .. } => "manifest.malformed",
            Self::DuplicateDependency { .. } => "manifest.duplicate_dependency",
            Self::InvalidDependency { .. } => "manifest.invalid_dependency",
            Self::WriteFailed { .. } => "manifest.write_failed",
        };
        Some(code)
    }
}
