//! Environment installation error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum InstallError {
    #[error("file {path} is claimed by both {first} and {second}")]
    Conflict {
        path: String,
        first: String,
        second: String,
    },

    #[error("{path} already exists in the environment and is not owned by any package; {package} ships it")]
    UntrackedFile { path: String, package: String },

    #[error("failed to fetch {package}: {message}")]
    Fetch {
        package: String,
        message: String,
        retryable: bool,
    },

    #[error("invalid package artifact {path}: {message}")]
    InvalidArtifact { path: String, message: String },

    #[error("corrupted metadata record {path}: {message}")]
    MetadataCorrupted { path: String, message: String },

    #[error("rollback failed: {message}")]
    RollbackFailed { message: String },

    #[error("concurrency error: {message}")]
    ConcurrencyError { message: String },

    #[error("nothing to install")]
    NothingToInstall,
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Conflict { .. } => {
                Some("Remove one of the conflicting packages from the dependency set.")
            }
            Self::UntrackedFile { .. } => {
                Some("Move the file out of the environment, or install into a fresh one.")
            }
            Self::Fetch { .. } => Some("Check that the channel directory contains the artifact."),
            Self::MetadataCorrupted { .. } => {
                Some("Delete the corrupted record or recreate the environment.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { retryable: true, .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Conflict { .. } => "install.conflict",
            Self::UntrackedFile { .. } => "install.untracked_file",
            Self::Fetch { .. } => "install.fetch",
            Self::InvalidArtifact { .. } => "install.invalid_artifact",
            Self::MetadataCorrupted { .. } => "install.metadata_corrupted",
            Self::RollbackFailed { .. } => "install.rollback_failed",
            Self::ConcurrencyError { .. } => "install.concurrency_error",
            Self::NothingToInstall => "install.nothing_to_install",
        };
        Some(code)
    }
}
