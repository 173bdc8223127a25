#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the kiln build orchestrator
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone so they can travel through events.

use std::borrow::Cow;

use thiserror::Error;

pub mod build;
pub mod config;
pub mod install;
pub mod manifest;
pub mod resolve;
pub mod storage;
pub mod version;

// Re-export all error types at the root
pub use build::BuildError;
pub use config::ConfigError;
pub use install::InstallError;
pub use manifest::ManifestError;
pub use resolve::ResolveError;
pub use storage::StorageError;
pub use version::VersionError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An error annotated with the orchestration stage it surfaced in.
    /// The wrapped error keeps its original kind, see [`Error::root`].
    #[error("{stage}: {source}")]
    Stage { stage: String, source: Box<Error> },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: format!("{err}"),
            path: Some(path.into()),
        }
    }

    /// Attach stage context without changing the error kind.
    ///
    /// Wrapping an error that already carries stage context replaces nothing:
    /// the innermost stage is the one the failure originated in.
    #[must_use]
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any stage context peeled off
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stage the error surfaced in, if the orchestrator recorded one
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<semver::Error> for Error {
    fn from(err: semver::Error) -> Self {
        Self::Version(VersionError::ParseError {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for kiln operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Manifest(err) => err.user_message(),
            Error::Build(err) => err.user_message(),
            Error::Resolve(err) => err.user_message(),
            Error::Install(err) => err.user_message(),
            Error::Stage { stage, source } => {
                Cow::Owned(format!("{} (while {stage})", source.user_message()))
            }
            Error::Io { message, path, .. } => match path {
                Some(path) => Cow::Owned(format!("{}: {message}", path.display())),
                None => Cow::Owned(message.clone()),
            },
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Manifest(err) => err.user_hint(),
            Error::Build(err) => err.user_hint(),
            Error::Resolve(err) => err.user_hint(),
            Error::Install(err) => err.user_hint(),
            Error::Version(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::Storage(err) => err.user_hint(),
            Error::Stage { source, .. } => source.user_hint(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Install(err) => err.is_retryable(),
            Error::Storage(err) => err.is_retryable(),
            Error::Stage { source, .. } => source.is_retryable(),
            Error::Io { .. } => true,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Manifest(err) => err.user_code(),
            Error::Build(err) => err.user_code(),
            Error::Resolve(err) => err.user_code(),
            Error::Install(err) => err.user_code(),
            Error::Storage(err) => err.user_code(),
            Error::Version(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Stage { source, .. } => source.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}
