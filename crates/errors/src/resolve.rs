//! Dependency resolution error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("package not found in any channel: {name}")]
    PackageNotFound { name: String },

    #[error("no version of {package} satisfies {constraints} (required by {})", .conflicting.join(", "))]
    Unsatisfiable {
        package: String,
        constraints: String,
        conflicting: Vec<String>,
    },

    #[error("dependency cycle detected: {packages}")]
    Cycle { packages: String },

    #[error("channel index error for {channel}: {message}")]
    ChannelIndex { channel: String, message: String },

    #[error("resolution did not converge after {rounds} rounds")]
    NotConverged { rounds: usize },
}

impl ResolveError {
    /// Names of the packages whose requirements could not be reconciled
    #[must_use]
    pub fn conflicting_packages(&self) -> &[String] {
        match self {
            Self::Unsatisfiable { conflicting, .. } => conflicting,
            _ => &[],
        }
    }
}

impl UserFacingError for ResolveError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PackageNotFound { .. } => {
                Some("Check the package name or add a channel that provides it.")
            }
            Self::Unsatisfiable { .. } | Self::NotConverged { .. } => {
                Some("Relax the version requirements of the listed packages.")
            }
            Self::ChannelIndex { .. } => Some("Regenerate the channel index.json."),
            Self::Cycle { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::PackageNotFound { .. } => "resolve.package_not_found",
            Self::Unsatisfiable { .. } => "resolve.unsatisfiable",
            Self::Cycle { .. } => "resolve.cycle",
            Self::ChannelIndex { .. } => "resolve.channel_index",
            Self::NotConverged { .. } => "resolve.not_converged",
        };
        Some(code)
    }
}
