use serde::{Deserialize, Serialize};

use crate::{EventLevel, EventSource};
use kiln_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self {
            code: error.user_code().map(Into::into),
            message: error.user_message().into_owned(),
            hint: error.user_hint().map(Into::into),
            retryable: error.is_retryable(),
        }
    }
}

pub mod build;
pub mod general;
pub mod install;
pub mod manifest;
pub mod resolver;

pub use build::*;
pub use general::*;
pub use install::*;
pub use manifest::*;
pub use resolver::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Manifest load/edit/save
    Manifest(ManifestEvent),

    /// Orchestrator state changes and backend progress
    Build(BuildEvent),

    /// Dependency resolution
    Resolver(ResolverEvent),

    /// Environment installation
    Install(InstallEvent),
}

impl AppEvent {
    /// Identify the source domain for this event
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Manifest(_) => EventSource::MANIFEST,
            Self::Build(_) => EventSource::BUILD,
            Self::Resolver(_) => EventSource::RESOLVER,
            Self::Install(_) => EventSource::INSTALL,
        }
    }

    /// Severity of this event
    #[must_use]
    pub fn level(&self) -> EventLevel {
        match self {
            Self::General(GeneralEvent::Error { .. } | GeneralEvent::OperationFailed { .. })
            | Self::Build(BuildEvent::Failed { .. })
            | Self::Resolver(ResolverEvent::Failed { .. })
            | Self::Install(InstallEvent::Failed { .. } | InstallEvent::ConflictDetected { .. }) => {
                EventLevel::Error
            }

            Self::General(GeneralEvent::Warning { .. })
            | Self::Build(BuildEvent::Cancelled { .. })
            | Self::Install(InstallEvent::FetchRetrying { .. } | InstallEvent::RolledBack { .. }) => {
                EventLevel::Warn
            }

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Build(BuildEvent::StateChanged { .. } | BuildEvent::StepCompleted { .. })
            | Self::Install(InstallEvent::FetchStarted { .. }) => EventLevel::Debug,

            Self::Build(BuildEvent::StepOutput { .. }) => EventLevel::Trace,

            _ => EventLevel::Info,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        self.level().into()
    }

    /// Get the log target for this event
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "kiln::events::general",
            Self::Manifest(_) => "kiln::events::manifest",
            Self::Build(_) => "kiln::events::build",
            Self::Resolver(_) => "kiln::events::resolver",
            Self::Install(_) => "kiln::events::install",
        }
    }
}
