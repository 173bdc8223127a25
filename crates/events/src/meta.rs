use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::Level;

/// Lightweight severity levels used by the event system.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<EventLevel> for Level {
    fn from(level: EventLevel) -> Self {
        match level {
            EventLevel::Trace => Level::TRACE,
            EventLevel::Debug => Level::DEBUG,
            EventLevel::Info => Level::INFO,
            EventLevel::Warn => Level::WARN,
            EventLevel::Error => Level::ERROR,
        }
    }
}

/// Component that originated the event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventSource(Cow<'static, str>);

impl EventSource {
    pub const GENERAL: Self = Self::const_str("general");
    pub const MANIFEST: Self = Self::const_str("manifest");
    pub const BUILD: Self = Self::const_str("build");
    pub const RESOLVER: Self = Self::const_str("resolver");
    pub const INSTALL: Self = Self::const_str("install");

    const fn const_str(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    /// Borrow the underlying identifier used for logging.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
