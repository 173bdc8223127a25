use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// General utility events for warnings, errors, and operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    Warning {
        message: String,
        context: Option<String>,
    },

    Error {
        message: String,
        details: Option<String>,
    },

    /// Debug logging with structured context
    DebugLog {
        message: String,
        context: BTreeMap<String, String>,
    },

    OperationStarted {
        operation: String,
    },

    OperationCompleted {
        operation: String,
        success: bool,
    },

    OperationFailed {
        operation: String,
        error: String,
    },
}

impl GeneralEvent {
    /// Create a warning event
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: None,
        }
    }

    /// Create a warning event with context
    pub fn warning_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
        }
    }

    /// Create a debug log event
    pub fn debug(message: impl Into<String>) -> Self {
        Self::DebugLog {
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Create a debug log event with context
    pub fn debug_with_context(
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> Self {
        Self::DebugLog {
            message: message.into(),
            context,
        }
    }
}
