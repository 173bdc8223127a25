//! CLI error handling

use std::fmt;

use kiln_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Operations error
    Ops(kiln_errors::Error),
    /// Invalid command arguments
    InvalidArguments(String),
    /// I/O error
    Io(std::io::Error),
}

impl CliError {
    /// Code, hint and retry lines shown in debug mode
    pub fn details(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let CliError::Ops(e) = self {
            if let Some(code) = e.user_code() {
                lines.push(format!("Code: {code}"));
            }
            if let Some(hint) = e.user_hint() {
                lines.push(format!("Hint: {hint}"));
            }
            if e.is_retryable() {
                lines.push("Retry: safe to retry this operation.".to_string());
            }
        }
        lines
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Ops(e) => write!(f, "{}", e.user_message()),
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Ops(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::InvalidArguments(_) => None,
        }
    }
}

impl From<kiln_errors::Error> for CliError {
    fn from(e: kiln_errors::Error) -> Self {
        CliError::Ops(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
