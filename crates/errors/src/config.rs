//! Errors from loading `config.toml` and applying overrides

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    NotFound { path: String },

    #[error("config file {path} is not valid TOML: {message}")]
    Malformed { path: String, message: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some(match self {
            Self::NotFound { .. } => "Check the --config path, or drop the flag to use defaults.",
            Self::Malformed { .. } => "Fix the TOML syntax reported above.",
            Self::InvalidValue { .. } => "Correct the named setting and run the command again.",
        })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::NotFound { .. } => "config.not_found",
            Self::Malformed { .. } => "config.malformed",
            Self::InvalidValue { .. } => "config.invalid_value",
        })
    }
}
