//! Build backend error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error("unsupported build backend: {name}")]
    UnsupportedBackend { name: String },

    #[error("recipe not found: {path}")]
    RecipeNotFound { path: String },

    #[error("recipe error: {message}")]
    RecipeError { message: String },

    #[error("build step {step} failed with exit code {code:?}: {stderr}")]
    StepFailed {
        step: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("packaging failed: {message}")]
    PackagingFailed { message: String },

    #[error("output directory {path} is not a directory")]
    InvalidOutputDir { path: String },

    #[error("working directory not found: {path}")]
    WorkingDirNotFound { path: String },

    #[error("build failed: {message}")]
    Failed { message: String },
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedBackend { .. } => {
                Some("Set [build-backend] name to \"generic\" or \"recipe\".")
            }
            Self::RecipeNotFound { .. } => {
                Some("Place a recipe.yaml next to the manifest or set [build-backend] recipe.")
            }
            Self::RecipeError { .. } => {
                Some("Correct the recipe definition before retrying the build.")
            }
            Self::StepFailed { .. } => Some("Inspect the failing script step output above."),
            Self::InvalidOutputDir { .. } => Some("Point --output-dir at a directory."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnsupportedBackend { .. } => "build.unsupported_backend",
            Self::RecipeNotFound { .. } => "build.recipe_not_found",
            Self::RecipeError { .. } => "build.recipe_error",
            Self::StepFailed { .. } => "build.step_failed",
            Self::PackagingFailed { .. } => "build.packaging_failed",
            Self::InvalidOutputDir { .. } => "build.invalid_output_dir",
            Self::WorkingDirNotFound { .. } => "build.working_dir_not_found",
            Self::Failed { .. } => "build.failed",
        };
        Some(code)
    }
}
