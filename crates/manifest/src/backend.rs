//! Build-backend descriptor

use kiln_errors::{BuildError, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// `[build-backend]` table as written in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildBackendSection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<PathBuf>,
}

/// Which backend adapter handles a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendDescriptor {
    /// Package the project sources directly
    Generic,
    /// Run the build steps of a recipe file
    Recipe {
        /// Explicit recipe path relative to the manifest directory
        recipe: Option<PathBuf>,
    },
}

impl BackendDescriptor {
    pub const GENERIC: &'static str = "generic";
    pub const RECIPE: &'static str = "recipe";

    /// Interpret a `[build-backend]` table; an absent table means generic
    ///
    /// # Errors
    ///
    /// Returns `BuildError::UnsupportedBackend` for unknown backend names.
    pub fn from_section(section: Option<&BuildBackendSection>) -> Result<Self, Error> {
        let Some(section) = section else {
            return Ok(Self::Generic);
        };

        match section.name.trim() {
            Self::GENERIC => Ok(Self::Generic),
            Self::RECIPE => Ok(Self::Recipe {
                recipe: section.recipe.clone(),
            }),
            other => Err(BuildError::UnsupportedBackend {
                name: other.to_string(),
            }
            .into()),
        }
    }

    /// Backend name as used in the manifest
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic => Self::GENERIC,
            Self::Recipe { .. } => Self::RECIPE,
        }
    }

    /// Convert back into a manifest table
    #[must_use]
    pub fn to_section(&self) -> BuildBackendSection {
        BuildBackendSection {
            name: self.name().to_string(),
            recipe: match self {
                Self::Generic => None,
                Self::Recipe { recipe } => recipe.clone(),
            },
        }
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
