//! YAML recipe format
//!
//! ```yaml
//! package:
//!   name: smokey
//!   version: 0.1.0
//! build:
//!   number: 0
//!   noarch: true
//!   script:
//!     - mkdir -p ${PREFIX}/bin
//!     - cp smokey.sh ${PREFIX}/bin/smokey
//! requirements:
//!   run:
//!     - boltons
//! env:
//!   GREETING: hello from ${NAME}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete recipe document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Identity overrides; the manifest supplies anything left unset
    #[serde(default)]
    pub package: RecipePackage,

    #[serde(default)]
    pub build: RecipeBuild,

    #[serde(default)]
    pub requirements: RecipeRequirements,

    /// Extra variables exported to every script step
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipePackage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Build section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeBuild {
    #[serde(default)]
    pub number: u64,

    /// Explicit build string instead of the computed one
    #[serde(default)]
    pub string: Option<String>,

    /// Package is platform independent
    #[serde(default)]
    pub noarch: bool,

    #[serde(default)]
    pub script: Script,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRequirements {
    /// Runtime requirements recorded in the artifact
    #[serde(default)]
    pub run: Vec<String>,
}

/// Build script as a single shell snippet or a list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Script {
    Single(String),
    Steps(Vec<String>),
}

impl Default for Script {
    fn default() -> Self {
        Self::Steps(Vec::new())
    }
}

impl Script {
    /// Steps in execution order, blank entries dropped
    #[must_use]
    pub fn steps(&self) -> Vec<&str> {
        let steps: Vec<&str> = match self {
            Self::Single(script) => vec![script.as_str()],
            Self::Steps(steps) => steps.iter().map(String::as_str).collect(),
        };
        steps.into_iter().filter(|s| !s.trim().is_empty()).collect()
    }
}
