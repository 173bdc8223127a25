//! Recipe parsing and execution module

pub mod executor;
pub mod model;
pub mod parser;

pub use executor::{run_script, ScriptContext};
pub use model::{Recipe, RecipeBuild, RecipePackage, RecipeRequirements, Script};
pub use parser::{expand_string, load_recipe, parse_recipe};
