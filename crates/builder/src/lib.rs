#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Build backends and artifact packaging for kiln
//!
//! This crate turns a project into a `.conda` artifact. The manifest's
//! `[build-backend]` table selects a [`BackendHandle`]: the generic backend
//! packages the project sources, the recipe backend runs the script of a
//! YAML recipe and packages whatever it installed into `$PREFIX`.
//!
//! The [`packaging`] module also reads artifacts back, which the installer
//! and channel indexing rely on.

mod backend;
pub mod packaging;
pub mod recipe;

pub use backend::{
    locate_recipe, select_backend, Backend, BackendHandle, BuildRequest, GenericBackend,
    RecipeBackend, DEFAULT_COMPRESSION_LEVEL, RECIPE_FILENAME,
};
pub use packaging::{
    build_string, create_package, extract_package, index_channel, read_package_contents,
    read_package_index, PackageContents,
};
pub use recipe::{parse_recipe, Recipe};
