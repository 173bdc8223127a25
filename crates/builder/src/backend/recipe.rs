//! Recipe backend: run a YAML recipe's script and package `$PREFIX`

use super::{require_dir, Backend, BuildRequest};
use crate::packaging::{build_string, create_package, payload_paths};
use crate::recipe::{expand_string, load_recipe, run_script, Recipe, ScriptContext};
use async_trait::async_trait;
use kiln_errors::{BuildError, Error};
use kiln_events::{AppEvent, BuildEvent, EventEmitter};
use kiln_hash::Hash;
use kiln_types::{parse_version, BuildArtifact, PackageIndex, PackageSpec, Platform};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Recipe file looked up next to the manifest
pub const RECIPE_FILENAME: &str = "recipe.yaml";

/// Find the recipe for a project
///
/// An explicit path (relative to `manifest_dir`) wins; otherwise
/// `recipe.yaml` and then `recipe/recipe.yaml` are tried.
///
/// # Errors
///
/// Returns `BuildError::RecipeNotFound` listing every location tried.
pub async fn locate_recipe(
    manifest_dir: &Path,
    explicit: Option<&Path>,
) -> Result<PathBuf, Error> {
    let candidates: Vec<PathBuf> = match explicit {
        Some(path) => vec![manifest_dir.join(path)],
        None => vec![
            manifest_dir.join(RECIPE_FILENAME),
            manifest_dir.join("recipe").join(RECIPE_FILENAME),
        ],
    };

    for candidate in &candidates {
        if tokio::fs::metadata(candidate)
            .await
            .is_ok_and(|m| m.is_file())
        {
            return Ok(candidate.clone());
        }
    }

    let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    Err(BuildError::RecipeNotFound {
        path: tried.join(", "),
    }
    .into())
}

/// Runs the script steps of a recipe file
#[derive(Debug, Clone)]
pub struct RecipeBackend {
    manifest_dir: PathBuf,
    recipe: Option<PathBuf>,
}

impl RecipeBackend {
    #[must_use]
    pub fn new(manifest_dir: PathBuf, recipe: Option<PathBuf>) -> Self {
        Self {
            manifest_dir,
            recipe,
        }
    }

    /// Explicit recipe path from the manifest, if any
    #[must_use]
    pub fn recipe(&self) -> Option<&Path> {
        self.recipe.as_deref()
    }
}

/// Package identity after applying recipe overrides
struct Identity {
    name: String,
    version: kiln_types::Version,
    depends: Vec<String>,
}

fn identity(recipe: &Recipe, request: &BuildRequest) -> Result<Identity, Error> {
    let manifest = &request.manifest;
    let name = recipe
        .package
        .name
        .clone()
        .unwrap_or_else(|| manifest.package.name.clone());
    let version = match &recipe.package.version {
        Some(raw) => parse_version(raw).map_err(|e| BuildError::RecipeError {
            message: format!("package.version: {e}"),
        })?,
        None => manifest.version()?,
    };

    // Manifest runtime deps first, then recipe run requirements not already named
    let mut depends: Vec<PackageSpec> = manifest.runtime_deps()?;
    for raw in &recipe.requirements.run {
        let spec = PackageSpec::parse(raw).map_err(|e| BuildError::RecipeError {
            message: format!("invalid run requirement {raw}: {e}"),
        })?;
        if !depends.iter().any(|d| d.name == spec.name) {
            depends.push(spec);
        }
    }

    Ok(Identity {
        name,
        version,
        depends: depends.iter().map(ToString::to_string).collect(),
    })
}

/// Variables visible to `${VAR}` expansion and exported to each step
fn script_vars(
    recipe: &Recipe,
    identity: &Identity,
    prefix: &Path,
    request: &BuildRequest,
) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let version = identity.version.to_string();
    vars.insert("NAME".to_string(), identity.name.clone());
    vars.insert("PKG_NAME".to_string(), identity.name.clone());
    vars.insert("VERSION".to_string(), version.clone());
    vars.insert("PKG_VERSION".to_string(), version);
    vars.insert("PREFIX".to_string(), prefix.display().to_string());
    vars.insert(
        "SRC_DIR".to_string(),
        request.working_dir.display().to_string(),
    );
    vars.insert(
        "BUILD_NUMBER".to_string(),
        recipe.build.number.to_string(),
    );
    vars.insert("CPU_COUNT".to_string(), request.jobs.to_string());

    // Recipe env may reference the built-ins but not each other
    let builtins = vars.clone();
    for (key, value) in &recipe.env {
        vars.insert(key.clone(), expand_string(value, &builtins));
    }
    vars
}

#[async_trait]
impl Backend for RecipeBackend {
    fn name(&self) -> &'static str {
        kiln_manifest::BackendDescriptor::RECIPE
    }

    async fn build(&self, request: &BuildRequest) -> Result<BuildArtifact, Error> {
        require_dir(
            &request.working_dir,
            BuildError::WorkingDirNotFound {
                path: request.working_dir.display().to_string(),
            },
        )
        .await?;
        require_dir(
            &request.output_dir,
            BuildError::InvalidOutputDir {
                path: request.output_dir.display().to_string(),
            },
        )
        .await?;

        let recipe_path = locate_recipe(&self.manifest_dir, self.recipe.as_deref()).await?;
        let recipe = load_recipe(&recipe_path).await?;
        let recipe_hash = Hash::hash_file(&recipe_path).await?;
        let identity = identity(&recipe, request)?;

        let stage = tempfile::tempdir().map_err(|e| BuildError::Failed {
            message: format!("failed to create staging directory: {e}"),
        })?;
        let prefix = stage.path().join("prefix");
        kiln_root::create_dir_all(&prefix).await?;

        let vars = script_vars(&recipe, &identity, &prefix, request);
        let steps: Vec<String> = recipe
            .build
            .script
            .steps()
            .into_iter()
            .map(|step| expand_string(step, &vars))
            .collect();

        let ctx = ScriptContext {
            package: &identity.name,
            session_id: &request.session_id,
            working_dir: &request.working_dir,
            vars: &vars,
            event_sender: request.event_sender.as_ref(),
        };
        run_script(&steps, &ctx).await?;

        let build = match &recipe.build.string {
            Some(explicit) => explicit.clone(),
            None => {
                let inputs = [self.name().to_string(), recipe_hash.to_hex()]
                    .into_iter()
                    .chain(request.build_pins.clone());
                build_string(
                    &identity.name,
                    &identity.version,
                    inputs,
                    recipe.build.number,
                )
            }
        };
        let platform = if recipe.build.noarch {
            Platform::NoArch
        } else {
            Platform::current()
        };

        let files = payload_paths(&prefix)?.len();
        request.emit(AppEvent::Build(BuildEvent::PackagingStarted {
            session_id: request.session_id.clone(),
            package: identity.name.clone(),
            files,
        }));

        let index = PackageIndex {
            name: identity.name,
            version: identity.version,
            build,
            build_number: recipe.build.number,
            platform,
            depends: identity.depends,
        };
        create_package(&prefix, &index, &request.output_dir, request.compression_level).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_locate_recipe_search_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        assert!(matches!(
            locate_recipe(root, None).await,
            Err(Error::Build(BuildError::RecipeNotFound { .. }))
        ));

        std::fs::create_dir_all(root.join("recipe")).unwrap();
        std::fs::write(root.join("recipe/recipe.yaml"), "{}").unwrap();
        assert_eq!(
            locate_recipe(root, None).await.unwrap(),
            root.join("recipe/recipe.yaml")
        );

        std::fs::write(root.join("recipe.yaml"), "{}").unwrap();
        assert_eq!(
            locate_recipe(root, None).await.unwrap(),
            root.join("recipe.yaml")
        );

        std::fs::write(root.join("custom.yaml"), "{}").unwrap();
        assert_eq!(
            locate_recipe(root, Some(Path::new("custom.yaml")))
                .await
                .unwrap(),
            root.join("custom.yaml")
        );
    }
}
