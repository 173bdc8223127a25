//! YAML recipe parser with validation and variable expansion

use super::model::Recipe;
use kiln_errors::{BuildError, Error};
use kiln_types::PackageSpec;
use std::collections::BTreeMap;
use std::path::Path;

/// Parse a YAML recipe from a file
///
/// # Errors
///
/// Returns `BuildError::RecipeNotFound` if the file is missing, or
/// `BuildError::RecipeError` if it cannot be read, parsed or validated.
pub async fn load_recipe(path: &Path) -> Result<Recipe, Error> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BuildError::RecipeNotFound {
                path: path.display().to_string(),
            }
        } else {
            BuildError::RecipeError {
                message: format!("failed to read {}: {e}", path.display()),
            }
        }
    })?;

    parse_recipe(&content)
}

/// Parse a YAML recipe from a string
///
/// # Errors
///
/// Returns `BuildError::RecipeError` if the YAML is invalid or a field
/// fails validation.
pub fn parse_recipe(content: &str) -> Result<Recipe, Error> {
    let recipe: Recipe = serde_yml::from_str(content).map_err(|e| BuildError::RecipeError {
        message: format!("failed to parse YAML: {e}"),
    })?;

    validate_recipe(&recipe)?;
    Ok(recipe)
}

fn recipe_error(message: impl Into<String>) -> Error {
    BuildError::RecipeError {
        message: message.into(),
    }
    .into()
}

fn validate_recipe(recipe: &Recipe) -> Result<(), Error> {
    if recipe.package.name.as_deref().is_some_and(str::is_empty) {
        return Err(recipe_error("package.name cannot be empty"));
    }
    if recipe.package.version.as_deref().is_some_and(str::is_empty) {
        return Err(recipe_error("package.version cannot be empty"));
    }
    if recipe.build.string.as_deref().is_some_and(str::is_empty) {
        return Err(recipe_error("build.string cannot be empty"));
    }

    for requirement in &recipe.requirements.run {
        PackageSpec::parse(requirement)
            .map_err(|e| recipe_error(format!("invalid run requirement {requirement}: {e}")))?;
    }

    Ok(())
}

/// Replace `${VAR}` references with values from `vars`
///
/// Unknown variables are left untouched so the shell can still expand them.
#[must_use]
pub fn expand_string(input: &str, vars: &BTreeMap<String, String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(value) => result.push_str(value),
                    None => {
                        result.push_str("${");
                        result.push_str(key);
                        result.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_recipe() {
        let recipe = parse_recipe(
            r"
package:
  name: smokey
  version: 0.1.0
build:
  number: 2
  noarch: true
  script:
    - mkdir -p ${PREFIX}/bin
    - echo hi > ${PREFIX}/bin/smokey
requirements:
  run:
    - boltons>=24
env:
  GREETING: hello
",
        )
        .unwrap();

        assert_eq!(recipe.package.name.as_deref(), Some("smokey"));
        assert_eq!(recipe.build.number, 2);
        assert!(recipe.build.noarch);
        assert_eq!(recipe.build.script.steps().len(), 2);
        assert_eq!(recipe.requirements.run, vec!["boltons>=24"]);
        assert_eq!(recipe.env["GREETING"], "hello");
    }

    #[test]
    fn test_script_may_be_a_single_string() {
        let recipe = parse_recipe("build:\n  script: make install\n").unwrap();
        assert_eq!(recipe.build.script.steps(), vec!["make install"]);
        assert!(recipe.package.name.is_none());
    }

    #[test]
    fn test_invalid_recipes() {
        assert!(parse_recipe("package: [not, a, map]").is_err());
        assert!(parse_recipe("package:\n  name: \"\"\n").is_err());
        assert!(parse_recipe("requirements:\n  run:\n    - \"bad spec!\"\n").is_err());
    }

    #[test]
    fn test_expand_string() {
        let vars = BTreeMap::from([
            ("PREFIX".to_string(), "/stage/prefix".to_string()),
            ("NAME".to_string(), "smokey".to_string()),
        ]);
        assert_eq!(
            expand_string("${PREFIX}/bin/${NAME}", &vars),
            "/stage/prefix/bin/smokey"
        );
        assert_eq!(expand_string("${HOME}/x", &vars), "${HOME}/x");
        assert_eq!(expand_string("cost $5 ${NAME", &vars), "cost $5 ${NAME");
    }
}
