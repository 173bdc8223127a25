#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Project manifest handling for kiln
//!
//! A project is described by a `kiln.toml` file:
//!
//! ```toml
//! [package]
//! name = "smokey"
//! version = "0.1.0"
//! channels = ["channel"]
//!
//! [dependencies]
//! runtime = ["boltons", "flask>=2.0"]
//! build = []
//!
//! [build-backend]
//! name = "recipe"
//! recipe = "recipe.yaml"
//! ```

mod backend;

pub use backend::{BackendDescriptor, BuildBackendSection};

use kiln_errors::{Error, ManifestError};
use kiln_types::{parse_version, DepKind, PackageId, PackageSpec, Version};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File name of a project manifest
pub const MANIFEST_FILENAME: &str = "kiln.toml";

/// Project manifest (`kiln.toml` contents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub package: PackageInfo,
    #[serde(default)]
    pub dependencies: Dependencies,
    #[serde(
        rename = "build-backend",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub build_backend: Option<BuildBackendSection>,
}

/// Package information section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Channel directories, relative to the manifest directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
}

/// Dependencies section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub runtime: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<String>,
}

/// Accept either a manifest file or the directory containing `kiln.toml`
#[must_use]
pub fn resolve_manifest_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(MANIFEST_FILENAME)
    } else {
        path.to_path_buf()
    }
}

/// Directory a manifest's relative paths are interpreted against
#[must_use]
pub fn manifest_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn malformed(origin: &Path, message: impl Into<String>) -> Error {
    ManifestError::Malformed {
        path: origin.display().to_string(),
        message: message.into(),
    }
    .into()
}

impl Manifest {
    /// Create a manifest with no dependencies and the generic backend
    #[must_use]
    pub fn new(name: impl Into<String>, version: &Version) -> Self {
        Self {
            package: PackageInfo {
                name: name.into(),
                version: version.to_string(),
                description: None,
                channels: Vec::new(),
            },
            dependencies: Dependencies::default(),
            build_backend: None,
        }
    }

    /// Parse and validate manifest TOML
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Malformed` if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, origin: &Path) -> Result<Self, Error> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| malformed(origin, e.message().to_string()))?;
        manifest
            .validate()
            .map_err(|e| malformed(origin, e.to_string()))?;
        Ok(manifest)
    }

    /// Load a manifest from disk
    ///
    /// `path` may name the directory holding `kiln.toml`.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::NotFound` if the file does not exist and
    /// `ManifestError::Malformed` if it cannot be parsed or validated.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let path = resolve_manifest_path(path);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound {
                    path: path.display().to_string(),
                }
                .into()
            } else {
                malformed(&path, format!("failed to read manifest: {e}"))
            }
        })?;
        Self::parse(&content, &path)
    }

    /// Serialize to TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized to TOML format.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| {
            ManifestError::WriteFailed {
                path: "<inline>".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Persist the manifest, replacing the file atomically
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::WriteFailed` if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<(), Error> {
        let path = resolve_manifest_path(path);
        let content = self.to_toml()?;
        kiln_root::atomic_write(&path, content.as_bytes())
            .await
            .map_err(|e| {
                ManifestError::WriteFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Validate manifest fields
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, the version does not parse,
    /// a dependency spec is malformed or a dependency name repeats.
    pub fn validate(&self) -> Result<(), Error> {
        let name =
            PackageSpec::parse(&self.package.name).map_err(|_| ManifestError::InvalidDependency {
                spec: self.package.name.clone(),
                message: "package name must be non-empty and use [A-Za-z0-9._-]".to_string(),
            })?;
        if !name.version_spec.is_any() {
            return Err(ManifestError::InvalidDependency {
                spec: self.package.name.clone(),
                message: "package name must not carry a version constraint".to_string(),
            }
            .into());
        }

        self.version()?;

        let mut seen = HashSet::new();
        for (spec, _) in self.dependency_specs()? {
            if !seen.insert(spec.name.clone()) {
                return Err(ManifestError::DuplicateDependency { name: spec.name }.into());
            }
        }

        Ok(())
    }

    /// Parse the package version
    ///
    /// # Errors
    ///
    /// Returns an error if the version string is not a valid version.
    pub fn version(&self) -> Result<Version, Error> {
        parse_version(&self.package.version).map_err(Into::into)
    }

    /// Package identity
    ///
    /// # Errors
    ///
    /// Returns an error if the version string is not a valid version.
    pub fn package_id(&self) -> Result<PackageId, Error> {
        Ok(PackageId::new(self.package.name.clone(), self.version()?))
    }

    /// Every declared dependency in declaration order, runtime first
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidDependency` for a malformed entry.
    pub fn dependency_specs(&self) -> Result<Vec<(PackageSpec, DepKind)>, Error> {
        let runtime = self.dependencies.runtime.iter().map(|s| (s, DepKind::Runtime));
        let build = self.dependencies.build.iter().map(|s| (s, DepKind::Build));

        runtime
            .chain(build)
            .map(|(raw, kind)| {
                PackageSpec::parse(raw)
                    .map(|spec| (spec, kind))
                    .map_err(|e| {
                        ManifestError::InvalidDependency {
                            spec: raw.clone(),
                            message: e.to_string(),
                        }
                        .into()
                    })
            })
            .collect()
    }

    /// Runtime dependencies as `PackageSpec`
    ///
    /// # Errors
    ///
    /// Returns an error if any runtime entry cannot be parsed.
    pub fn runtime_deps(&self) -> Result<Vec<PackageSpec>, Error> {
        Ok(self
            .dependency_specs()?
            .into_iter()
            .filter(|(_, kind)| *kind == DepKind::Runtime)
            .map(|(spec, _)| spec)
            .collect())
    }

    /// Build dependencies as `PackageSpec`
    ///
    /// # Errors
    ///
    /// Returns an error if any build entry cannot be parsed.
    pub fn build_deps(&self) -> Result<Vec<PackageSpec>, Error> {
        Ok(self
            .dependency_specs()?
            .into_iter()
            .filter(|(_, kind)| *kind == DepKind::Build)
            .map(|(spec, _)| spec)
            .collect())
    }

    /// Whether a dependency with this name is declared in either list
    #[must_use]
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies
            .runtime
            .iter()
            .chain(&self.dependencies.build)
            .filter_map(|raw| PackageSpec::parse(raw).ok())
            .any(|spec| spec.name == name)
    }

    /// Append a runtime dependency, preserving declaration order
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::DuplicateDependency` if the name is already declared.
    pub fn add_dependency(&mut self, spec: &PackageSpec) -> Result<(), Error> {
        self.add_dependency_of_kind(spec, DepKind::Runtime)
    }

    /// Append a dependency to the list for `kind`
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::DuplicateDependency` if the name is already declared.
    pub fn add_dependency_of_kind(
        &mut self,
        spec: &PackageSpec,
        kind: DepKind,
    ) -> Result<(), Error> {
        if self.has_dependency(&spec.name) {
            return Err(ManifestError::DuplicateDependency {
                name: spec.name.clone(),
            }
            .into());
        }

        let list = match kind {
            DepKind::Runtime => &mut self.dependencies.runtime,
            DepKind::Build => &mut self.dependencies.build,
        };
        list.push(spec.to_string());
        Ok(())
    }

    /// Resolve the backend descriptor
    ///
    /// # Errors
    ///
    /// Returns `BuildError::UnsupportedBackend` for unknown backend names.
    pub fn backend_descriptor(&self) -> Result<BackendDescriptor, Error> {
        BackendDescriptor::from_section(self.build_backend.as_ref())
    }

    /// Channel directories as absolute paths
    #[must_use]
    pub fn channels(&self, manifest_dir: &Path) -> Vec<PathBuf> {
        self.package
            .channels
            .iter()
            .map(|c| manifest_dir.join(c))
            .collect()
    }
}

/// Load the manifest at `path`, append `spec` and persist the result
///
/// # Errors
///
/// Returns the load error, `ManifestError::DuplicateDependency`, or the save error.
pub async fn add_dependency(
    path: &Path,
    spec: &PackageSpec,
    kind: DepKind,
) -> Result<Manifest, Error> {
    let mut manifest = Manifest::load(path).await?;
    manifest.add_dependency_of_kind(spec, kind)?;
    manifest.save(path).await?;
    Ok(manifest)
}

/// Builder for creating manifests
pub struct ManifestBuilder {
    manifest: Manifest,
}

impl ManifestBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new(name: impl Into<String>, version: &Version) -> Self {
        Self {
            manifest: Manifest::new(name, version),
        }
    }

    /// Set description
    #[must_use]
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.manifest.package.description = Some(desc.into());
        self
    }

    /// Add runtime dependency
    #[must_use]
    pub fn depends_on(mut self, spec: &str) -> Self {
        self.manifest.dependencies.runtime.push(spec.to_string());
        self
    }

    /// Add build dependency
    #[must_use]
    pub fn build_depends_on(mut self, spec: &str) -> Self {
        self.manifest.dependencies.build.push(spec.to_string());
        self
    }

    /// Add a channel directory
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.manifest.package.channels.push(channel.into());
        self
    }

    /// Select the build backend
    #[must_use]
    pub fn backend(mut self, descriptor: &BackendDescriptor) -> Self {
        self.manifest.build_backend = match descriptor {
            BackendDescriptor::Generic => None,
            recipe @ BackendDescriptor::Recipe { .. } => Some(recipe.to_section()),
        };
        self
    }

    /// Build the manifest
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest validation fails.
    pub fn build(self) -> Result<Manifest, Error> {
        self.manifest.validate()?;
        Ok(self.manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let manifest = Manifest::from_toml(
            r#"
[package]
name = "flask-hello-world"
version = "0.1"
"#,
        )
        .unwrap();
        assert_eq!(manifest.version().unwrap(), Version::new(0, 1, 0));
        assert!(manifest.runtime_deps().unwrap().is_empty());
        assert_eq!(manifest.backend_descriptor().unwrap(), BackendDescriptor::Generic);
    }

    #[test]
    fn test_duplicate_across_lists_is_malformed() {
        let err = Manifest::from_toml(
            r#"
[package]
name = "app"
version = "1.0.0"

[dependencies]
runtime = ["boltons"]
build = ["boltons>=1"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Manifest(ManifestError::Malformed { .. })));
        assert!(err.to_string().contains("boltons"));
    }

    #[test]
    fn test_bad_version_is_malformed() {
        let err =
            Manifest::from_toml("[package]\nname = \"app\"\nversion = \"latest\"\n").unwrap_err();
        assert!(matches!(err, Error::Manifest(ManifestError::Malformed { .. })));
    }

    #[test]
    fn test_add_dependency_rejects_duplicates() {
        let mut manifest = ManifestBuilder::new("app", &Version::new(1, 0, 0))
            .build_depends_on("cmake")
            .build()
            .unwrap();

        manifest.add_dependency(&PackageSpec::parse("boltons").unwrap()).unwrap();
        let err = manifest
            .add_dependency(&PackageSpec::parse("cmake>=3").unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Manifest(ManifestError::DuplicateDependency { ref name }) if name == "cmake"
        ));
        assert_eq!(manifest.dependencies.runtime, vec!["boltons"]);
    }

    #[test]
    fn test_unknown_backend_surfaces_at_selection() {
        let manifest = Manifest::from_toml(
            r#"
[package]
name = "app"
version = "1.0.0"

[build-backend]
name = "setuptools"
"#,
        )
        .unwrap();
        let err = manifest.backend_descriptor().unwrap_err();
        assert_eq!(
            kiln_errors::UserFacingError::user_code(&err),
            Some("build.unsupported_backend")
        );
    }
}
