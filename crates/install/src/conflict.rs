//! File ownership conflicts between packages

use crate::staging::StagedPackage;
use kiln_errors::InstallError;
use kiln_types::InstalledRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Check that no path is claimed by two packages
///
/// `kept` are installed packages that stay in the environment; every staged
/// package must avoid their files and each other's.
///
/// # Errors
///
/// Returns `InstallError::Conflict` naming the path and both packages.
pub fn detect_conflicts(
    staged: &[StagedPackage],
    kept: &[&InstalledRecord],
) -> Result<(), InstallError> {
    let mut owners: BTreeMap<&str, String> = BTreeMap::new();
    for record in kept {
        for path in &record.files {
            owners.insert(path, record.package_id().to_string());
        }
    }

    for package in staged {
        let label = package.label();
        for path in &package.paths {
            if let Some(owner) = owners.get(path.as_str()) {
                return Err(InstallError::Conflict {
                    path: path.clone(),
                    first: owner.clone(),
                    second: label,
                });
            }
            owners.insert(path, label.clone());
        }
    }
    Ok(())
}

/// Check that no staged path would land on a file nobody owns
///
/// `existing` are all installed records, including the ones about to be
/// replaced. A path outside every record that is already present under
/// `env_root` was put there by hand and is never overwritten.
///
/// # Errors
///
/// Returns `InstallError::UntrackedFile` for the first such path.
pub async fn detect_untracked(
    env_root: &Path,
    staged: &[StagedPackage],
    existing: &[InstalledRecord],
) -> Result<(), InstallError> {
    let owned: BTreeSet<&str> = existing
        .iter()
        .flat_map(|record| record.files.iter().map(String::as_str))
        .collect();

    for package in staged {
        for path in &package.paths {
            if owned.contains(path.as_str()) {
                continue;
            }
            if tokio::fs::symlink_metadata(env_root.join(path)).await.is_ok() {
                return Err(InstallError::UntrackedFile {
                    path: path.clone(),
                    package: package.label(),
                });
            }
        }
    }
    Ok(())
}
