//! Artifact packaging and inspection
//!
//! An artifact is a zstd-compressed tar holding `info/index.json`,
//! `info/paths.json` and the payload under `files/`.

mod archive;
mod channel;
mod compression;

pub use archive::{get_deterministic_timestamp, payload_paths, write_package_tar};
pub use channel::index_channel;
pub use compression::{compress_with_zstd, decompress_zstd};

use kiln_errors::{BuildError, Error, InstallError};
use kiln_hash::Hash;
use kiln_root::TEMP_PREFIX;
use kiln_types::{BuildArtifact, PackageIndex, Version};
use std::path::Path;

/// Package metadata entry inside an artifact
pub const INFO_INDEX: &str = "info/index.json";
/// Sorted payload listing inside an artifact
pub const INFO_PATHS: &str = "info/paths.json";
/// Directory holding the payload inside an artifact
pub const FILES_DIR: &str = "files";

/// Hex digits of the content hash kept in a build string
const BUILD_HASH_LEN: usize = 7;

/// Build string `h<hash>_<number>` derived from the build inputs
///
/// `inputs` should contain everything that distinguishes two builds of the
/// same version, such as the backend name and resolved build pins.
#[must_use]
pub fn build_string<I, S>(name: &str, version: &Version, inputs: I, build_number: u64) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let version = version.to_string();
    let mut parts: Vec<String> = vec![name.to_string(), version];
    parts.extend(inputs.into_iter().map(|s| s.as_ref().to_string()));
    let hash = Hash::from_parts(&parts);
    format!("h{}_{build_number}", hash.short(BUILD_HASH_LEN))
}

/// Metadata and file listing of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContents {
    pub index: PackageIndex,
    /// Payload paths relative to the install root
    pub paths: Vec<String>,
}

/// Package `payload_dir` into `<output_dir>/<name>-<version>-<build>.conda`
///
/// The archive is assembled in temporary files inside `output_dir` and
/// renamed into place only once complete. If this future fails or is
/// dropped, the temporary files are removed and no artifact is left behind.
///
/// # Errors
///
/// Returns `BuildError::PackagingFailed` or an I/O error if the archive
/// cannot be written.
pub async fn create_package(
    payload_dir: &Path,
    index: &PackageIndex,
    output_dir: &Path,
    compression_level: i32,
) -> Result<BuildArtifact, Error> {
    let paths = payload_paths(payload_dir)?;
    let index_json = serde_json::to_vec_pretty(index)?;

    let tar_file = temp_file_in(output_dir, ".tar")?;
    write_package_tar(payload_dir, index_json, &paths, tar_file.path()).await?;

    let artifact_file = temp_file_in(output_dir, ".conda")?;
    compress_with_zstd(compression_level, tar_file.path(), artifact_file.path()).await?;
    drop(tar_file);

    let hash = Hash::hash_file(artifact_file.path()).await?;

    let filename = index.filename();
    let path = output_dir.join(&filename);
    artifact_file
        .persist(&path)
        .map_err(|e| BuildError::PackagingFailed {
            message: format!("failed to move artifact into {}: {}", path.display(), e.error),
        })?;

    Ok(BuildArtifact {
        filename,
        path,
        hash: hash.to_hex(),
        platform: index.platform,
        package: index.package_id(),
        build: index.build.clone(),
    })
}

fn temp_file_in(dir: &Path, suffix: &str) -> Result<tempfile::NamedTempFile, Error> {
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| Error::io_with_path(&e, dir))
}

fn invalid_artifact(path: &Path, message: impl Into<String>) -> Error {
    InstallError::InvalidArtifact {
        path: path.display().to_string(),
        message: message.into(),
    }
    .into()
}

fn parse_index(path: &Path, data: &[u8]) -> Result<PackageIndex, Error> {
    serde_json::from_slice(data)
        .map_err(|e| invalid_artifact(path, format!("malformed {INFO_INDEX}: {e}")))
}

fn parse_paths(path: &Path, data: &[u8]) -> Result<Vec<String>, Error> {
    serde_json::from_slice(data)
        .map_err(|e| invalid_artifact(path, format!("malformed {INFO_PATHS}: {e}")))
}

/// Read `info/index.json` and `info/paths.json` without unpacking the payload
///
/// # Errors
///
/// Returns `InstallError::InvalidArtifact` if the file is not a kiln artifact.
pub async fn read_package_contents(path: &Path) -> Result<PackageContents, Error> {
    let tar_data = decompress_zstd(path).await?;
    let origin = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<PackageContents, Error> {
        let index = archive::read_entry(&tar_data, INFO_INDEX)?
            .ok_or_else(|| invalid_artifact(&origin, format!("missing {INFO_INDEX}")))?;
        let paths = archive::read_entry(&tar_data, INFO_PATHS)?
            .ok_or_else(|| invalid_artifact(&origin, format!("missing {INFO_PATHS}")))?;
        Ok(PackageContents {
            index: parse_index(&origin, &index)?,
            paths: parse_paths(&origin, &paths)?,
        })
    })
    .await
    .map_err(|e| Error::internal(format!("read task failed: {e}")))?
}

/// Read only the package metadata of an artifact
///
/// # Errors
///
/// Returns `InstallError::InvalidArtifact` if the file is not a kiln artifact.
pub async fn read_package_index(path: &Path) -> Result<PackageIndex, Error> {
    Ok(read_package_contents(path).await?.index)
}

/// Unpack an artifact into `dest`
///
/// Afterwards `dest` holds `info/` and the payload under `files/`.
///
/// # Errors
///
/// Returns `InstallError::InvalidArtifact` for corrupt archives or entries
/// escaping `dest`.
pub async fn extract_package(path: &Path, dest: &Path) -> Result<PackageContents, Error> {
    let tar_data = decompress_zstd(path).await?;
    kiln_root::create_dir_all(dest).await?;

    let origin = path.to_path_buf();
    let target = dest.to_path_buf();
    tokio::task::spawn_blocking(move || archive::unpack_tar(&tar_data, &target, &origin))
        .await
        .map_err(|e| Error::internal(format!("extract task failed: {e}")))??;

    let index = read_extracted(path, &dest.join(INFO_INDEX)).await?;
    let paths = read_extracted(path, &dest.join(INFO_PATHS)).await?;
    Ok(PackageContents {
        index: parse_index(path, &index)?,
        paths: parse_paths(path, &paths)?,
    })
}

async fn read_extracted(artifact: &Path, file: &Path) -> Result<Vec<u8>, Error> {
    match tokio::fs::read(file).await {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(invalid_artifact(
            artifact,
            format!("missing {}", file.display()),
        )),
        Err(e) => Err(Error::io_with_path(&e, file)),
    }
}
