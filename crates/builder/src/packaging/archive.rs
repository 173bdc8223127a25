//! Deterministic tar archives for reproducible artifacts
//!
//! Entries are added in lexicographic order with normalized ownership,
//! permissions and timestamps, so identical inputs produce identical bytes.

use super::{FILES_DIR, INFO_INDEX, INFO_PATHS};
use kiln_errors::{BuildError, Error, InstallError};
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Default deterministic timestamp (Unix epoch)
const DETERMINISTIC_TIMESTAMP: u64 = 0;

/// Standard variable for reproducible build timestamps
const SOURCE_DATE_EPOCH_VAR: &str = "SOURCE_DATE_EPOCH";

/// Timestamp stamped on every entry; honours `SOURCE_DATE_EPOCH`
#[must_use]
pub fn get_deterministic_timestamp() -> u64 {
    std::env::var(SOURCE_DATE_EPOCH_VAR)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(DETERMINISTIC_TIMESTAMP)
}

/// Relative paths of every file and symlink under `payload_dir`, sorted
///
/// # Errors
///
/// Returns an error if the directory cannot be walked.
pub fn payload_paths(payload_dir: &Path) -> Result<Vec<String>, Error> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(payload_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::PackagingFailed {
            message: format!("failed to walk {}: {e}", payload_dir.display()),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(payload_dir)
            .map_err(|e| Error::internal(format!("walked outside payload dir: {e}")))?;
        paths.push(to_archive_path(relative));
    }
    paths.sort();
    Ok(paths)
}

/// Forward-slash form of a relative path
pub(crate) fn to_archive_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write `info/` metadata and the payload under `files/` into `tar_path`
///
/// # Errors
///
/// Returns an error if any file cannot be read or the tar cannot be written.
pub async fn write_package_tar(
    payload_dir: &Path,
    index_json: Vec<u8>,
    paths: &[String],
    tar_path: &Path,
) -> Result<(), Error> {
    let payload_dir = payload_dir.to_path_buf();
    let tar_path = tar_path.to_path_buf();
    let paths = paths.to_vec();
    let timestamp = get_deterministic_timestamp();

    tokio::task::spawn_blocking(move || -> Result<(), Error> {
        let paths_json = serde_json::to_vec_pretty(&paths)?;
        let file = std::fs::File::create(&tar_path)
            .map_err(|e| Error::io_with_path(&e, &tar_path))?;
        let mut builder = tar::Builder::new(std::io::BufWriter::new(file));
        builder.follow_symlinks(false);

        append_directory(&mut builder, "info/", timestamp)?;
        append_bytes(&mut builder, INFO_INDEX, &index_json, timestamp)?;
        append_bytes(&mut builder, INFO_PATHS, &paths_json, timestamp)?;

        append_directory(&mut builder, &format!("{FILES_DIR}/"), timestamp)?;
        add_directory_to_tar(
            &mut builder,
            &payload_dir,
            Path::new(FILES_DIR),
            timestamp,
        )?;

        builder.into_inner()?.flush()?;
        Ok(())
    })
    .await
    .map_err(|e| BuildError::PackagingFailed {
        message: format!("tar creation task failed: {e}"),
    })?
}

fn normalized_header(
    entry_type: tar::EntryType,
    size: u64,
    mode: u32,
    timestamp: u64,
) -> Result<tar::Header, Error> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(timestamp);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root")?;
    header.set_groupname("root")?;
    header.set_device_major(0)?;
    header.set_device_minor(0)?;
    Ok(header)
}

fn append_directory<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    timestamp: u64,
) -> Result<(), Error> {
    let mut header = normalized_header(tar::EntryType::Directory, 0, 0o755, timestamp)?;
    builder.append_data(&mut header, path, std::io::empty())?;
    Ok(())
}

fn append_bytes<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
    timestamp: u64,
) -> Result<(), Error> {
    let mut header =
        normalized_header(tar::EntryType::Regular, data.len() as u64, 0o644, timestamp)?;
    builder.append_data(&mut header, path, data)?;
    Ok(())
}

/// Recursively add directory contents in sorted order
fn add_directory_to_tar<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    dir_path: &Path,
    tar_path: &Path,
    timestamp: u64,
) -> Result<(), Error> {
    let mut entries = std::fs::read_dir(dir_path)
        .map_err(|e| Error::io_with_path(&e, dir_path))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let file_path = entry.path();
        let entry_path = tar_path.join(entry.file_name());
        let archive_path = to_archive_path(&entry_path);
        let metadata = std::fs::symlink_metadata(&file_path)?;

        if metadata.is_dir() {
            append_directory(builder, &format!("{archive_path}/"), timestamp)?;
            add_directory_to_tar(builder, &file_path, &entry_path, timestamp)?;
        } else if metadata.is_file() {
            let mut file = std::fs::File::open(&file_path)?;
            let mut header = normalized_header(
                tar::EntryType::Regular,
                metadata.len(),
                normalize_file_permissions(&metadata),
                timestamp,
            )?;
            builder.append_data(&mut header, &archive_path, &mut file)?;
        } else if metadata.is_symlink() {
            let target = std::fs::read_link(&file_path)?;
            let mut header = normalized_header(tar::EntryType::Symlink, 0, 0o777, timestamp)?;
            header.set_link_name(&target)?;
            builder.append_data(&mut header, &archive_path, std::io::empty())?;
        }
        // Device nodes and fifos are not packaged
    }

    Ok(())
}

#[cfg(unix)]
fn normalize_file_permissions(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn normalize_file_permissions(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

/// Read a single entry out of decompressed tar bytes
pub(crate) fn read_entry(tar_data: &[u8], wanted: &str) -> Result<Option<Vec<u8>>, Error> {
    use std::io::Read;

    let mut archive = tar::Archive::new(Cursor::new(tar_data));
    for entry in archive.entries()? {
        let mut entry = entry?;
        if to_archive_path(&entry.path()?) == wanted {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// Unpack decompressed tar bytes into `dest`, refusing entries that escape it
pub(crate) fn unpack_tar(tar_data: &[u8], dest: &Path, origin: &Path) -> Result<(), Error> {
    let mut archive = tar::Archive::new(Cursor::new(tar_data));
    archive.set_preserve_permissions(true);
    archive.set_unpack_xattrs(false);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path: PathBuf = entry.path()?.into_owned();
        let escapes = path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(InstallError::InvalidArtifact {
                path: origin.display().to_string(),
                message: format!("entry {} escapes the package root", path.display()),
            }
            .into());
        }
        entry.unpack_in(dest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_paths_are_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib/pkg")).unwrap();
        std::fs::write(dir.path().join("lib/pkg/b.py"), b"b").unwrap();
        std::fs::write(dir.path().join("lib/pkg/a.py"), b"a").unwrap();
        std::fs::write(dir.path().join("README"), b"r").unwrap();

        let paths = payload_paths(dir.path()).unwrap();
        assert_eq!(paths, vec!["README", "lib/pkg/a.py", "lib/pkg/b.py"]);
    }

    #[test]
    fn test_timestamp_defaults_to_epoch() {
        if std::env::var(SOURCE_DATE_EPOCH_VAR).is_err() {
            assert_eq!(get_deterministic_timestamp(), 0);
        }
    }
}
