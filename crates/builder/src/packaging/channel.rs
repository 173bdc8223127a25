//! Regenerating a local channel index from its artifacts

use super::read_package_index;
use kiln_errors::Error;
use kiln_hash::Hash;
use kiln_resolver::ChannelIndex;
use kiln_root::TEMP_PREFIX;
use kiln_types::ARTIFACT_EXTENSION;
use std::path::Path;

/// Rebuild `index.json` for every artifact found directly in `dir`
///
/// # Errors
///
/// Returns an error if the directory cannot be read, an artifact is not a
/// valid package, or the index cannot be written.
pub async fn index_channel(dir: &Path) -> Result<ChannelIndex, Error> {
    let mut artifacts = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dir))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // In-flight packaging output carries the temp prefix
        let is_artifact = path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION)
            && !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX);
        if is_artifact && entry.file_type().await?.is_file() {
            artifacts.push(path);
        }
    }
    artifacts.sort();

    let mut index = ChannelIndex::new();
    for path in artifacts {
        let package = read_package_index(&path).await?;
        let hash = Hash::hash_file(&path).await?;
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        index.insert(&package, file, hash.to_hex());
    }

    index.save(dir).await?;
    Ok(index)
}
