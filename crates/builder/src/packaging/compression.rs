//! Zstandard compression for package artifacts

use kiln_errors::{Error, InstallError};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

/// Compress a tar file into `output_path` at the given zstd level
///
/// # Errors
///
/// Returns an error if either file cannot be opened or compression fails.
pub async fn compress_with_zstd(
    level: i32,
    tar_path: &Path,
    output_path: &Path,
) -> Result<(), Error> {
    use async_compression::tokio::write::ZstdEncoder;
    use async_compression::Level;

    let input_file = File::open(tar_path)
        .await
        .map_err(|e| Error::io_with_path(&e, tar_path))?;
    let output_file = File::create(output_path)
        .await
        .map_err(|e| Error::io_with_path(&e, output_path))?;

    let mut encoder = ZstdEncoder::with_quality(output_file, Level::Precise(level));
    let mut reader = BufReader::new(input_file);
    tokio::io::copy(&mut reader, &mut encoder).await?;

    // Flushes the final frame and the underlying file
    encoder.shutdown().await?;
    Ok(())
}

/// Decompress a whole artifact into memory
///
/// # Errors
///
/// Returns `InstallError::InvalidArtifact` if the file is not valid zstd.
pub async fn decompress_zstd(path: &Path) -> Result<Vec<u8>, Error> {
    use async_compression::tokio::bufread::ZstdDecoder;

    let file = File::open(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    let mut decoder = ZstdDecoder::new(BufReader::new(file));
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .await
        .map_err(|e| InstallError::InvalidArtifact {
            path: path.display().to_string(),
            message: format!("failed to decompress: {e}"),
        })?;
    Ok(data)
}
