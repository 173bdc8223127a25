#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! BLAKE3 content identifiers for kiln
//!
//! Artifacts, cached downloads and installed records are identified by the
//! BLAKE3 digest of their bytes. Build strings derive from a digest over the
//! inputs that shaped the build.

use blake3::Hasher;
use kiln_errors::{Error, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// A BLAKE3 hash value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    bytes: [u8; 32],
}

impl Hash {
    /// Create a hash from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// First `len` hex characters, used in build strings
    #[must_use]
    pub fn short(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len);
        hex
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns an error if the input is not valid hexadecimal or not exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| StorageError::CorruptedData {
            message: format!("invalid hex: {e}"),
        })?;

        let array: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| StorageError::CorruptedData {
            message: format!("hash must be 32 bytes, got {}", b.len()),
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Compute hash of a byte slice
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self::from_bytes(*hash.as_bytes())
    }

    /// Hash an ordered list of string parts
    ///
    /// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
    #[must_use]
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Hasher::new();
        for part in parts {
            let part = part.as_ref().as_bytes();
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Compute hash of a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;

        let mut hasher = Hasher::new();
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self::from_bytes(*hasher.finalize().as_bytes()))
    }

    /// Compute hash while copying data to a writer
    ///
    /// # Errors
    /// Returns an error if reading from the reader or writing to the writer fails.
    pub async fn hash_and_copy<R, W>(mut reader: R, mut writer: W) -> Result<(Self, u64), Error>
    where
        R: AsyncReadExt + Unpin,
        W: AsyncWriteExt + Unpin,
    {
        let mut hasher = Hasher::new();
        let mut buffer = vec![0; CHUNK_SIZE];
        let mut total_bytes = 0u64;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }

            hasher.update(&buffer[..n]);
            writer.write_all(&buffer[..n]).await?;
            total_bytes += n as u64;
        }

        writer.flush().await?;
        Ok((Self::from_bytes(*hasher.finalize().as_bytes()), total_bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Verify a file matches an expected hash
///
/// # Errors
/// Returns an error if the file cannot be read or hashed.
pub async fn verify_file(path: &Path, expected: &Hash) -> Result<bool, Error> {
    let actual = Hash::hash_file(path).await?;
    Ok(actual == *expected)
}
