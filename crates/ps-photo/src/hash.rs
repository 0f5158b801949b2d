//! Content hashing
//!
//! Every photo entering the evidence chain is fingerprinted with SHA-256 over
//! its full byte stream. The digest binds the report to the exact pixels that
//! were captured; hashing anything less (a URI, a thumbnail) would void the
//! evidentiary value, so an unreadable file is a hard failure.

use crate::{PhotoError, PhotoResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Read buffer size for streaming file hashes.
const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// SHA-256 hex digest of in-memory bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of the full byte stream of a file.
///
/// Streams in chunks so multi-megabyte captures never sit in memory twice.
/// Any IO failure is fatal for the photo: an unhashed photo cannot enter the
/// evidence chain.
pub async fn hash_file(path: &Path) -> PhotoResult<String> {
    let mut file = File::open(path).await.map_err(|source| PhotoError::Unreadable {
        uri: path.display().to_string(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];

    loop {
        let read = file.read(&mut buf).await.map_err(|source| PhotoError::Unreadable {
            uri: path.display().to_string(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
