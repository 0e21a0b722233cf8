//! Content hashing helpers for media files and cache keys.
//!
//! Hashes are computed with streamed reads so large voice notes never have to
//! fit in memory. An optional `extra` suffix folds configuration fingerprints
//! into the digest, which is how cache keys bind an input file to the exact
//! settings that produced its transcription.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read size for streamed hashing (8 MB).
const HASH_READ_SIZE: usize = 8 * 1024 * 1024;

/// Compute the lowercase hex SHA-256 of a file's contents.
///
/// When `extra` is provided its UTF-8 bytes are appended to the digest input
/// after the file contents, so the same file under different settings yields
/// a different hash.
pub fn sha256_file(path: &Path, extra: Option<&str>) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_READ_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    if let Some(extra) = extra {
        hasher.update(extra.as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the lowercase hex SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
