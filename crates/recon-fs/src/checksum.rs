//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! content verification during migration and for audit snapshot entries.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Prefix for all checksums produced by this module
pub const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of in-memory content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// The file is streamed in fixed-size chunks so large uploads are never
/// held in memory.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_file_checksum(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

/// Short hex digest of a string key, used to derive stable name suffixes.
///
/// `len` is clamped to the 64 hex characters a SHA-256 digest provides.
pub fn short_digest(key: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..len.min(hex.len())].to_string()
}
