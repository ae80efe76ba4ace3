//! File hashing helpers for build identities.
//!
//! Hashing itself is `dv_core::sha256`, the protocol's canonical hash
//! function; this module only adds the file I/O and hex formatting the CLI
//! needs.

use std::path::Path;

pub use dv_core::sha256;

/// Computes SHA-256 hash of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<[u8; 32], std::io::Error> {
    let data = std::fs::read(path)?;
    Ok(sha256(&data))
}

/// Formats a 32-byte hash as 64 lowercase hex characters, the shape pinned
/// into program artifacts.
pub fn format_hex64(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

/// SHA-256 of an engine artifact file as lowercase hex: the engine build
/// identity programs may pin.
pub fn engine_build_hash(path: &Path) -> Result<String, std::io::Error> {
    Ok(format_hex64(&sha256_file(path)?))
}
