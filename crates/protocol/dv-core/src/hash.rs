//! SHA-256 hashing and lowercase-hex helpers.
//!
//! Every content hash in the protocol (manifest hash, engine build hash,
//! tape request/response hashes) is SHA-256 rendered as 64 lowercase hex
//! characters without a prefix.

use alloc::string::String;
use alloc::vec::Vec;

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of arbitrary bytes.
///
/// This is the canonical hash function used throughout the protocol.
#[inline]
#[must_use]
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Formats a 32-byte hash as 64 lowercase hex characters.
#[must_use]
pub fn hex64(hash: &[u8; 32]) -> String {
    let mut out = String::with_capacity(64);
    for byte in hash {
        out.push(hex_digit(byte >> 4));
        out.push(hex_digit(byte & 0x0f));
    }
    out
}

/// Convenience: SHA-256 then lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex64(&sha256(bytes))
}

fn hex_digit(nibble: u8) -> char {
    debug_assert!(nibble < 16);
    char::from(if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' + (nibble - 10)
    })
}

/// Errors from parsing hex hash strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HexParseError {
    /// Length is not exactly 64 characters.
    InvalidLength { expected: usize, actual: usize },
    /// A character outside `[0-9a-f]`. Uppercase is rejected: hashes are
    /// pinned in lowercase.
    InvalidCharacter { position: usize },
}

impl core::fmt::Display for HexParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HexParseError::InvalidLength { expected, actual } => {
                write!(f, "expected {} hex chars, got {}", expected, actual)
            }
            HexParseError::InvalidCharacter { position } => {
                write!(f, "invalid hex character at position {}", position)
            }
        }
    }
}

/// Parses exactly 64 lowercase hex characters into a 32-byte hash.
pub fn parse_hex64(s: &str) -> Result<[u8; 32], HexParseError> {
    let bytes = s.as_bytes();
    if bytes.len() != 64 {
        return Err(HexParseError::InvalidLength {
            expected: 64,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; 32];
    for (i, chunk) in bytes.chunks_exact(2).enumerate() {
        let hi = nibble(chunk[0]).ok_or(HexParseError::InvalidCharacter { position: i * 2 })?;
        let lo = nibble(chunk[1]).ok_or(HexParseError::InvalidCharacter {
            position: i * 2 + 1,
        })?;
        out[i] = (hi << 4) | lo;
    }
    Ok(out)
}

/// Checks that a string is a well-formed lowercase hex64 hash.
pub fn validate_hex64(s: &str) -> Result<(), HexParseError> {
    parse_hex64(s).map(|_| ())
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Hex-encodes arbitrary bytes in lowercase (diagnostics and fixtures).
#[must_use]
pub fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(hex_digit(byte >> 4));
        out.push(hex_digit(byte & 0x0f));
    }
    out
}

/// Parses arbitrary-length lowercase hex into bytes (fixtures).
pub fn parse_hex(s: &str) -> Result<Vec<u8>, HexParseError> {
    let bytes = s.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(HexParseError::InvalidLength {
            expected: bytes.len() + 1,
            actual: bytes.len(),
        });
    }
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for (i, chunk) in bytes.chunks_exact(2).enumerate() {
        let hi = nibble(chunk[0]).ok_or(HexParseError::InvalidCharacter { position: i * 2 })?;
        let lo = nibble(chunk[1]).ok_or(HexParseError::InvalidCharacter {
            position: i * 2 + 1,
        })?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        // SHA-256 of empty input is well-known.
        assert_eq!(
            sha256_hex(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hello_world() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hex64_roundtrip() {
        let hash = [0x42u8; 32];
        let hex = hex64(&hash);
        assert_eq!(hex.len(), 64);
        assert_eq!(parse_hex64(&hex).unwrap(), hash);
    }

    #[test]
    fn test_parse_rejects_uppercase() {
        let mut hex = hex64(&[0xabu8; 32]);
        hex.make_ascii_uppercase();
        assert!(matches!(
            parse_hex64(&hex),
            Err(HexParseError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(
            parse_hex64("abcd"),
            Err(HexParseError::InvalidLength {
                expected: 64,
                actual: 4
            })
        );
    }

    #[test]
    fn test_parse_hex_arbitrary() {
        assert_eq!(parse_hex("deadbeef").unwrap(), [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(hex_lower(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }
}
