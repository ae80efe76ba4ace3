//! Deterministic value model, canonical codec, and hashing for the
//! evaluator.
//!
//! This crate provides the foundational value space used at every boundary
//! of the deterministic evaluator: program inputs, host-call requests and
//! responses, the ABI manifest's canonical form, and evaluation results.
//!
//! # no_std Support
//!
//! This crate is `#![no_std]` by default and uses `alloc` for heap
//! allocations. Enable the `std` feature for host-side tooling that needs
//! std functionality.

#![no_std]
#![forbid(unsafe_code)]
#![deny(clippy::std_instead_of_alloc)]
#![deny(clippy::std_instead_of_core)]

extern crate alloc;

pub mod codec;
pub mod hash;
pub mod types;

pub use codec::*;
pub use hash::*;
pub use types::*;

/// Encoding version pinning the wire rules of this crate.
pub const ENCODING_VERSION: u32 = 1;

/// Maximum encoded size of a single value (1 MiB).
pub const MAX_ENCODED_BYTES: u32 = 1_048_576;

/// Maximum nesting depth; the root value counts as depth 1.
pub const MAX_DEPTH: u32 = 64;

/// Maximum UTF-8 byte length of a single string (256 KiB).
pub const MAX_STRING_BYTES: u32 = 262_144;

/// Maximum element count of a single array or map.
pub const MAX_CONTAINER_LEN: u32 = 65_535;

/// Largest integer magnitude representable exactly in a double (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Negative counterpart of [`MAX_SAFE_INTEGER`].
pub const MIN_SAFE_INTEGER: i64 = -9_007_199_254_740_991;
