//! ABI manifest tooling: JSON documents, verification reports, and build
//! identities.
//!
//! The canonical manifest form lives in `abi-manifest`; this crate wraps it
//! with the embedder-facing pieces: the on-disk JSON document, a
//! human-readable verification report, and file hashing for engine build
//! identities.

pub mod doc;
pub mod hash;
pub mod verify;

pub use doc::{DocError, ErrorCodeDoc, FunctionDoc, GasDoc, LimitsDoc, ManifestDoc};
pub use hash::{engine_build_hash, format_hex64, sha256, sha256_file};
pub use verify::{verify_manifest_doc, VerificationReport};
