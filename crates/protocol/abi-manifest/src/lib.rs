//! ABI manifest model, validation, and canonical hashing.
//!
//! The manifest describes every host function a program may call: install
//! path, effect class, argument/return shapes, gas coefficients, and
//! deterministic limits. Its canonical form is its deterministic-value
//! encoding; the SHA-256 of those bytes is pinned into each program
//! artifact and re-verified on every evaluator init.
//!
//! # no_std Support
//!
//! This crate is `#![no_std]` by default and uses `alloc` for heap
//! allocations. Enable the `std` feature for host-side tooling.

#![no_std]
#![forbid(unsafe_code)]
#![deny(clippy::std_instead_of_alloc)]
#![deny(clippy::std_instead_of_core)]

extern crate alloc;

pub mod canonical;
pub mod types;
pub mod validate;

pub use types::*;
pub use validate::validate;

/// Manifest ABI revision carried alongside `abi_id`.
pub const ABI_REVISION: u32 = 1;

/// Maximum canonical manifest size; coincides with the DV encoded-size cap.
pub const MAX_MANIFEST_BYTES: u32 = dv_core::MAX_ENCODED_BYTES;
