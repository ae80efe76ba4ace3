//! Embedder SDK for the deterministic evaluator.
//!
//! This crate owns the host-side handshake: program artifact and input
//! envelope validation, manifest hash pinning, profile assembly, the
//! [`evaluate`] entry point, and the result surface embedders consume.
//! The engine itself stays behind [`vm_runtime::EngineBackend`]; the
//! `testing` feature ships a scripted stand-in for it.
//!
//! # Example
//!
//! ```ignore
//! use evaluator_sdk::{evaluate, EvalOptions, InputEnvelope};
//! use evaluator_sdk::testing::{host_v1_manifest, host_v1_handlers, program_for, ScriptedEngine};
//!
//! let manifest = host_v1_manifest();
//! let program = program_for(&manifest, "return document('path/to/doc');");
//! let report = evaluate(
//!     &mut engine,
//!     &program,
//!     &InputEnvelope::empty(),
//!     50_000,
//!     &manifest,
//!     handlers,
//!     &EvalOptions::default(),
//! )?;
//! ```

pub mod evaluate;
pub mod handlers;
pub mod input;
pub mod json;
pub mod program;
pub mod result;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use evaluate::{evaluate, EvalOptions, SetupError};
pub use handlers::{EmitSink, StaticDocumentStore, DOCUMENT_NOT_FOUND_CODE};
pub use input::{InputEnvelope, InputError};
pub use json::{dv_from_json, dv_to_json, DvJsonError};
pub use program::{Program, ProgramError, RuntimeFlags, MAX_ABI_ID_BYTES, MAX_PROGRAM_CODE_BYTES};
pub use result::{EvalFailure, EvalOutcome, EvalReport, FailureKind, FailureType};

// Re-export the protocol and runtime surfaces embedders touch directly.
pub use abi_manifest::{AbiFunction, AbiManifest, Effect, GasParams, ManifestError, ValueSchema};
pub use dv_core::{DvError, DvErrorKind, DvLimits, DvMap, DvValue};
pub use vm_runtime::{
    EngineBackend, EngineFault, GasMeter, GasTrace, HandlerOutcome, HandlerTable, HostCallError,
    HostHandler, TapeRecord,
};
