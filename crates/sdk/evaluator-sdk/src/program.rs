//! Program artifact validation.
//!
//! A program artifact carries the source text plus everything that pins its
//! semantics: the ABI identity, the manifest hash, and optionally the
//! engine build hash and runtime flags. Validation happens before any
//! engine state is created.

use serde::{Deserialize, Serialize};

use dv_core::hash::{validate_hex64, HexParseError};
use vm_runtime::MAX_TAPE_CAPACITY;

/// Upper bound on program source (1 MiB).
pub const MAX_PROGRAM_CODE_BYTES: usize = 1_048_576;

/// Upper bound on the ABI identifier.
pub const MAX_ABI_ID_BYTES: usize = 128;

/// Program artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Program source text.
    pub code: String,
    /// ABI namespace identifier, e.g. `"workflow.host"`.
    pub abi_id: String,
    /// ABI revision this program targets.
    pub abi_version: u32,
    /// Pinned manifest hash (64 lowercase hex chars).
    pub abi_manifest_hash: String,
    /// Optional pinned engine build hash (64 lowercase hex chars).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_build_hash: Option<String>,
    /// Optional per-program runtime flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_flags: Option<RuntimeFlags>,
}

/// Per-program overrides of the embedder's evaluation options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_trace: Option<bool>,
}

/// Program artifact rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgramError {
    #[error("program code exceeds {MAX_PROGRAM_CODE_BYTES} bytes: {size}")]
    CodeTooLarge { size: usize },

    #[error("abi_id must be non-empty")]
    AbiIdEmpty,

    #[error("abi_id exceeds {MAX_ABI_ID_BYTES} bytes: {size}")]
    AbiIdTooLong { size: usize },

    #[error("abi_manifest_hash malformed: {0}")]
    BadManifestHash(HexParseError),

    #[error("engine_build_hash malformed: {0}")]
    BadEngineHash(HexParseError),

    #[error("tape capacity {requested} outside [1, {MAX_TAPE_CAPACITY}]")]
    TapeCapacityOutOfRange { requested: u32 },
}

impl Program {
    /// Validates bounded lengths and hash shapes.
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.code.len() > MAX_PROGRAM_CODE_BYTES {
            return Err(ProgramError::CodeTooLarge {
                size: self.code.len(),
            });
        }
        if self.abi_id.is_empty() {
            return Err(ProgramError::AbiIdEmpty);
        }
        if self.abi_id.len() > MAX_ABI_ID_BYTES {
            return Err(ProgramError::AbiIdTooLong {
                size: self.abi_id.len(),
            });
        }
        validate_hex64(&self.abi_manifest_hash).map_err(ProgramError::BadManifestHash)?;
        if let Some(engine_hash) = &self.engine_build_hash {
            validate_hex64(engine_hash).map_err(ProgramError::BadEngineHash)?;
        }
        if let Some(flags) = &self.runtime_flags {
            if let Some(capacity) = flags.tape_capacity {
                if capacity == 0 || capacity as usize > MAX_TAPE_CAPACITY {
                    return Err(ProgramError::TapeCapacityOutOfRange {
                        requested: capacity,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_program() -> Program {
        Program {
            code: "return 1;".to_string(),
            abi_id: "workflow.host".to_string(),
            abi_version: 1,
            abi_manifest_hash: "a".repeat(64),
            engine_build_hash: None,
            runtime_flags: None,
        }
    }

    #[test]
    fn test_valid_program_passes() {
        valid_program().validate().unwrap();
    }

    #[test]
    fn test_bad_hash_rejected() {
        let mut p = valid_program();
        p.abi_manifest_hash = "XYZ".to_string();
        assert!(matches!(
            p.validate(),
            Err(ProgramError::BadManifestHash(_))
        ));

        let mut p = valid_program();
        p.abi_manifest_hash = "A".repeat(64); // uppercase
        assert!(matches!(
            p.validate(),
            Err(ProgramError::BadManifestHash(_))
        ));
    }

    #[test]
    fn test_engine_hash_optional_but_checked() {
        let mut p = valid_program();
        p.engine_build_hash = Some("b".repeat(64));
        p.validate().unwrap();

        p.engine_build_hash = Some("b".repeat(63));
        assert!(matches!(p.validate(), Err(ProgramError::BadEngineHash(_))));
    }

    #[test]
    fn test_abi_id_bounds() {
        let mut p = valid_program();
        p.abi_id = String::new();
        assert_eq!(p.validate(), Err(ProgramError::AbiIdEmpty));

        let mut p = valid_program();
        p.abi_id = "x".repeat(MAX_ABI_ID_BYTES + 1);
        assert!(matches!(p.validate(), Err(ProgramError::AbiIdTooLong { .. })));
    }

    #[test]
    fn test_tape_capacity_bounds() {
        let mut p = valid_program();
        p.runtime_flags = Some(RuntimeFlags {
            tape: Some(true),
            tape_capacity: Some(0),
            gas_trace: None,
        });
        assert_eq!(
            p.validate(),
            Err(ProgramError::TapeCapacityOutOfRange { requested: 0 })
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let mut p = valid_program();
        p.runtime_flags = Some(RuntimeFlags {
            tape: Some(true),
            tape_capacity: Some(64),
            gas_trace: Some(false),
        });
        let json = serde_json::to_string(&p).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
