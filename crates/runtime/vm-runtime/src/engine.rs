//! The engine seam.
//!
//! The JS engine itself is a black box behind [`EngineBackend`]: the
//! runtime installs the deterministic profile through it, then hands it the
//! program source together with an [`EvalSession`] carrying the gas meter
//! and the host port. Engine builds are identified by the SHA-256 of their
//! artifact bytes so program artifacts can pin exact semantics.

use alloc::string::String;

use dv_core::DvValue;

use crate::gas::OutOfGas;
use crate::port::{EvalSession, HostCallError};
use crate::profile::ProfileConfig;

/// Terminal fault of one engine evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineFault {
    /// Uncatchable gas exhaustion.
    OutOfGas,
    /// User code threw and nothing caught it.
    JsException { name: String, message: String },
    /// A host error escaped user code (reserved or manifest-declared).
    Host { code: String, tag: String },
    /// Engine-internal failure outside the deterministic contract.
    Internal { message: String },
}

impl From<OutOfGas> for EngineFault {
    fn from(_: OutOfGas) -> Self {
        EngineFault::OutOfGas
    }
}

impl EngineFault {
    /// Canonical fault for a host-call error the program did not catch.
    pub fn from_uncaught_host_call(error: HostCallError) -> Self {
        match error {
            HostCallError::OutOfGas => EngineFault::OutOfGas,
            HostCallError::BadArgs { message } => EngineFault::JsException {
                name: String::from("TypeError"),
                message,
            },
            HostCallError::Transport => EngineFault::Host {
                code: String::from(abi_manifest::ERROR_CODE_HOST_TRANSPORT),
                tag: String::from(abi_manifest::ERROR_TAG_HOST_TRANSPORT),
            },
            HostCallError::EnvelopeInvalid => EngineFault::Host {
                code: String::from(abi_manifest::ERROR_CODE_HOST_ENVELOPE_INVALID),
                tag: String::from(abi_manifest::ERROR_TAG_HOST_ENVELOPE_INVALID),
            },
            HostCallError::Declared { code, tag, .. } => EngineFault::Host { code, tag },
        }
    }
}

/// Black-box deterministic engine.
///
/// Implementations must be deterministic with respect to `(profile, code,
/// session)`: same inputs and engine artifact produce the same observable
/// behavior, including the gas charges driven through the session's meter.
pub trait EngineBackend {
    /// SHA-256 of the engine artifact bytes (the build identity programs
    /// may pin).
    fn build_hash(&self) -> [u8; 32];

    /// Installs the deterministic profile into a fresh context. Called
    /// exactly once, before any user code runs.
    fn install_profile(&mut self, profile: &ProfileConfig) -> Result<(), EngineFault>;

    /// Runs the program to completion under the session's gas meter.
    /// Returns the program's result converted to the deterministic value
    /// space, or the terminal fault.
    fn evaluate(
        &mut self,
        code: &str,
        session: &mut EvalSession<'_>,
    ) -> Result<DvValue, EngineFault>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_uncaught_host_call_mapping() {
        assert_eq!(
            EngineFault::from_uncaught_host_call(HostCallError::Transport),
            EngineFault::Host {
                code: "HOST_TRANSPORT".to_string(),
                tag: "host/transport".to_string(),
            }
        );
        assert_eq!(
            EngineFault::from_uncaught_host_call(HostCallError::EnvelopeInvalid),
            EngineFault::Host {
                code: "HOST_ENVELOPE_INVALID".to_string(),
                tag: "host/envelope_invalid".to_string(),
            }
        );
        assert_eq!(
            EngineFault::from_uncaught_host_call(HostCallError::OutOfGas),
            EngineFault::OutOfGas
        );
    }
}
