//! Evaluation result surface.
//!
//! Every evaluation that got past init reports gas, regardless of outcome.
//! Failures split into two families: VM errors (the program ran and died)
//! and invalid output (the program ran fine but returned something outside
//! the deterministic value space).

use dv_core::DvValue;
use vm_runtime::{EngineFault, GasTrace, OutOfGas, TapeRecord};

/// Result of one evaluation that reached the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalReport {
    pub outcome: EvalOutcome,
    pub gas_used: u64,
    pub gas_remaining: u64,
    /// Audit tape, when enabled. Oldest record first.
    pub tape: Option<Vec<TapeRecord>>,
    /// Aggregate gas counters, when enabled.
    pub gas_trace: Option<GasTrace>,
}

impl EvalReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, EvalOutcome::Success { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EvalOutcome {
    /// The program returned a deterministic value; `raw` is its canonical
    /// encoding.
    Success { value: DvValue, raw: Vec<u8> },
    Failure(EvalFailure),
}

/// Failure family: a VM error versus a non-encodable return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureType {
    VmError,
    InvalidOutput,
}

impl FailureType {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureType::VmError => "vm-error",
            FailureType::InvalidOutput => "invalid-output",
        }
    }
}

/// Classified failure kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    HostError,
    OutOfGas,
    ManifestError,
    JsException,
    InvalidOutput,
    Unknown,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::HostError => "host-error",
            FailureKind::OutOfGas => "out-of-gas",
            FailureKind::ManifestError => "manifest-error",
            FailureKind::JsException => "js-exception",
            FailureKind::InvalidOutput => "invalid-output",
            FailureKind::Unknown => "unknown",
        }
    }
}

/// A classified evaluation failure.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalFailure {
    pub failure_type: FailureType,
    pub kind: FailureKind,
    pub code: String,
    pub tag: String,
    pub message: String,
}

impl EvalFailure {
    /// Classifies a terminal engine fault.
    pub fn from_engine_fault(fault: EngineFault) -> Self {
        match fault {
            EngineFault::OutOfGas => Self {
                failure_type: FailureType::VmError,
                kind: FailureKind::OutOfGas,
                code: OutOfGas::CODE.to_string(),
                tag: OutOfGas::TAG.to_string(),
                message: "gas limit exhausted".to_string(),
            },
            EngineFault::JsException { name, message } => Self {
                failure_type: FailureType::VmError,
                kind: FailureKind::JsException,
                code: "JS_EXCEPTION".to_string(),
                tag: "vm/js_exception".to_string(),
                message: format!("{}: {}", name, message),
            },
            EngineFault::Host { code, tag } => Self {
                failure_type: FailureType::VmError,
                kind: FailureKind::HostError,
                code,
                tag,
                message: "uncaught host error".to_string(),
            },
            EngineFault::Internal { message } => Self {
                failure_type: FailureType::VmError,
                kind: FailureKind::Unknown,
                code: "UNKNOWN".to_string(),
                tag: "vm/unknown".to_string(),
                message,
            },
        }
    }

    /// The program returned a value outside the deterministic value space.
    pub fn invalid_output(reason: dv_core::DvError) -> Self {
        Self {
            failure_type: FailureType::InvalidOutput,
            kind: FailureKind::InvalidOutput,
            code: "INVALID_OUTPUT".to_string(),
            tag: "vm/invalid_output".to_string(),
            message: format!("returned value is not encodable: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oog_classification() {
        let failure = EvalFailure::from_engine_fault(EngineFault::OutOfGas);
        assert_eq!(failure.failure_type, FailureType::VmError);
        assert_eq!(failure.kind, FailureKind::OutOfGas);
        assert_eq!(failure.code, "OOG");
        assert_eq!(failure.tag, "vm/out_of_gas");
    }

    #[test]
    fn test_js_exception_classification() {
        let failure = EvalFailure::from_engine_fault(EngineFault::JsException {
            name: "TypeError".to_string(),
            message: "eval is disabled in deterministic mode".to_string(),
        });
        assert_eq!(failure.kind, FailureKind::JsException);
        assert_eq!(
            failure.message,
            "TypeError: eval is disabled in deterministic mode"
        );
    }

    #[test]
    fn test_host_error_keeps_manifest_tag() {
        let failure = EvalFailure::from_engine_fault(EngineFault::Host {
            code: "NOT_FOUND".to_string(),
            tag: "document/not_found".to_string(),
        });
        assert_eq!(failure.kind, FailureKind::HostError);
        assert_eq!(failure.tag, "document/not_found");
    }

    #[test]
    fn test_invalid_output_is_not_a_vm_error() {
        let failure = EvalFailure::invalid_output(dv_core::DvError::new(
            dv_core::DvErrorKind::UnsupportedType,
        ));
        assert_eq!(failure.failure_type, FailureType::InvalidOutput);
        assert_eq!(failure.code, "INVALID_OUTPUT");
    }
}
