use alloc::string::String;
use alloc::vec::Vec;

use dv_core::DvError;

// ============================================================================
// Reserved Codes
// ============================================================================
//
// These two code/tag pairs belong to the host-call transport itself. They are
// raised by the runtime when a syscall fails below the envelope layer, so no
// manifest may ever claim them: a handler that could "declare" transport
// failure would make transport errors indistinguishable from handler errors.

/// Reserved code raised on syscall transport failure.
pub const ERROR_CODE_HOST_TRANSPORT: &str = "HOST_TRANSPORT";

/// Tag paired with [`ERROR_CODE_HOST_TRANSPORT`].
pub const ERROR_TAG_HOST_TRANSPORT: &str = "host/transport";

/// Reserved code raised when a response envelope fails structural validation.
pub const ERROR_CODE_HOST_ENVELOPE_INVALID: &str = "HOST_ENVELOPE_INVALID";

/// Tag paired with [`ERROR_CODE_HOST_ENVELOPE_INVALID`].
pub const ERROR_TAG_HOST_ENVELOPE_INVALID: &str = "host/envelope_invalid";

/// The only two codes rejected verbatim during manifest validation.
pub const RESERVED_ERROR_CODES: [&str; 2] =
    [ERROR_CODE_HOST_ENVELOPE_INVALID, ERROR_CODE_HOST_TRANSPORT];

/// Declarable code with dispatcher-special behavior: when present, oversized
/// requests and unencodable responses produce this error envelope instead of
/// a transport failure.
pub const ERROR_CODE_LIMIT_EXCEEDED: &str = "LIMIT_EXCEEDED";

/// Path segments that may never appear in a `js_path` (prototype-chain
/// pollution vectors).
pub const FORBIDDEN_PATH_SEGMENTS: [&str; 3] = ["__proto__", "prototype", "constructor"];

// ============================================================================
// Manifest Model
// ============================================================================

/// Side-effect class of a host function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Read,
    Emit,
    Mutate,
}

impl Effect {
    /// Canonical wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Read => "READ",
            Effect::Emit => "EMIT",
            Effect::Mutate => "MUTATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "READ" => Some(Effect::Read),
            "EMIT" => Some(Effect::Emit),
            "MUTATE" => Some(Effect::Mutate),
            _ => None,
        }
    }
}

/// Shape constraint on a single argument or on the return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSchema {
    /// Must be a string.
    String,
    /// Any deterministic value.
    Dv,
    /// Must be null.
    Null,
}

impl ValueSchema {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueSchema::String => "string",
            ValueSchema::Dv => "dv",
            ValueSchema::Null => "null",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ValueSchema::String),
            "dv" => Some(ValueSchema::Dv),
            "null" => Some(ValueSchema::Null),
            _ => None,
        }
    }
}

/// Gas model of one host function: the wrapper charges
/// `base + k_arg_bytes * req_len` before the syscall and
/// `k_ret_bytes * resp_len + k_units * units` after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasParams {
    /// Cost-schedule revision these coefficients were written against.
    pub schedule_id: u32,
    pub base: u32,
    pub k_arg_bytes: u32,
    pub k_ret_bytes: u32,
    pub k_units: u32,
}

/// Deterministic limits of one host function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FnLimits {
    /// Upper bound on the encoded request (1 ..= DV encoded-size cap).
    pub max_request_bytes: u32,
    /// Upper bound on the encoded response envelope (1 ..= DV cap).
    pub max_response_bytes: u32,
    /// Upper bound on handler-reported work units.
    pub max_units: u32,
    /// Optional per-argument UTF-8 byte caps; when present, one entry per
    /// argument and only `string` schema positions may carry a cap.
    pub arg_utf8_max: Option<Vec<u32>>,
}

/// One declared error code and the tag it maps to when thrown into JS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorCodeEntry {
    pub code: String,
    pub tag: String,
}

/// One host function as pinned by the manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct AbiFunction {
    /// Stable numeric identifier, >= 1, never reused.
    pub fn_id: u32,
    /// Install point inside the `Host.v1` namespace.
    pub js_path: Vec<String>,
    pub effect: Effect,
    pub arity: u32,
    pub arg_schema: Vec<ValueSchema>,
    pub return_schema: ValueSchema,
    pub gas: GasParams,
    pub limits: FnLimits,
    /// Declared error codes, sorted strictly ascending.
    pub error_codes: Vec<ErrorCodeEntry>,
}

impl AbiFunction {
    /// Tag for a declared code, if this function declares it.
    pub fn tag_for_code(&self, code: &str) -> Option<&str> {
        self.error_codes
            .iter()
            .find(|entry| entry.code == code)
            .map(|entry| entry.tag.as_str())
    }

    pub fn declares_code(&self, code: &str) -> bool {
        self.tag_for_code(code).is_some()
    }

    /// Worst-case wrapper charge for one call, if it fits in 64 bits.
    pub fn worst_case_gas(&self) -> Option<u64> {
        let req = (self.gas.k_arg_bytes as u64).checked_mul(self.limits.max_request_bytes as u64)?;
        let ret =
            (self.gas.k_ret_bytes as u64).checked_mul(self.limits.max_response_bytes as u64)?;
        let units = (self.gas.k_units as u64).checked_mul(self.limits.max_units as u64)?;
        (self.gas.base as u64)
            .checked_add(req)?
            .checked_add(ret)?
            .checked_add(units)
    }
}

/// The ABI manifest: every host function visible to programs, pinned by a
/// content hash carried in each program artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct AbiManifest {
    pub abi_id: String,
    pub abi_version: u32,
    /// Sorted strictly ascending by `fn_id`.
    pub functions: Vec<AbiFunction>,
}

impl AbiManifest {
    /// Looks up a function by its numeric id.
    pub fn function(&self, fn_id: u32) -> Option<&AbiFunction> {
        self.functions
            .binary_search_by_key(&fn_id, |f| f.fn_id)
            .ok()
            .map(|pos| &self.functions[pos])
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Structural or semantic manifest failure.
///
/// All manifest errors carry the `vm/manifest` tag when surfaced through the
/// evaluator.
#[derive(Clone, Debug, PartialEq)]
pub enum ManifestError {
    /// A map carried a key outside its exact key set.
    UnknownKey { context: &'static str, key: String },
    /// A required key was absent.
    MissingKey { context: &'static str, key: &'static str },
    /// A key held a value of the wrong shape.
    WrongType { context: &'static str, key: &'static str },
    /// `fn_id` must be >= 1.
    FnIdZero,
    /// `functions` not sorted strictly ascending by `fn_id`.
    FnIdOrder { fn_id: u32 },
    /// Empty `js_path` or empty segment.
    JsPathEmpty { fn_id: u32 },
    /// Segment outside `[A-Za-z0-9_-]+`.
    JsPathSegmentInvalid { fn_id: u32 },
    /// Segment is a prototype-chain pollution vector.
    JsPathForbiddenSegment { fn_id: u32 },
    /// Two functions share a js_path prefix relation.
    JsPathCollision { fn_id_a: u32, fn_id_b: u32 },
    /// `arg_schema` length differs from `arity`.
    ArityMismatch { fn_id: u32 },
    /// `arg_utf8_max` length differs from `arity`.
    ArgUtf8MaxShape { fn_id: u32 },
    /// `arg_utf8_max` caps a non-string argument.
    ArgUtf8MaxNonString { fn_id: u32, index: usize },
    /// `max_request_bytes` outside [1, DV cap].
    RequestLimitOutOfRange { fn_id: u32 },
    /// `max_response_bytes` outside [1, DV cap].
    ResponseLimitOutOfRange { fn_id: u32 },
    /// `error_codes` not sorted strictly ascending by code.
    ErrorCodeOrder { fn_id: u32 },
    /// Empty code or tag string.
    ErrorCodeEmpty { fn_id: u32 },
    /// A reserved transport code appeared in the manifest.
    ReservedErrorCode { fn_id: u32 },
    /// Worst-case gas charge does not fit in 64 bits.
    WorstCaseGasOverflow { fn_id: u32 },
    /// Canonical encoding or decoding failed.
    Codec(DvError),
}

impl From<DvError> for ManifestError {
    fn from(e: DvError) -> Self {
        ManifestError::Codec(e)
    }
}

impl core::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ManifestError::UnknownKey { context, key } => {
                write!(f, "unknown key `{}` in {}", key, context)
            }
            ManifestError::MissingKey { context, key } => {
                write!(f, "missing key `{}` in {}", key, context)
            }
            ManifestError::WrongType { context, key } => {
                write!(f, "wrong value shape for `{}` in {}", key, context)
            }
            ManifestError::FnIdZero => write!(f, "fn_id must be >= 1"),
            ManifestError::FnIdOrder { fn_id } => {
                write!(f, "functions not strictly ascending at fn_id {}", fn_id)
            }
            ManifestError::JsPathEmpty { fn_id } => {
                write!(f, "empty js_path segment in fn {}", fn_id)
            }
            ManifestError::JsPathSegmentInvalid { fn_id } => {
                write!(f, "invalid js_path segment in fn {}", fn_id)
            }
            ManifestError::JsPathForbiddenSegment { fn_id } => {
                write!(f, "forbidden js_path segment in fn {}", fn_id)
            }
            ManifestError::JsPathCollision { fn_id_a, fn_id_b } => {
                write!(f, "js_path collision between fn {} and fn {}", fn_id_a, fn_id_b)
            }
            ManifestError::ArityMismatch { fn_id } => {
                write!(f, "arg_schema length != arity in fn {}", fn_id)
            }
            ManifestError::ArgUtf8MaxShape { fn_id } => {
                write!(f, "arg_utf8_max length != arity in fn {}", fn_id)
            }
            ManifestError::ArgUtf8MaxNonString { fn_id, index } => {
                write!(f, "arg_utf8_max[{}] caps a non-string arg in fn {}", index, fn_id)
            }
            ManifestError::RequestLimitOutOfRange { fn_id } => {
                write!(f, "max_request_bytes out of range in fn {}", fn_id)
            }
            ManifestError::ResponseLimitOutOfRange { fn_id } => {
                write!(f, "max_response_bytes out of range in fn {}", fn_id)
            }
            ManifestError::ErrorCodeOrder { fn_id } => {
                write!(f, "error_codes not strictly ascending in fn {}", fn_id)
            }
            ManifestError::ErrorCodeEmpty { fn_id } => {
                write!(f, "empty error code or tag in fn {}", fn_id)
            }
            ManifestError::ReservedErrorCode { fn_id } => {
                write!(f, "reserved error code declared in fn {}", fn_id)
            }
            ManifestError::WorstCaseGasOverflow { fn_id } => {
                write!(f, "worst-case gas overflows u64 in fn {}", fn_id)
            }
            ManifestError::Codec(e) => write!(f, "manifest codec failure: {}", e),
        }
    }
}
