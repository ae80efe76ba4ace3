//! Wire-level host-call dispatcher.
//!
//! A single syscall connects the engine to host code:
//!
//! ```text
//! host_call(fn_id, req_ptr, req_len, resp_ptr, resp_cap) -> resp_len | SENTINEL
//! ```
//!
//! Request bytes are read-only for the host and valid only for the duration
//! of the call; the response envelope is written whole into the response
//! region. The sentinel signals fatal transport failure. Reentrancy is
//! strictly forbidden: a per-dispatcher latch refuses nested invocations.
//!
//! Everything the dispatcher refuses (unknown function ids, malformed
//! requests, handler contract violations, unencodable envelopes) surfaces
//! as transport failure rather than a guessed envelope, so a misbehaving
//! host can never forge a well-formed response.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use abi_manifest::{
    AbiManifest, GasParams, ManifestError, ValueSchema, ERROR_CODE_LIMIT_EXCEEDED,
};
use dv_core::{DvError, DvErrorKind, DvLimits, DvMap, DvValue};

use crate::memory::LinearMemory;

/// Fatal transport failure marker returned by `host_call`.
pub const HOST_CALL_SENTINEL: u32 = u32::MAX;

// ============================================================================
// Handler Contract
// ============================================================================

/// What a host handler produced for one invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerOutcome {
    /// Success with a return value and reported work units.
    Ok { value: DvValue, units: u32 },
    /// Declared failure with a manifest error code.
    Err {
        code: String,
        details: Option<DvValue>,
        units: u32,
    },
}

/// Embedder-supplied backend for one host function.
///
/// Handlers must be deterministic with respect to their observable inputs
/// and must not call back into the engine, suspend, or yield.
pub trait HostHandler {
    fn call(&mut self, args: &[DvValue]) -> HandlerOutcome;
}

impl<F> HostHandler for F
where
    F: FnMut(&[DvValue]) -> HandlerOutcome,
{
    fn call(&mut self, args: &[DvValue]) -> HandlerOutcome {
        self(args)
    }
}

/// Handlers keyed by function id, consumed by the dispatcher at build time.
#[derive(Default)]
pub struct HandlerTable {
    entries: Vec<(u32, Box<dyn HostHandler>)>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, fn_id: u32, handler: impl HostHandler + 'static) -> Self {
        self.entries.push((fn_id, Box::new(handler)));
        self
    }

    pub fn insert(&mut self, fn_id: u32, handler: impl HostHandler + 'static) {
        self.entries.push((fn_id, Box::new(handler)));
    }

    fn take(&mut self, fn_id: u32) -> Option<Box<dyn HostHandler>> {
        let pos = self.entries.iter().position(|(id, _)| *id == fn_id)?;
        Some(self.entries.swap_remove(pos).1)
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

/// Decoded response envelope: exactly one of ok/err plus work units.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub units: u32,
    pub body: EnvelopeBody,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnvelopeBody {
    Ok(DvValue),
    Err {
        code: String,
        details: Option<DvValue>,
    },
}

/// Envelope failed structural validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeInvalid;

impl Envelope {
    /// Encodes the envelope under the given byte cap.
    pub fn encode(&self, max_encoded_bytes: u32) -> Result<Vec<u8>, DvError> {
        let limits = DvLimits::with_max_encoded_bytes(max_encoded_bytes);
        let mut root = DvMap::new();
        root.insert("units".into(), DvValue::Int(self.units as i64))?;
        match &self.body {
            EnvelopeBody::Ok(value) => {
                root.insert("ok".into(), value.clone())?;
            }
            EnvelopeBody::Err { code, details } => {
                let mut err = DvMap::new();
                err.insert("code".into(), DvValue::String(code.clone()))?;
                if let Some(details) = details {
                    err.insert("details".into(), details.clone())?;
                }
                root.insert("err".into(), DvValue::Map(err))?;
            }
        }
        dv_core::encode(&DvValue::Map(root), &limits)
    }

    /// Decodes and structurally validates an envelope. Any deviation from
    /// the exact shape (extra keys, both or neither of ok/err, non-integer
    /// units) is invalid.
    pub fn decode(bytes: &[u8], max_encoded_bytes: u32) -> Result<Self, EnvelopeInvalid> {
        let limits = DvLimits::with_max_encoded_bytes(max_encoded_bytes);
        let value = dv_core::decode(bytes, &limits).map_err(|_| EnvelopeInvalid)?;
        let map = value.as_map().ok_or(EnvelopeInvalid)?;

        let mut units: Option<u32> = None;
        let mut ok: Option<DvValue> = None;
        let mut err: Option<(String, Option<DvValue>)> = None;

        for (key, entry) in map.iter() {
            match key {
                "units" => match entry {
                    DvValue::Int(n) if (0..=u32::MAX as i64).contains(n) => {
                        units = Some(*n as u32);
                    }
                    _ => return Err(EnvelopeInvalid),
                },
                "ok" => ok = Some(entry.clone()),
                "err" => {
                    let err_map = entry.as_map().ok_or(EnvelopeInvalid)?;
                    let mut code: Option<String> = None;
                    let mut details: Option<DvValue> = None;
                    for (err_key, err_entry) in err_map.iter() {
                        match err_key {
                            "code" => match err_entry {
                                DvValue::String(s) => code = Some(s.clone()),
                                _ => return Err(EnvelopeInvalid),
                            },
                            "details" => details = Some(err_entry.clone()),
                            _ => return Err(EnvelopeInvalid),
                        }
                    }
                    err = Some((code.ok_or(EnvelopeInvalid)?, details));
                }
                _ => return Err(EnvelopeInvalid),
            }
        }

        let units = units.ok_or(EnvelopeInvalid)?;
        let body = match (ok, err) {
            (Some(value), None) => EnvelopeBody::Ok(value),
            (None, Some((code, details))) => EnvelopeBody::Err { code, details },
            _ => return Err(EnvelopeInvalid),
        };
        Ok(Envelope { units, body })
    }
}

// ============================================================================
// Bindings
// ============================================================================

/// Per-function dispatch state derived from the manifest at build time.
#[derive(Clone, Debug)]
pub struct FnBinding {
    pub fn_id: u32,
    pub js_path: Vec<String>,
    pub arity: u32,
    pub arg_schema: Vec<ValueSchema>,
    pub return_schema: ValueSchema,
    pub gas: GasParams,
    pub max_request_bytes: u32,
    pub max_response_bytes: u32,
    pub max_units: u32,
    pub arg_utf8_max: Option<Vec<u32>>,
    /// Declared (code, tag) pairs, ascending by code.
    pub error_codes: Vec<(String, String)>,
    /// Pre-built `LIMIT_EXCEEDED` envelope, when declared.
    limit_envelope: Option<Vec<u8>>,
}

impl FnBinding {
    pub fn tag_for_code(&self, code: &str) -> Option<&str> {
        self.error_codes
            .iter()
            .find(|(declared, _)| declared == code)
            .map(|(_, tag)| tag.as_str())
    }

    pub fn declares_code(&self, code: &str) -> bool {
        self.tag_for_code(code).is_some()
    }

    /// Effective envelope byte cap for this function.
    pub fn response_cap(&self) -> u32 {
        self.max_response_bytes.min(dv_core::MAX_ENCODED_BYTES)
    }
}

/// Dispatcher construction failure.
#[derive(Debug)]
pub enum DispatchInitError {
    /// Manifest failed validation.
    Manifest(ManifestError),
    /// A declared function has no handler.
    MissingHandler { fn_id: u32 },
    /// A handler was supplied for an undeclared function id.
    UnknownHandler { fn_id: u32 },
    /// A declared `LIMIT_EXCEEDED` envelope does not fit the function's
    /// response cap.
    LimitEnvelopeTooLarge { fn_id: u32 },
}

impl From<ManifestError> for DispatchInitError {
    fn from(e: ManifestError) -> Self {
        DispatchInitError::Manifest(e)
    }
}

impl core::fmt::Display for DispatchInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DispatchInitError::Manifest(e) => write!(f, "manifest invalid: {}", e),
            DispatchInitError::MissingHandler { fn_id } => {
                write!(f, "no handler for declared fn {}", fn_id)
            }
            DispatchInitError::UnknownHandler { fn_id } => {
                write!(f, "handler for undeclared fn {}", fn_id)
            }
            DispatchInitError::LimitEnvelopeTooLarge { fn_id } => {
                write!(f, "limit envelope exceeds response cap of fn {}", fn_id)
            }
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes syscalls to handlers and constructs response envelopes.
pub struct HostDispatcher {
    bindings: Vec<FnBinding>,
    handlers: Vec<Box<dyn HostHandler>>,
    in_progress: bool,
}

impl core::fmt::Debug for HostDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostDispatcher")
            .field("bindings", &self.bindings)
            .field("handlers", &self.handlers.len())
            .field("in_progress", &self.in_progress)
            .finish()
    }
}

impl HostDispatcher {
    /// Builds the dispatch table. The manifest is validated, every declared
    /// function must have a handler, and no handler may target an
    /// undeclared id.
    pub fn new(
        manifest: &AbiManifest,
        mut handlers: HandlerTable,
    ) -> Result<Self, DispatchInitError> {
        abi_manifest::validate(manifest)?;

        let mut bindings = Vec::with_capacity(manifest.functions.len());
        let mut bound_handlers = Vec::with_capacity(manifest.functions.len());

        for function in &manifest.functions {
            let handler = handlers
                .take(function.fn_id)
                .ok_or(DispatchInitError::MissingHandler {
                    fn_id: function.fn_id,
                })?;

            let mut binding = FnBinding {
                fn_id: function.fn_id,
                js_path: function.js_path.clone(),
                arity: function.arity,
                arg_schema: function.arg_schema.clone(),
                return_schema: function.return_schema,
                gas: function.gas,
                max_request_bytes: function.limits.max_request_bytes,
                max_response_bytes: function.limits.max_response_bytes,
                max_units: function.limits.max_units,
                arg_utf8_max: function.limits.arg_utf8_max.clone(),
                error_codes: function
                    .error_codes
                    .iter()
                    .map(|entry| (entry.code.clone(), entry.tag.clone()))
                    .collect(),
                limit_envelope: None,
            };

            if binding.declares_code(ERROR_CODE_LIMIT_EXCEEDED) {
                let envelope = Envelope {
                    units: 0,
                    body: EnvelopeBody::Err {
                        code: ERROR_CODE_LIMIT_EXCEEDED.into(),
                        details: None,
                    },
                };
                let bytes = envelope.encode(binding.response_cap()).map_err(|_| {
                    DispatchInitError::LimitEnvelopeTooLarge {
                        fn_id: function.fn_id,
                    }
                })?;
                binding.limit_envelope = Some(bytes);
            }

            bindings.push(binding);
            bound_handlers.push(handler);
        }

        if let Some((fn_id, _)) = handlers.entries.first() {
            return Err(DispatchInitError::UnknownHandler { fn_id: *fn_id });
        }

        Ok(Self {
            bindings,
            handlers: bound_handlers,
            in_progress: false,
        })
    }

    /// Looks up the binding for a function id.
    pub fn binding(&self, fn_id: u32) -> Option<&FnBinding> {
        self.binding_index(fn_id).map(|idx| &self.bindings[idx])
    }

    pub fn bindings(&self) -> &[FnBinding] {
        &self.bindings
    }

    /// Largest response cap across all functions (scratch-region sizing).
    pub fn max_response_cap(&self) -> u32 {
        self.bindings
            .iter()
            .map(FnBinding::response_cap)
            .max()
            .unwrap_or(0)
    }

    fn binding_index(&self, fn_id: u32) -> Option<usize> {
        self.bindings
            .binary_search_by_key(&fn_id, |b| b.fn_id)
            .ok()
    }

    /// The syscall. Returns the response length, or the sentinel on fatal
    /// transport failure.
    pub fn host_call(
        &mut self,
        memory: &mut LinearMemory,
        fn_id: u32,
        req_ptr: u32,
        req_len: u32,
        resp_ptr: u32,
        resp_cap: u32,
    ) -> u32 {
        if self.in_progress {
            return HOST_CALL_SENTINEL;
        }
        self.in_progress = true;
        let result = self.dispatch(memory, fn_id, req_ptr, req_len, resp_ptr, resp_cap);
        self.in_progress = false;
        result.unwrap_or(HOST_CALL_SENTINEL)
    }

    fn dispatch(
        &mut self,
        memory: &mut LinearMemory,
        fn_id: u32,
        req_ptr: u32,
        req_len: u32,
        resp_ptr: u32,
        resp_cap: u32,
    ) -> Option<u32> {
        // 1. Memory ranges: in-bounds and non-overlapping.
        memory.check_range(req_ptr, req_len).ok()?;
        memory.check_range(resp_ptr, resp_cap).ok()?;
        if LinearMemory::ranges_overlap(req_ptr, req_len, resp_ptr, resp_cap) {
            return None;
        }

        let idx = self.binding_index(fn_id)?;
        let binding = &self.bindings[idx];

        // 2. Request size against the per-function cap.
        if req_len > binding.max_request_bytes {
            return write_limit_envelope(binding, memory, resp_ptr, resp_cap);
        }

        // 3. Bounded decode of the request.
        let req_limits = DvLimits::with_max_encoded_bytes(binding.max_request_bytes);
        let req_bytes = memory.read(req_ptr, req_len).ok()?;
        let request = dv_core::decode(req_bytes, &req_limits).ok()?;

        // 4. Exactly `arity` arguments.
        let args = match &request {
            DvValue::Array(items) if items.len() == binding.arity as usize => items.as_slice(),
            _ => return None,
        };

        // 5. Argument schemas and per-argument UTF-8 caps.
        for (position, (arg, schema)) in args.iter().zip(&binding.arg_schema).enumerate() {
            match schema {
                ValueSchema::Dv => {}
                ValueSchema::Null => {
                    if !matches!(arg, DvValue::Null) {
                        return None;
                    }
                }
                ValueSchema::String => {
                    let s = arg.as_str()?;
                    if let Some(caps) = &binding.arg_utf8_max {
                        if s.len() > caps[position] as usize {
                            return None;
                        }
                    }
                }
            }
        }

        let outcome = self.handlers[idx].call(args);
        let binding = &self.bindings[idx];

        // 6. Handler contract checks.
        let envelope = match outcome {
            HandlerOutcome::Ok { value, units } => {
                if units > binding.max_units {
                    return None;
                }
                match binding.return_schema {
                    ValueSchema::Dv => {}
                    ValueSchema::Null => {
                        if !matches!(value, DvValue::Null) {
                            return None;
                        }
                    }
                    ValueSchema::String => {
                        if !matches!(value, DvValue::String(_)) {
                            return None;
                        }
                    }
                }
                Envelope {
                    units,
                    body: EnvelopeBody::Ok(value),
                }
            }
            HandlerOutcome::Err {
                code,
                details,
                units,
            } => {
                if units > binding.max_units || !binding.declares_code(&code) {
                    return None;
                }
                Envelope {
                    units,
                    body: EnvelopeBody::Err { code, details },
                }
            }
        };

        // 7. Envelope encoding under the response cap; size-class failures
        //    fall back to the limit envelope when declared.
        let bytes = match envelope.encode(binding.response_cap()) {
            Ok(bytes) => bytes,
            Err(e) if is_size_class(e.kind) => {
                return write_limit_envelope(binding, memory, resp_ptr, resp_cap);
            }
            Err(_) => return None,
        };

        write_response(memory, resp_ptr, resp_cap, &bytes)
    }
}

fn is_size_class(kind: DvErrorKind) -> bool {
    matches!(
        kind,
        DvErrorKind::EncodedTooLarge
            | DvErrorKind::StringTooLong
            | DvErrorKind::ArrayTooLong
            | DvErrorKind::MapTooLong
    )
}

fn write_limit_envelope(
    binding: &FnBinding,
    memory: &mut LinearMemory,
    resp_ptr: u32,
    resp_cap: u32,
) -> Option<u32> {
    let bytes = binding.limit_envelope.as_deref()?;
    write_response(memory, resp_ptr, resp_cap, bytes)
}

fn write_response(
    memory: &mut LinearMemory,
    resp_ptr: u32,
    resp_cap: u32,
    bytes: &[u8],
) -> Option<u32> {
    let len = u32::try_from(bytes.len()).ok()?;
    if len > resp_cap {
        return None;
    }
    memory.write(resp_ptr, bytes).ok()?;
    Some(len)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use abi_manifest::{AbiFunction, ErrorCodeEntry, FnLimits};
    use alloc::string::ToString;
    use alloc::vec;

    fn echo_manifest(declare_limit: bool) -> AbiManifest {
        let mut error_codes = vec![ErrorCodeEntry {
            code: "NOT_FOUND".to_string(),
            tag: "echo/not_found".to_string(),
        }];
        if declare_limit {
            error_codes.insert(
                0,
                ErrorCodeEntry {
                    code: ERROR_CODE_LIMIT_EXCEEDED.to_string(),
                    tag: "echo/limit".to_string(),
                },
            );
        }
        AbiManifest {
            abi_id: "test.echo".to_string(),
            abi_version: 1,
            functions: vec![AbiFunction {
                fn_id: 1,
                js_path: vec!["echo".to_string()],
                effect: abi_manifest::Effect::Read,
                arity: 1,
                arg_schema: vec![ValueSchema::String],
                return_schema: ValueSchema::Dv,
                gas: GasParams {
                    schedule_id: 1,
                    base: 20,
                    k_arg_bytes: 1,
                    k_ret_bytes: 1,
                    k_units: 1,
                },
                limits: FnLimits {
                    max_request_bytes: 64,
                    max_response_bytes: 256,
                    max_units: 100,
                    arg_utf8_max: Some(vec![16]),
                },
                error_codes,
            }],
        }
    }

    fn echo_handler() -> impl HostHandler {
        |args: &[DvValue]| HandlerOutcome::Ok {
            value: args[0].clone(),
            units: 9,
        }
    }

    fn dispatcher(declare_limit: bool) -> HostDispatcher {
        HostDispatcher::new(
            &echo_manifest(declare_limit),
            HandlerTable::new().with(1, echo_handler()),
        )
        .unwrap()
    }

    fn encode_request(args: &[DvValue]) -> Vec<u8> {
        dv_core::encode(&DvValue::Array(args.to_vec()), &DvLimits::DEFAULT).unwrap()
    }

    fn call(
        d: &mut HostDispatcher,
        memory: &mut LinearMemory,
        req: &[u8],
    ) -> Result<Envelope, u32> {
        memory.write(0, req).unwrap();
        let len = d.host_call(memory, 1, 0, req.len() as u32, 1024, 512);
        if len == HOST_CALL_SENTINEL {
            return Err(len);
        }
        let bytes = memory.read(1024, len).unwrap();
        Ok(Envelope::decode(bytes, 512).unwrap())
    }

    #[test]
    fn test_ok_roundtrip() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("hello")]);
        let envelope = call(&mut d, &mut memory, &req).unwrap();
        assert_eq!(envelope.units, 9);
        assert_eq!(envelope.body, EnvelopeBody::Ok(DvValue::from("hello")));
    }

    #[test]
    fn test_reentrancy_blocked() {
        let mut d = dispatcher(false);
        d.in_progress = true;
        let mut memory = LinearMemory::with_size(4096);
        assert_eq!(
            d.host_call(&mut memory, 1, 0, 0, 64, 64),
            HOST_CALL_SENTINEL
        );
    }

    #[test]
    fn test_unknown_fn_id_is_transport() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("x")]);
        memory.write(0, &req).unwrap();
        assert_eq!(
            d.host_call(&mut memory, 99, 0, req.len() as u32, 1024, 512),
            HOST_CALL_SENTINEL
        );
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("x")]);
        memory.write(0, &req).unwrap();
        assert_eq!(
            d.host_call(&mut memory, 1, 0, req.len() as u32, 2, 64),
            HOST_CALL_SENTINEL
        );
    }

    #[test]
    fn test_oversize_request_without_limit_code_is_transport() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        assert_eq!(
            d.host_call(&mut memory, 1, 0, 65, 1024, 512),
            HOST_CALL_SENTINEL
        );
    }

    #[test]
    fn test_oversize_request_with_limit_code_yields_envelope() {
        let mut d = dispatcher(true);
        let mut memory = LinearMemory::with_size(4096);
        let len = d.host_call(&mut memory, 1, 0, 65, 1024, 512);
        assert_ne!(len, HOST_CALL_SENTINEL);
        let envelope = Envelope::decode(memory.read(1024, len).unwrap(), 512).unwrap();
        assert_eq!(
            envelope.body,
            EnvelopeBody::Err {
                code: ERROR_CODE_LIMIT_EXCEEDED.to_string(),
                details: None,
            }
        );
        assert_eq!(envelope.units, 0);
    }

    #[test]
    fn test_wrong_arity_is_transport() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("a"), DvValue::from("b")]);
        assert_eq!(call(&mut d, &mut memory, &req), Err(HOST_CALL_SENTINEL));
    }

    #[test]
    fn test_arg_schema_enforced() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::Int(3)]);
        assert_eq!(call(&mut d, &mut memory, &req), Err(HOST_CALL_SENTINEL));
    }

    #[test]
    fn test_arg_utf8_cap_enforced() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("seventeen-bytes!!")]);
        assert_eq!(call(&mut d, &mut memory, &req), Err(HOST_CALL_SENTINEL));
    }

    #[test]
    fn test_undeclared_error_code_is_transport() {
        let manifest = echo_manifest(false);
        let handlers = HandlerTable::new().with(1, |_: &[DvValue]| HandlerOutcome::Err {
            code: "SURPRISE".to_string(),
            details: None,
            units: 0,
        });
        let mut d = HostDispatcher::new(&manifest, handlers).unwrap();
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("x")]);
        assert_eq!(call(&mut d, &mut memory, &req), Err(HOST_CALL_SENTINEL));
    }

    #[test]
    fn test_declared_error_code_roundtrips() {
        let manifest = echo_manifest(false);
        let handlers = HandlerTable::new().with(1, |_: &[DvValue]| HandlerOutcome::Err {
            code: "NOT_FOUND".to_string(),
            details: Some(DvValue::from("path/to/doc")),
            units: 2,
        });
        let mut d = HostDispatcher::new(&manifest, handlers).unwrap();
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("x")]);
        let envelope = call(&mut d, &mut memory, &req).unwrap();
        assert_eq!(envelope.units, 2);
        assert_eq!(
            envelope.body,
            EnvelopeBody::Err {
                code: "NOT_FOUND".to_string(),
                details: Some(DvValue::from("path/to/doc")),
            }
        );
    }

    #[test]
    fn test_units_over_cap_is_transport() {
        let manifest = echo_manifest(false);
        let handlers = HandlerTable::new().with(1, |args: &[DvValue]| HandlerOutcome::Ok {
            value: args[0].clone(),
            units: 101,
        });
        let mut d = HostDispatcher::new(&manifest, handlers).unwrap();
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("x")]);
        assert_eq!(call(&mut d, &mut memory, &req), Err(HOST_CALL_SENTINEL));
    }

    #[test]
    fn test_missing_handler_rejected_at_build() {
        let err = HostDispatcher::new(&echo_manifest(false), HandlerTable::new()).unwrap_err();
        assert!(matches!(err, DispatchInitError::MissingHandler { fn_id: 1 }));
    }

    #[test]
    fn test_stray_handler_rejected_at_build() {
        let handlers = HandlerTable::new()
            .with(1, echo_handler())
            .with(7, echo_handler());
        let err = HostDispatcher::new(&echo_manifest(false), handlers).unwrap_err();
        assert!(matches!(err, DispatchInitError::UnknownHandler { fn_id: 7 }));
    }

    #[test]
    fn test_envelope_rejects_malformed_shapes() {
        // both ok and err
        let mut root = DvMap::new();
        root.insert("units".into(), DvValue::Int(0)).unwrap();
        root.insert("ok".into(), DvValue::Null).unwrap();
        let mut err = DvMap::new();
        err.insert("code".into(), DvValue::from("X")).unwrap();
        root.insert("err".into(), DvValue::Map(err)).unwrap();
        let bytes = dv_core::encode(&DvValue::Map(root), &DvLimits::DEFAULT).unwrap();
        assert_eq!(Envelope::decode(&bytes, 1024), Err(EnvelopeInvalid));

        // missing units
        let mut root = DvMap::new();
        root.insert("ok".into(), DvValue::Null).unwrap();
        let bytes = dv_core::encode(&DvValue::Map(root), &DvLimits::DEFAULT).unwrap();
        assert_eq!(Envelope::decode(&bytes, 1024), Err(EnvelopeInvalid));

        // stray key
        let mut root = DvMap::new();
        root.insert("units".into(), DvValue::Int(0)).unwrap();
        root.insert("ok".into(), DvValue::Null).unwrap();
        root.insert("extra".into(), DvValue::Null).unwrap();
        let bytes = dv_core::encode(&DvValue::Map(root), &DvLimits::DEFAULT).unwrap();
        assert_eq!(Envelope::decode(&bytes, 1024), Err(EnvelopeInvalid));
    }

    #[test]
    fn test_response_over_capacity_is_transport() {
        let mut d = dispatcher(false);
        let mut memory = LinearMemory::with_size(4096);
        let req = encode_request(&[DvValue::from("hello")]);
        memory.write(0, &req).unwrap();
        // Response capacity of 4 cannot hold any envelope.
        assert_eq!(
            d.host_call(&mut memory, 1, 0, req.len() as u32, 1024, 4),
            HOST_CALL_SENTINEL
        );
    }
}
