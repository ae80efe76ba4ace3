//! Host-call port: the JS-side wrapper contract behind every `Host.v1`
//! function.
//!
//! The engine projects each manifest function as a wrapper that funnels
//! into [`HostPort::call`]. One call performs, in order: arity and UTF-8
//! checks, request encoding, the pre-charge (`base + k_arg * req_len`), the
//! syscall through linear-memory scratch regions, envelope decode and
//! validation, the post-charge (`k_ret * resp_len + k_units * units`), and
//! the tape append. The charge points bracket the syscall so a call's total
//! gas is a pure function of its byte lengths and reported units.

use alloc::string::{String, ToString};

use dv_core::{sha256, DvLimits, DvValue};

use abi_manifest::ValueSchema;

use crate::dispatch::{Envelope, EnvelopeBody, FnBinding, HostDispatcher, HOST_CALL_SENTINEL};
use crate::gas::GasMeter;
use crate::memory::LinearMemory;
use crate::tape::{HostTape, TapeRecord};

/// Failure of one wrapped host call, as observed by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCallError {
    /// Wrapper-level argument rejection; surfaces as a deterministic
    /// TypeError before any gas is charged.
    BadArgs { message: String },
    /// Out of gas during pre- or post-charge. Uncatchable.
    OutOfGas,
    /// Syscall transport failure (reserved code `HOST_TRANSPORT`).
    Transport,
    /// Envelope failed structural validation (reserved code
    /// `HOST_ENVELOPE_INVALID`).
    EnvelopeInvalid,
    /// Manifest-declared handler error; catchable by user code.
    Declared {
        code: String,
        tag: String,
        details: Option<DvValue>,
    },
}

/// Port construction failure: the linear memory cannot fit the scratch
/// regions next to the engine heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortInitError {
    pub required: u64,
    pub available: u32,
}

impl core::fmt::Display for PortInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "linear memory too small for host-call scratch: need {}, have {}",
            self.required, self.available
        )
    }
}

/// Owns the dispatcher, the linear memory, and the optional tape for one
/// evaluation.
pub struct HostPort {
    dispatcher: HostDispatcher,
    memory: LinearMemory,
    tape: Option<HostTape>,
    req_ptr: u32,
    req_cap: u32,
    resp_ptr: u32,
    resp_cap: u32,
}

impl HostPort {
    /// Carves request/response scratch regions out of the top of the
    /// linear memory. The response region is sized to the largest
    /// `max_response_bytes` across functions.
    pub fn new(dispatcher: HostDispatcher, memory: LinearMemory) -> Result<Self, PortInitError> {
        let req_cap = dispatcher
            .bindings()
            .iter()
            .map(|b| b.max_request_bytes)
            .max()
            .unwrap_or(0);
        let resp_cap = dispatcher.max_response_cap();

        let required = req_cap as u64 + resp_cap as u64;
        if required > memory.size() as u64 {
            return Err(PortInitError {
                required,
                available: memory.size(),
            });
        }
        let resp_ptr = memory.size() - resp_cap;
        let req_ptr = resp_ptr - req_cap;

        Ok(Self {
            dispatcher,
            memory,
            tape: None,
            req_ptr,
            req_cap,
            resp_ptr,
            resp_cap,
        })
    }

    /// Enables the audit tape with the given capacity (1..=1024).
    pub fn with_tape(mut self, tape: HostTape) -> Self {
        self.tape = Some(tape);
        self
    }

    pub fn tape(&self) -> Option<&HostTape> {
        self.tape.as_ref()
    }

    /// Takes the tape at end of evaluation.
    pub fn take_tape(&mut self) -> Option<HostTape> {
        self.tape.take()
    }

    pub fn dispatcher(&self) -> &HostDispatcher {
        &self.dispatcher
    }

    /// One wrapped host call. See the module docs for the exact step
    /// order; tape records are appended only for completed invocations.
    pub fn call(
        &mut self,
        meter: &mut GasMeter,
        fn_id: u32,
        args: &[DvValue],
    ) -> Result<DvValue, HostCallError> {
        let binding = self
            .dispatcher
            .binding(fn_id)
            .ok_or(HostCallError::Transport)?;

        // 1. Arity and per-argument checks, before anything is charged.
        check_args(binding, args)?;

        // 2. Encode the request under the per-function byte cap.
        let req_limits = DvLimits::with_max_encoded_bytes(binding.max_request_bytes);
        let request = DvValue::Array(args.to_vec());
        let req_bytes = dv_core::encode(&request, &req_limits).map_err(|e| {
            HostCallError::BadArgs {
                message: alloc::format!("request rejected: {}", e),
            }
        })?;
        let req_len = req_bytes.len() as u32;

        // 3. Pre-charge.
        let gas = binding.gas;
        let gas_pre = gas.base as u64 + gas.k_arg_bytes as u64 * req_len as u64;
        meter
            .charge_host(gas_pre)
            .map_err(|_| HostCallError::OutOfGas)?;

        // 4. Syscall through the scratch regions.
        let response_cap = binding.response_cap().min(self.resp_cap);
        self.memory
            .write(self.req_ptr, &req_bytes)
            .map_err(|_| HostCallError::Transport)?;
        let resp_len = self.dispatcher.host_call(
            &mut self.memory,
            fn_id,
            self.req_ptr,
            req_len,
            self.resp_ptr,
            response_cap,
        );

        // 5. Transport interpretation.
        if resp_len == HOST_CALL_SENTINEL || resp_len > response_cap {
            return Err(HostCallError::Transport);
        }
        let resp_bytes = self
            .memory
            .read(self.resp_ptr, resp_len)
            .map_err(|_| HostCallError::Transport)?
            .to_vec();

        // 6. Envelope decode and structural validation.
        let binding = self.dispatcher.binding(fn_id).ok_or(HostCallError::Transport)?;
        let envelope = Envelope::decode(&resp_bytes, binding.response_cap())
            .map_err(|_| HostCallError::EnvelopeInvalid)?;

        // 7. Post-charge; an OOG here is still recorded on the tape.
        let gas_post = binding.gas.k_ret_bytes as u64 * resp_len as u64
            + binding.gas.k_units as u64 * envelope.units as u64;
        let is_error = matches!(envelope.body, EnvelopeBody::Err { .. });
        let charge_failed = meter.charge_host(gas_post).is_err();

        if let Some(tape) = &mut self.tape {
            tape.push(TapeRecord {
                fn_id,
                req_len,
                resp_len,
                units: envelope.units,
                gas_pre,
                gas_post,
                is_error,
                charge_failed,
                req_hash: sha256(&req_bytes),
                resp_hash: sha256(&resp_bytes),
            });
        }
        if charge_failed {
            return Err(HostCallError::OutOfGas);
        }

        // 8. Projection.
        match envelope.body {
            EnvelopeBody::Ok(value) => Ok(value),
            EnvelopeBody::Err { code, details } => {
                let tag = binding
                    .tag_for_code(&code)
                    .ok_or(HostCallError::EnvelopeInvalid)?
                    .to_string();
                Err(HostCallError::Declared {
                    code,
                    tag,
                    details,
                })
            }
        }
    }
}

fn check_args(binding: &FnBinding, args: &[DvValue]) -> Result<(), HostCallError> {
    if args.len() != binding.arity as usize {
        return Err(HostCallError::BadArgs {
            message: alloc::format!(
                "expected {} arguments, got {}",
                binding.arity,
                args.len()
            ),
        });
    }
    for (position, (arg, schema)) in args.iter().zip(&binding.arg_schema).enumerate() {
        match schema {
            ValueSchema::Dv => {}
            ValueSchema::Null => {
                if !matches!(arg, DvValue::Null) {
                    return Err(HostCallError::BadArgs {
                        message: alloc::format!("argument {} must be null", position),
                    });
                }
            }
            ValueSchema::String => {
                let Some(s) = arg.as_str() else {
                    return Err(HostCallError::BadArgs {
                        message: alloc::format!("argument {} must be a string", position),
                    });
                };
                if let Some(caps) = &binding.arg_utf8_max {
                    if s.len() > caps[position] as usize {
                        return Err(HostCallError::BadArgs {
                            message: alloc::format!(
                                "argument {} exceeds {} UTF-8 bytes",
                                position,
                                caps[position]
                            ),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Everything the engine may touch while user code runs: the gas meter and
/// the host port. The engine calls the metering hooks from its dispatch
/// loop and funnels `Host.v1` wrappers into [`EvalSession::host_call`].
pub struct EvalSession<'a> {
    pub meter: &'a mut GasMeter,
    pub port: &'a mut HostPort,
}

impl EvalSession<'_> {
    /// Issues one host call through the wrapper contract, then consumes a
    /// GC checkpoint (host-call returns are a well-defined checkpoint
    /// location).
    pub fn host_call(
        &mut self,
        fn_id: u32,
        args: &[DvValue],
    ) -> Result<DvValue, HostCallError> {
        let result = self.port.call(self.meter, fn_id, args);
        self.meter.checkpoint();
        result
    }

    /// Explicit GC checkpoint; returns whether a collection was due.
    pub fn checkpoint(&mut self) -> bool {
        self.meter.checkpoint()
    }
}

// ============================================================================
// Tests
// ============================================================================
