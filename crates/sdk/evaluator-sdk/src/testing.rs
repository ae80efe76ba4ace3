//! Testing utilities: a scripted deterministic engine and fixture builders.
//!
//! The scripted engine stands in for a real engine build in tests. Programs
//! are Rust callables that drive the same session surface a real engine
//! would: opcode/allocation/builtin charges against the gas meter and host
//! calls through the wrapper port. Because every observable effect flows
//! through those hooks, the determinism properties under test are exactly
//! the production ones.
//!
//! # Quick Start
//!
//! ```ignore
//! use evaluator_sdk::testing::*;
//!
//! fn program(ctx: &mut ScriptCtx) -> Result<DvValue, ScriptFault> {
//!     ctx.ops(3)?;
//!     ctx.host_path("document.get", &[DvValue::from("path/to/doc")])?;
//!     Ok(DvValue::Null)
//! }
//!
//! let mut engine = ScriptedEngine::new(program);
//! let report = evaluate(&mut engine, &program_artifact, &input, 50_000,
//!                       &manifest, handlers, &EvalOptions::default())?;
//! ```

use dv_core::{sha256, DvValue};

use abi_manifest::{
    AbiFunction, AbiManifest, Effect, ErrorCodeEntry, FnLimits, GasParams, ValueSchema,
};
use vm_runtime::{
    EngineBackend, EngineFault, EvalSession, HandlerTable, HostCallError, OutOfGas,
    ProfileConfig,
};

use crate::handlers::{EmitSink, StaticDocumentStore};
use crate::program::Program;

/// Fault raised by a scripted program.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptFault {
    /// Equivalent of an uncaught JS exception.
    Throw { name: String, message: String },
    /// Gas exhaustion. Propagate it; the meter has latched anyway.
    OutOfGas,
    /// An uncaught host-call failure.
    Host(HostCallError),
}

impl ScriptFault {
    /// A deterministic TypeError, e.g. from touching a stubbed global.
    pub fn type_error(message: impl Into<String>) -> Self {
        ScriptFault::Throw {
            name: "TypeError".to_string(),
            message: message.into(),
        }
    }
}

impl From<OutOfGas> for ScriptFault {
    fn from(_: OutOfGas) -> Self {
        ScriptFault::OutOfGas
    }
}

impl From<HostCallError> for ScriptFault {
    fn from(error: HostCallError) -> Self {
        match error {
            HostCallError::OutOfGas => ScriptFault::OutOfGas,
            other => ScriptFault::Host(other),
        }
    }
}

/// Execution surface handed to scripted programs.
pub struct ScriptCtx<'s, 'm> {
    session: &'s mut EvalSession<'m>,
    profile: &'s ProfileConfig,
}

impl ScriptCtx<'_, '_> {
    /// Charges one opcode.
    pub fn op(&mut self) -> Result<(), ScriptFault> {
        self.session.meter.charge_opcode()?;
        Ok(())
    }

    /// Charges `n` opcodes.
    pub fn ops(&mut self, n: u64) -> Result<(), ScriptFault> {
        for _ in 0..n {
            self.session.meter.charge_opcode()?;
        }
        Ok(())
    }

    /// Charges one allocation of `bytes`.
    pub fn alloc(&mut self, bytes: u64) -> Result<(), ScriptFault> {
        self.session.meter.charge_alloc(bytes)?;
        Ok(())
    }

    /// Runs a metered array builtin over `len` elements: entry charge, then
    /// a per-element charge before each callback.
    pub fn array_each(
        &mut self,
        len: usize,
        mut callback: impl FnMut(&mut Self, usize) -> Result<(), ScriptFault>,
    ) -> Result<(), ScriptFault> {
        self.session.meter.charge_builtin_entry()?;
        for index in 0..len {
            self.session.meter.charge_builtin_element()?;
            callback(self, index)?;
        }
        Ok(())
    }

    /// Issues a host call by numeric function id.
    pub fn host(&mut self, fn_id: u32, args: &[DvValue]) -> Result<DvValue, HostCallError> {
        self.session.host_call(fn_id, args)
    }

    /// Issues a host call by its dotted `Host.v1` path, e.g.
    /// `"document.get"`.
    pub fn host_path(&mut self, path: &str, args: &[DvValue]) -> Result<DvValue, HostCallError> {
        let fn_id = self
            .profile
            .fn_id_for_path(path)
            .ok_or(HostCallError::Transport)?;
        self.session.host_call(fn_id, args)
    }

    /// The fixed TypeError message of a stubbed global, if `path` is
    /// stubbed (e.g. `"eval"`, `"JSON.parse"`).
    pub fn stub_message(&self, path: &str) -> Option<&'static str> {
        vm_runtime::stub_message(path)
    }

    /// The injected context blob value, when one was supplied.
    pub fn context(&self) -> Option<&DvValue> {
        self.profile.context.as_ref()
    }

    pub fn gas_remaining(&self) -> u64 {
        self.session.meter.remaining()
    }

    /// Explicit GC checkpoint.
    pub fn checkpoint(&mut self) -> bool {
        self.session.checkpoint()
    }
}

/// Deterministic engine whose "program" is an injected Rust callable.
pub struct ScriptedEngine<F> {
    build_hash: [u8; 32],
    profile: Option<ProfileConfig>,
    script: F,
}

impl<F> ScriptedEngine<F>
where
    F: for<'s, 'm> FnMut(&mut ScriptCtx<'s, 'm>) -> Result<DvValue, ScriptFault>,
{
    /// Engine with the default scripted-artifact identity.
    pub fn new(script: F) -> Self {
        Self::with_artifact(b"scripted-engine-v1", script)
    }

    /// Engine whose build hash is the SHA-256 of `artifact`.
    pub fn with_artifact(artifact: &[u8], script: F) -> Self {
        Self {
            build_hash: sha256(artifact),
            profile: None,
            script,
        }
    }
}

/// Build hash of [`ScriptedEngine::new`] engines.
pub fn scripted_engine_build_hash() -> [u8; 32] {
    sha256(b"scripted-engine-v1")
}

impl<F> EngineBackend for ScriptedEngine<F>
where
    F: for<'s, 'm> FnMut(&mut ScriptCtx<'s, 'm>) -> Result<DvValue, ScriptFault>,
{
    fn build_hash(&self) -> [u8; 32] {
        self.build_hash
    }

    fn install_profile(&mut self, profile: &ProfileConfig) -> Result<(), EngineFault> {
        self.profile = Some(profile.clone());
        Ok(())
    }

    fn evaluate(
        &mut self,
        _code: &str,
        session: &mut EvalSession<'_>,
    ) -> Result<DvValue, EngineFault> {
        let profile = self.profile.clone().ok_or(EngineFault::Internal {
            message: "profile not installed".to_string(),
        })?;
        let mut ctx = ScriptCtx {
            session,
            profile: &profile,
        };
        (self.script)(&mut ctx).map_err(|fault| match fault {
            ScriptFault::OutOfGas => EngineFault::OutOfGas,
            ScriptFault::Throw { name, message } => EngineFault::JsException { name, message },
            ScriptFault::Host(error) => EngineFault::from_uncaught_host_call(error),
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// The reference `Host.v1` manifest: `document.get`, `document.getCanonical`,
/// and `emit`.
pub fn host_v1_manifest() -> AbiManifest {
    let document_fn = |fn_id: u32, leaf: &str| AbiFunction {
        fn_id,
        js_path: vec!["document".to_string(), leaf.to_string()],
        effect: Effect::Read,
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
            max_request_bytes: 4096,
            max_response_bytes: 65536,
            max_units: 1000,
            arg_utf8_max: Some(vec![2048]),
        },
        error_codes: vec![
            ErrorCodeEntry {
                code: "LIMIT_EXCEEDED".to_string(),
                tag: "document/limit_exceeded".to_string(),
            },
            ErrorCodeEntry {
                code: "NOT_FOUND".to_string(),
                tag: "document/not_found".to_string(),
            },
        ],
    };

    AbiManifest {
        abi_id: "workflow.host".to_string(),
        abi_version: 1,
        functions: vec![
            document_fn(1, "get"),
            document_fn(2, "getCanonical"),
            AbiFunction {
                fn_id: 3,
                js_path: vec!["emit".to_string()],
                effect: Effect::Emit,
                arity: 1,
                arg_schema: vec![ValueSchema::Dv],
                return_schema: ValueSchema::Null,
                gas: GasParams {
                    schedule_id: 1,
                    base: 10,
                    k_arg_bytes: 2,
                    k_ret_bytes: 0,
                    k_units: 0,
                },
                limits: FnLimits {
                    max_request_bytes: 32768,
                    max_response_bytes: 64,
                    max_units: 0,
                    arg_utf8_max: None,
                },
                error_codes: vec![],
            },
        ],
    }
}

/// Handler table wiring the reference manifest to a document store and an
/// emit sink.
pub fn host_v1_handlers(store: &StaticDocumentStore, sink: &EmitSink) -> HandlerTable {
    HandlerTable::new()
        .with(1, store.get_handler())
        .with(2, store.get_canonical_handler())
        .with(3, sink.handler())
}

/// Program artifact pinned to the given manifest.
pub fn program_for(manifest: &AbiManifest, code: &str) -> Program {
    Program {
        code: code.to_string(),
        abi_id: manifest.abi_id.clone(),
        abi_version: manifest.abi_version,
        abi_manifest_hash: manifest
            .manifest_hash()
            .expect("fixture manifest hashes"),
        engine_build_hash: None,
        runtime_flags: None,
    }
}
