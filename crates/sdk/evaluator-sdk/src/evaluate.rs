//! The `evaluate()` handshake.
//!
//! Init order is fixed: validate the program artifact, validate the input
//! envelope, pin the manifest hash, optionally pin the engine build hash,
//! build the dispatcher, wire the gas meter, install the deterministic
//! profile with the Host.v1 projection and the injected context, run an
//! initial GC checkpoint, then hand the program to the engine. Failures
//! before the engine runs are setup errors and consume no gas; everything
//! after reports gas.

use dv_core::{hex64, parse_hex64, DvLimits};
use tracing::{debug, debug_span};

use abi_manifest::{AbiManifest, ManifestError};
use vm_runtime::{
    ContextError, DispatchInitError, EngineBackend, EvalSession, GasMeter, HandlerTable,
    HostDispatcher, HostPort, HostTape, LinearMemory, PortInitError, ProfileConfig,
    TapeCapacityError, ENGINE_MEMORY_BYTES,
};

use crate::input::{InputEnvelope, InputError};
use crate::program::{Program, ProgramError};
use crate::result::{EvalFailure, EvalOutcome, EvalReport};

/// Embedder-side evaluation options. Program-pinned `runtime_flags`
/// override these per program.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalOptions {
    /// Record the audit tape.
    pub tape: bool,
    /// Tape ring capacity (1..=1024).
    pub tape_capacity: u32,
    /// Keep aggregate gas counters.
    pub gas_trace: bool,
    /// Linear memory size for this engine build. The protocol default is
    /// 32 MiB (initial = maximum, growth disabled).
    pub memory_size: u32,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            tape: false,
            tape_capacity: 256,
            gas_trace: false,
            memory_size: ENGINE_MEMORY_BYTES,
        }
    }
}

/// Failure before the engine ran. No gas was consumed.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid program artifact: {0}")]
    Program(#[from] ProgramError),

    #[error("invalid input envelope: {0}")]
    Input(#[from] InputError),

    #[error("manifest rejected: {0}")]
    Manifest(ManifestError),

    #[error("program targets abi `{program_abi}` v{program_version}, manifest is `{manifest_abi}` v{manifest_version}")]
    AbiMismatch {
        program_abi: String,
        program_version: u32,
        manifest_abi: String,
        manifest_version: u32,
    },

    #[error("manifest hash mismatch: pinned {pinned}, computed {computed}")]
    ManifestHashMismatch { pinned: String, computed: String },

    #[error("engine build hash mismatch: pinned {pinned}, actual {actual}")]
    EngineHashMismatch { pinned: String, actual: String },

    #[error("dispatcher construction failed: {0}")]
    Dispatch(DispatchInitError),

    #[error("context injection failed: {0}")]
    Context(ContextError),

    #[error("invalid tape capacity: {0}")]
    Tape(TapeCapacityError),

    #[error("{0}")]
    Port(PortInitError),

    #[error("profile install failed: {message}")]
    ProfileInstall { message: String },
}

impl SetupError {
    /// Stable error code for embedder dispatch.
    pub fn code(&self) -> &'static str {
        match self {
            SetupError::Program(_) => "PROGRAM_INVALID",
            SetupError::Input(_) => "INPUT_INVALID",
            SetupError::Manifest(_) => "MANIFEST_INVALID",
            SetupError::AbiMismatch { .. } => "ABI_MISMATCH",
            SetupError::ManifestHashMismatch { .. } => "ABI_MANIFEST_HASH_MISMATCH",
            SetupError::EngineHashMismatch { .. } => "ENGINE_BUILD_HASH_MISMATCH",
            SetupError::Dispatch(_) => "DISPATCH_INVALID",
            SetupError::Context(_) => "CONTEXT_INVALID",
            SetupError::Tape(_) => "TAPE_INVALID",
            SetupError::Port(_) => "MEMORY_INVALID",
            SetupError::ProfileInstall { .. } => "PROFILE_INSTALL_FAILED",
        }
    }

    /// All setup errors carry the manifest/init tag.
    pub fn tag(&self) -> &'static str {
        "vm/manifest"
    }
}

impl From<ManifestError> for SetupError {
    fn from(e: ManifestError) -> Self {
        SetupError::Manifest(e)
    }
}

impl From<DispatchInitError> for SetupError {
    fn from(e: DispatchInitError) -> Self {
        SetupError::Dispatch(e)
    }
}

/// Runs one program to completion.
///
/// Same `(program, input, gas_limit)` against the same engine artifact and
/// handlers yields identical result bytes, gas, and tape.
pub fn evaluate(
    engine: &mut dyn EngineBackend,
    program: &Program,
    input: &InputEnvelope,
    gas_limit: u64,
    manifest: &AbiManifest,
    handlers: HandlerTable,
    options: &EvalOptions,
) -> Result<EvalReport, SetupError> {
    let span = debug_span!("evaluate", abi_id = %program.abi_id, gas_limit);
    let _guard = span.enter();

    // 1. Program artifact bounds and hash shapes.
    program.validate()?;

    // 2. Input envelope against the DV caps.
    let blob = input.to_blob()?;

    // 3. Manifest identity and hash pinning.
    if program.abi_id != manifest.abi_id || program.abi_version != manifest.abi_version {
        return Err(SetupError::AbiMismatch {
            program_abi: program.abi_id.clone(),
            program_version: program.abi_version,
            manifest_abi: manifest.abi_id.clone(),
            manifest_version: manifest.abi_version,
        });
    }
    let computed = manifest.manifest_hash()?;
    if computed != program.abi_manifest_hash {
        return Err(SetupError::ManifestHashMismatch {
            pinned: program.abi_manifest_hash.clone(),
            computed,
        });
    }

    // 4. Optional engine build pinning.
    if let Some(pinned) = &program.engine_build_hash {
        let pinned_bytes =
            parse_hex64(pinned).map_err(|e| SetupError::Program(ProgramError::BadEngineHash(e)))?;
        let actual = engine.build_hash();
        if pinned_bytes != actual {
            return Err(SetupError::EngineHashMismatch {
                pinned: pinned.clone(),
                actual: hex64(&actual),
            });
        }
    }

    // 5. Dispatcher over the embedder's handlers.
    let dispatcher = HostDispatcher::new(manifest, handlers)?;

    // 6. Gas wiring. Program flags override embedder options.
    let flags = program.runtime_flags.clone().unwrap_or_default();
    let tape_enabled = flags.tape.unwrap_or(options.tape);
    let tape_capacity = flags.tape_capacity.unwrap_or(options.tape_capacity);
    let trace_enabled = flags.gas_trace.unwrap_or(options.gas_trace);

    let mut meter = if trace_enabled {
        GasMeter::with_trace(gas_limit)
    } else {
        GasMeter::new(gas_limit)
    };

    // 7.-8. Host.v1 projection spec plus injected context.
    let context_value = blob.to_value().map_err(SetupError::Context)?;
    let profile = ProfileConfig::for_manifest(manifest, Some(context_value));

    let mut port = HostPort::new(dispatcher, LinearMemory::with_size(options.memory_size))
        .map_err(SetupError::Port)?;
    if tape_enabled {
        let tape = HostTape::new(tape_capacity as usize).map_err(SetupError::Tape)?;
        port = port.with_tape(tape);
    }

    engine
        .install_profile(&profile)
        .map_err(|fault| SetupError::ProfileInstall {
            message: format!("{:?}", fault),
        })?;

    // 9. Initial GC checkpoint, then run.
    meter.checkpoint();
    let run_result = {
        let mut session = EvalSession {
            meter: &mut meter,
            port: &mut port,
        };
        let result = engine.evaluate(&program.code, &mut session);
        session.checkpoint();
        result
    };

    let outcome = match run_result {
        Ok(value) => match dv_core::encode(&value, &DvLimits::DEFAULT) {
            Ok(raw) => {
                // Canonicalize the surfaced value so it matches the bytes.
                match dv_core::decode(&raw, &DvLimits::DEFAULT) {
                    Ok(canonical) => EvalOutcome::Success {
                        value: canonical,
                        raw,
                    },
                    Err(e) => EvalOutcome::Failure(EvalFailure::invalid_output(e)),
                }
            }
            Err(e) => EvalOutcome::Failure(EvalFailure::invalid_output(e)),
        },
        Err(fault) => EvalOutcome::Failure(EvalFailure::from_engine_fault(fault)),
    };

    let report = EvalReport {
        outcome,
        gas_used: meter.used(),
        gas_remaining: meter.remaining(),
        tape: port.take_tape().map(HostTape::into_records),
        gas_trace: meter.take_trace(),
    };

    debug!(
        ok = report.is_ok(),
        gas_used = report.gas_used,
        gas_remaining = report.gas_remaining,
        "evaluation finished"
    );
    Ok(report)
}
