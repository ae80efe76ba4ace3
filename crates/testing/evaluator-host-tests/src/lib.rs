//! Host-side integration tests for the deterministic evaluator.
//!
//! Everything here runs the full stack (program validation, manifest
//! pinning, profile assembly, the wrapper port, the dispatcher, and the
//! scripted engine) and checks the properties that matter across hosts:
//! byte-identical results, exact gas arithmetic, stable out-of-gas
//! boundaries, and tape equality between runs.

use evaluator_sdk::testing::{
    host_v1_handlers, host_v1_manifest, program_for, ScriptCtx, ScriptFault, ScriptedEngine,
};
use evaluator_sdk::{
    evaluate, DvValue, EmitSink, EvalOptions, EvalReport, InputEnvelope, StaticDocumentStore,
};

/// Shrunken engine memory so tests do not allocate 32 MiB per evaluation.
pub const TEST_MEMORY_BYTES: u32 = 256 * 1024;

/// Default evaluation options for tests: tape and trace on, small memory.
pub fn test_options() -> EvalOptions {
    EvalOptions {
        tape: true,
        tape_capacity: 64,
        gas_trace: true,
        memory_size: TEST_MEMORY_BYTES,
    }
}

/// A document store pre-loaded with the standard fixture document.
pub fn fixture_store() -> StaticDocumentStore {
    let store = StaticDocumentStore::with_units(9);
    let mut doc = dv_core::DvMap::new();
    doc.insert("title".to_string(), DvValue::from("fixture"))
        .unwrap();
    doc.insert("revision".to_string(), DvValue::Int(4)).unwrap();
    store.insert("path/to/doc", DvValue::Map(doc));
    store
}

/// Runs `script` against the reference Host.v1 manifest and fixtures.
pub fn run_script<F>(script: F, gas_limit: u64) -> (EvalReport, EmitSink)
where
    F: for<'s, 'm> FnMut(&mut ScriptCtx<'s, 'm>) -> Result<DvValue, ScriptFault>,
{
    let manifest = host_v1_manifest();
    let program = program_for(&manifest, "scripted");
    let store = fixture_store();
    let sink = EmitSink::new();
    let handlers = host_v1_handlers(&store, &sink);
    let mut engine = ScriptedEngine::new(script);

    let report = evaluate(
        &mut engine,
        &program,
        &InputEnvelope::empty(),
        gas_limit,
        &manifest,
        handlers,
        &test_options(),
    )
    .expect("setup succeeds");
    (report, sink)
}
