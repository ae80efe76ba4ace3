//! Deterministic runtime: profile, gas meter, and host-call dispatch.
//!
//! This crate holds everything between the black-box JS engine and the
//! embedder's handlers: the deterministic profile installed into every
//! context, the canonical gas meter the engine's hooks drive, the
//! fixed-size linear memory, the single-syscall host dispatcher with its
//! response envelopes, the Host.v1 wrapper port, the bounded audit tape,
//! and the injected context with its canonicalization helpers.
//!
//! # no_std Support
//!
//! This crate is `#![no_std]` by default and uses `alloc` for heap
//! allocations. Enable the `std` feature for host-side embedding.

#![no_std]
#![forbid(unsafe_code)]
#![deny(clippy::std_instead_of_alloc)]
#![deny(clippy::std_instead_of_core)]

extern crate alloc;

pub mod context;
pub mod dispatch;
pub mod engine;
pub mod gas;
pub mod memory;
pub mod port;
pub mod profile;
pub mod tape;

pub use context::{canon_at, canon_unwrap, ContextBlob, ContextError, PathError, PathSeg};
pub use dispatch::{
    DispatchInitError, Envelope, EnvelopeBody, EnvelopeInvalid, FnBinding, HandlerOutcome,
    HandlerTable, HostDispatcher, HostHandler, HOST_CALL_SENTINEL,
};
pub use engine::{EngineBackend, EngineFault};
pub use gas::{
    GasMeter, GasTrace, OutOfGas, ALLOC_BASE_GAS, ALLOC_BYTES_PER_UNIT, BUILTIN_ELEMENT_GAS,
    BUILTIN_ENTRY_GAS, GAS_VERSION, GC_CHECKPOINT_THRESHOLD_BYTES, OPCODE_GAS,
};
pub use memory::{LinearMemory, MemoryFault, ENGINE_MEMORY_BYTES, ENGINE_STACK_BYTES};
pub use port::{EvalSession, HostCallError, HostPort, PortInitError};
pub use profile::{
    stub_message, HostFnSpec, ProfileConfig, StubbedGlobal, ABSENT_GLOBALS, RNG_SEED,
    STUBBED_GLOBALS,
};
pub use tape::{HostTape, TapeCapacityError, TapeRecord, MAX_TAPE_CAPACITY};
