//! Deterministic VM profile.
//!
//! The profile is the fixed JS surface a program observes: which globals
//! exist, which are stubbed with a deterministic TypeError, which host
//! functions are projected, and which context values are injected. It is
//! installed on every context creation before any user code executes, and
//! the namespaces it installs are frozen (non-extensible, with non-writable,
//! non-configurable data properties; `console` gets a null prototype).

use alloc::string::String;
use alloc::vec::Vec;

use abi_manifest::AbiManifest;
use dv_core::DvValue;

/// Seed for the engine's internal RNG. Constant, so accidental native
/// randomness paths stay deterministic.
pub const RNG_SEED: u64 = 1;

/// A global (or global member) replaced by a stub that throws a fixed
/// TypeError.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StubbedGlobal {
    /// Property path from the global object, e.g. `["JSON", "parse"]`.
    pub path: &'static [&'static str],
    /// Exact TypeError message, byte-for-byte stable across builds.
    pub message: &'static str,
}

/// Globals replaced by throwing stubs.
///
/// Stubbing (rather than deleting) keeps `typeof` checks working while
/// making every use fail with the same message on every host.
pub const STUBBED_GLOBALS: &[StubbedGlobal] = &[
    StubbedGlobal {
        path: &["eval"],
        message: "eval is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Function"],
        message: "Function is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["RegExp"],
        message: "RegExp is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Proxy"],
        message: "Proxy is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Promise"],
        message: "Promise is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["ArrayBuffer"],
        message: "ArrayBuffer is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["SharedArrayBuffer"],
        message: "SharedArrayBuffer is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["DataView"],
        message: "DataView is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Int8Array"],
        message: "Int8Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Uint8Array"],
        message: "Uint8Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Uint8ClampedArray"],
        message: "Uint8ClampedArray is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Int16Array"],
        message: "Int16Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Uint16Array"],
        message: "Uint16Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Int32Array"],
        message: "Int32Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Uint32Array"],
        message: "Uint32Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Float32Array"],
        message: "Float32Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Float64Array"],
        message: "Float64Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["BigInt64Array"],
        message: "BigInt64Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["BigUint64Array"],
        message: "BigUint64Array is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Atomics"],
        message: "Atomics is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["WeakRef"],
        message: "WeakRef is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["FinalizationRegistry"],
        message: "FinalizationRegistry is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["WebAssembly"],
        message: "WebAssembly is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["console", "log"],
        message: "console.log is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["console", "info"],
        message: "console.info is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["console", "warn"],
        message: "console.warn is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["console", "error"],
        message: "console.error is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["console", "debug"],
        message: "console.debug is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["print"],
        message: "print is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["JSON", "parse"],
        message: "JSON.parse is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["JSON", "stringify"],
        message: "JSON.stringify is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Array", "prototype", "sort"],
        message: "Array.prototype.sort is disabled in deterministic mode",
    },
    StubbedGlobal {
        path: &["Math", "random"],
        message: "Math.random is disabled in deterministic mode",
    },
];

/// Globals removed entirely: `typeof` must yield `"undefined"`.
pub const ABSENT_GLOBALS: &[&str] = &["Date", "setTimeout", "setInterval", "queueMicrotask"];

/// Looks up the fixed stub message for a dotted path like `"JSON.parse"`.
pub fn stub_message(dotted_path: &str) -> Option<&'static str> {
    STUBBED_GLOBALS.iter().find_map(|stub| {
        let mut segments = dotted_path.split('.');
        let matches = stub
            .path
            .iter()
            .all(|&expected| segments.next() == Some(expected))
            && segments.next().is_none();
        matches.then_some(stub.message)
    })
}

/// Install spec for one projected host function, derived from the manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct HostFnSpec {
    pub fn_id: u32,
    /// Path below `Host.v1`, e.g. `["document", "get"]`.
    pub js_path: Vec<String>,
    pub arity: u32,
    pub arg_utf8_max: Option<Vec<u32>>,
}

/// Fully assembled profile handed to the engine at context creation.
#[derive(Clone, Debug)]
pub struct ProfileConfig {
    pub rng_seed: u64,
    pub stubbed: &'static [StubbedGlobal],
    pub absent: &'static [&'static str],
    /// Functions to project under `Host.v1` and as ergonomic globals.
    pub host_functions: Vec<HostFnSpec>,
    /// Deep-frozen context values (`event`, `eventCanonical`, `steps`),
    /// absent when no context blob was supplied.
    pub context: Option<DvValue>,
}

impl ProfileConfig {
    /// Builds the profile for a validated manifest.
    pub fn for_manifest(manifest: &AbiManifest, context: Option<DvValue>) -> Self {
        let host_functions = manifest
            .functions
            .iter()
            .map(|function| HostFnSpec {
                fn_id: function.fn_id,
                js_path: function.js_path.clone(),
                arity: function.arity,
                arg_utf8_max: function.limits.arg_utf8_max.clone(),
            })
            .collect();
        Self {
            rng_seed: RNG_SEED,
            stubbed: STUBBED_GLOBALS,
            absent: ABSENT_GLOBALS,
            host_functions,
            context,
        }
    }

    /// Resolves a projected function id by its dotted `Host.v1` path.
    pub fn fn_id_for_path(&self, dotted_path: &str) -> Option<u32> {
        self.host_functions.iter().find_map(|spec| {
            let mut segments = dotted_path.split('.');
            let matches = spec
                .js_path
                .iter()
                .all(|expected| segments.next() == Some(expected.as_str()))
                && segments.next().is_none();
            matches.then_some(spec.fn_id)
        })
    }
}
