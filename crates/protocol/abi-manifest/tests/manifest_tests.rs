//! Manifest canonicalization and hashing tests.

use abi_manifest::{
    AbiFunction, AbiManifest, Effect, ErrorCodeEntry, FnLimits, GasParams, ManifestError,
    ValueSchema,
};
use dv_core::{DvLimits, DvMap, DvValue};

fn document_fn(fn_id: u32, leaf: &str) -> AbiFunction {
    AbiFunction {
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
    }
}

fn emit_fn(fn_id: u32) -> AbiFunction {
    AbiFunction {
        fn_id,
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
    }
}

fn host_manifest() -> AbiManifest {
    AbiManifest {
        abi_id: "workflow.host".to_string(),
        abi_version: 1,
        functions: vec![document_fn(1, "get"), document_fn(2, "getCanonical"), emit_fn(3)],
    }
}

#[test]
fn test_value_roundtrip() {
    let manifest = host_manifest();
    let value = manifest.to_value().unwrap();
    let rebuilt = AbiManifest::from_value(&value).unwrap();
    assert_eq!(rebuilt, manifest);
}

#[test]
fn test_bytes_roundtrip() {
    let manifest = host_manifest();
    let bytes = manifest.canonical_bytes().unwrap();
    let rebuilt = AbiManifest::from_bytes(&bytes).unwrap();
    assert_eq!(rebuilt, manifest);
    assert_eq!(rebuilt.canonical_bytes().unwrap(), bytes);
}

#[test]
fn test_hash_shape() {
    let hash = host_manifest().manifest_hash().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
}

#[test]
fn test_hash_stable_under_key_insertion_order() {
    // Rebuild the manifest's DV form with inner map keys inserted in a
    // deliberately different order; the canonical bytes must not change.
    let manifest = host_manifest();
    let bytes = manifest.canonical_bytes().unwrap();

    let canonical = manifest.to_value().unwrap();
    let reordered = reorder_maps(&canonical);
    let reencoded = dv_core::encode(&reordered, &DvLimits::DEFAULT).unwrap();

    assert_eq!(reencoded, bytes);
    assert_eq!(
        AbiManifest::from_value(&reordered)
            .unwrap()
            .manifest_hash()
            .unwrap(),
        manifest.manifest_hash().unwrap()
    );
}

/// Rebuilds every map bottom-up, inserting entries in reverse order.
fn reorder_maps(value: &DvValue) -> DvValue {
    match value {
        DvValue::Map(map) => {
            let mut entries: Vec<(String, DvValue)> = map
                .iter()
                .map(|(k, v)| (k.to_string(), reorder_maps(v)))
                .collect();
            entries.reverse();
            DvValue::Map(DvMap::from_entries(entries).unwrap())
        }
        DvValue::Array(items) => DvValue::Array(items.iter().map(reorder_maps).collect()),
        other => other.clone(),
    }
}

#[test]
fn test_hash_changes_with_any_field() {
    let base_hash = host_manifest().manifest_hash().unwrap();

    let mut bumped = host_manifest();
    bumped.abi_version = 2;
    assert_ne!(bumped.manifest_hash().unwrap(), base_hash);

    let mut retagged = host_manifest();
    retagged.functions[0].error_codes[1].tag = "document/missing".to_string();
    assert_ne!(retagged.manifest_hash().unwrap(), base_hash);

    let mut repriced = host_manifest();
    repriced.functions[2].gas.base = 11;
    assert_ne!(repriced.manifest_hash().unwrap(), base_hash);
}

#[test]
fn test_unknown_key_rejected() {
    let manifest = host_manifest();
    let DvValue::Map(mut root) = manifest.to_value().unwrap() else {
        panic!("manifest value is a map");
    };
    root.insert("extra".to_string(), DvValue::Null).unwrap();

    let err = AbiManifest::from_value(&DvValue::Map(root)).unwrap_err();
    assert!(matches!(err, ManifestError::UnknownKey { .. }));
}

#[test]
fn test_missing_key_rejected() {
    let root = DvMap::from_entries([
        ("abi_id".to_string(), DvValue::from("workflow.host")),
        ("abi_version".to_string(), DvValue::Int(1)),
    ])
    .unwrap();
    let err = AbiManifest::from_value(&DvValue::Map(root)).unwrap_err();
    assert!(matches!(err, ManifestError::MissingKey { .. }));
}

#[test]
fn test_from_value_runs_semantic_validation() {
    let mut manifest = host_manifest();
    manifest.functions[0].error_codes = vec![ErrorCodeEntry {
        code: "HOST_TRANSPORT".to_string(),
        tag: "host/transport".to_string(),
    }];
    let value = {
        // Bypass canonical_bytes (which validates) to build the raw value.
        manifest.to_value().unwrap()
    };
    let err = AbiManifest::from_value(&value).unwrap_err();
    assert_eq!(err, ManifestError::ReservedErrorCode { fn_id: 1 });
}

#[test]
fn test_function_lookup() {
    let manifest = host_manifest();
    assert_eq!(manifest.function(2).unwrap().js_path[1], "getCanonical");
    assert!(manifest.function(99).is_none());
}

#[test]
fn test_worst_case_gas_arithmetic() {
    let f = document_fn(1, "get");
    // base + k_arg * max_req + k_ret * max_resp + k_units * max_units
    assert_eq!(f.worst_case_gas(), Some(20 + 4096 + 65536 + 1000));
}
