//! Canonical bytes and content hash of a manifest.
//!
//! The canonical form of a manifest is its deterministic-value encoding:
//! map keys land in canonical order no matter how callers assembled the
//! structure, so two structurally equal manifests always hash identically
//! and any single-byte change changes the hash.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use dv_core::{sha256_hex, DvLimits, DvMap, DvValue};

use crate::types::{
    AbiFunction, AbiManifest, Effect, ErrorCodeEntry, FnLimits, GasParams, ManifestError,
    ValueSchema,
};
use crate::validate::validate;

impl AbiManifest {
    /// Canonical DV form of the manifest.
    pub fn to_value(&self) -> Result<DvValue, ManifestError> {
        let mut root = DvMap::new();
        root.insert("abi_id".to_string(), DvValue::from(self.abi_id.clone()))?;
        root.insert("abi_version".to_string(), DvValue::from(self.abi_version))?;
        let functions = self
            .functions
            .iter()
            .map(function_to_value)
            .collect::<Result<Vec<_>, _>>()?;
        root.insert("functions".to_string(), DvValue::Array(functions))?;
        Ok(DvValue::Map(root))
    }

    /// Validates, then produces the canonical bytes (<= 1 MiB).
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        validate(self)?;
        let value = self.to_value()?;
        Ok(dv_core::encode(&value, &DvLimits::DEFAULT)?)
    }

    /// SHA-256 of the canonical bytes, as 64 lowercase hex characters.
    pub fn manifest_hash(&self) -> Result<String, ManifestError> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    /// Rebuilds a manifest from its DV form, enforcing exact key sets, then
    /// validates it.
    pub fn from_value(value: &DvValue) -> Result<Self, ManifestError> {
        const CTX: &str = "manifest";
        let map = expect_map(value, CTX, "manifest")?;
        check_keys(map, CTX, &["abi_id", "abi_version", "functions"])?;

        let abi_id = get_string(map, CTX, "abi_id")?;
        let abi_version = get_u32(map, CTX, "abi_version")?;
        let functions = match map.get("functions") {
            Some(DvValue::Array(items)) => items
                .iter()
                .map(function_from_value)
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ManifestError::WrongType {
                    context: CTX,
                    key: "functions",
                })
            }
            None => {
                return Err(ManifestError::MissingKey {
                    context: CTX,
                    key: "functions",
                })
            }
        };

        let manifest = AbiManifest {
            abi_id,
            abi_version,
            functions,
        };
        validate(&manifest)?;
        Ok(manifest)
    }

    /// Decodes canonical bytes and rebuilds the manifest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        let value = dv_core::decode(bytes, &DvLimits::DEFAULT)?;
        Self::from_value(&value)
    }
}

// ============================================================================
// Per-Function Conversion
// ============================================================================

fn function_to_value(function: &AbiFunction) -> Result<DvValue, ManifestError> {
    let mut out = DvMap::new();
    out.insert("fn_id".to_string(), DvValue::from(function.fn_id))?;
    out.insert(
        "js_path".to_string(),
        DvValue::Array(
            function
                .js_path
                .iter()
                .map(|segment| DvValue::from(segment.clone()))
                .collect(),
        ),
    )?;
    out.insert("effect".to_string(), DvValue::from(function.effect.as_str()))?;
    out.insert("arity".to_string(), DvValue::from(function.arity))?;
    out.insert(
        "arg_schema".to_string(),
        DvValue::Array(
            function
                .arg_schema
                .iter()
                .map(|schema| DvValue::from(schema.as_str()))
                .collect(),
        ),
    )?;
    out.insert(
        "return_schema".to_string(),
        DvValue::from(function.return_schema.as_str()),
    )?;

    let mut gas = DvMap::new();
    gas.insert(
        "schedule_id".to_string(),
        DvValue::from(function.gas.schedule_id),
    )?;
    gas.insert("base".to_string(), DvValue::from(function.gas.base))?;
    gas.insert(
        "k_arg_bytes".to_string(),
        DvValue::from(function.gas.k_arg_bytes),
    )?;
    gas.insert(
        "k_ret_bytes".to_string(),
        DvValue::from(function.gas.k_ret_bytes),
    )?;
    gas.insert("k_units".to_string(), DvValue::from(function.gas.k_units))?;
    out.insert("gas".to_string(), DvValue::Map(gas))?;

    let mut limits = DvMap::new();
    limits.insert(
        "max_request_bytes".to_string(),
        DvValue::from(function.limits.max_request_bytes),
    )?;
    limits.insert(
        "max_response_bytes".to_string(),
        DvValue::from(function.limits.max_response_bytes),
    )?;
    limits.insert(
        "max_units".to_string(),
        DvValue::from(function.limits.max_units),
    )?;
    if let Some(caps) = &function.limits.arg_utf8_max {
        limits.insert(
            "arg_utf8_max".to_string(),
            DvValue::Array(caps.iter().map(|cap| DvValue::from(*cap)).collect()),
        )?;
    }
    out.insert("limits".to_string(), DvValue::Map(limits))?;

    let error_codes = function
        .error_codes
        .iter()
        .map(|entry| {
            let mut pair = DvMap::new();
            pair.insert("code".to_string(), DvValue::from(entry.code.clone()))?;
            pair.insert("tag".to_string(), DvValue::from(entry.tag.clone()))?;
            Ok(DvValue::Map(pair))
        })
        .collect::<Result<Vec<_>, ManifestError>>()?;
    out.insert("error_codes".to_string(), DvValue::Array(error_codes))?;

    Ok(DvValue::Map(out))
}

fn function_from_value(value: &DvValue) -> Result<AbiFunction, ManifestError> {
    const CTX: &str = "function";
    let map = expect_map(value, CTX, "function")?;
    check_keys(
        map,
        CTX,
        &[
            "fn_id",
            "js_path",
            "effect",
            "arity",
            "arg_schema",
            "return_schema",
            "gas",
            "limits",
            "error_codes",
        ],
    )?;

    let fn_id = get_u32(map, CTX, "fn_id")?;

    let js_path = match map.get("js_path") {
        Some(DvValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or(ManifestError::WrongType {
                    context: CTX,
                    key: "js_path",
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ManifestError::WrongType {
                context: CTX,
                key: "js_path",
            })
        }
    };

    let effect = Effect::parse(&get_string(map, CTX, "effect")?).ok_or(
        ManifestError::WrongType {
            context: CTX,
            key: "effect",
        },
    )?;

    let arity = get_u32(map, CTX, "arity")?;

    let arg_schema = match map.get("arg_schema") {
        Some(DvValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .and_then(ValueSchema::parse)
                    .ok_or(ManifestError::WrongType {
                        context: CTX,
                        key: "arg_schema",
                    })
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ManifestError::WrongType {
                context: CTX,
                key: "arg_schema",
            })
        }
    };

    let return_schema = ValueSchema::parse(&get_string(map, CTX, "return_schema")?).ok_or(
        ManifestError::WrongType {
            context: CTX,
            key: "return_schema",
        },
    )?;

    let gas = gas_from_value(map.get("gas").ok_or(ManifestError::MissingKey {
        context: CTX,
        key: "gas",
    })?)?;

    let limits = limits_from_value(map.get("limits").ok_or(ManifestError::MissingKey {
        context: CTX,
        key: "limits",
    })?)?;

    let error_codes = match map.get("error_codes") {
        Some(DvValue::Array(items)) => items
            .iter()
            .map(error_code_from_value)
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ManifestError::WrongType {
                context: CTX,
                key: "error_codes",
            })
        }
    };

    Ok(AbiFunction {
        fn_id,
        js_path,
        effect,
        arity,
        arg_schema,
        return_schema,
        gas,
        limits,
        error_codes,
    })
}

fn gas_from_value(value: &DvValue) -> Result<GasParams, ManifestError> {
    const CTX: &str = "gas";
    let map = expect_map(value, CTX, "gas")?;
    check_keys(
        map,
        CTX,
        &["schedule_id", "base", "k_arg_bytes", "k_ret_bytes", "k_units"],
    )?;
    Ok(GasParams {
        schedule_id: get_u32(map, CTX, "schedule_id")?,
        base: get_u32(map, CTX, "base")?,
        k_arg_bytes: get_u32(map, CTX, "k_arg_bytes")?,
        k_ret_bytes: get_u32(map, CTX, "k_ret_bytes")?,
        k_units: get_u32(map, CTX, "k_units")?,
    })
}

fn limits_from_value(value: &DvValue) -> Result<FnLimits, ManifestError> {
    const CTX: &str = "limits";
    let map = expect_map(value, CTX, "limits")?;
    check_keys_with_optional(
        map,
        CTX,
        &["max_request_bytes", "max_response_bytes", "max_units"],
        &["arg_utf8_max"],
    )?;

    let arg_utf8_max = match map.get("arg_utf8_max") {
        None => None,
        Some(DvValue::Array(items)) => Some(
            items
                .iter()
                .map(|item| {
                    u32_from_value(item).ok_or(ManifestError::WrongType {
                        context: CTX,
                        key: "arg_utf8_max",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => {
            return Err(ManifestError::WrongType {
                context: CTX,
                key: "arg_utf8_max",
            })
        }
    };

    Ok(FnLimits {
        max_request_bytes: get_u32(map, CTX, "max_request_bytes")?,
        max_response_bytes: get_u32(map, CTX, "max_response_bytes")?,
        max_units: get_u32(map, CTX, "max_units")?,
        arg_utf8_max,
    })
}

fn error_code_from_value(value: &DvValue) -> Result<ErrorCodeEntry, ManifestError> {
    const CTX: &str = "error_codes";
    let map = expect_map(value, CTX, "error_codes")?;
    check_keys(map, CTX, &["code", "tag"])?;
    Ok(ErrorCodeEntry {
        code: get_string(map, CTX, "code")?,
        tag: get_string(map, CTX, "tag")?,
    })
}

// ============================================================================
// DV Extraction Helpers
// ============================================================================

fn expect_map<'a>(
    value: &'a DvValue,
    context: &'static str,
    key: &'static str,
) -> Result<&'a DvMap, ManifestError> {
    value
        .as_map()
        .ok_or(ManifestError::WrongType { context, key })
}

fn check_keys(map: &DvMap, context: &'static str, allowed: &[&'static str]) -> Result<(), ManifestError> {
    check_keys_with_optional(map, context, allowed, &[])
}

fn check_keys_with_optional(
    map: &DvMap,
    context: &'static str,
    required: &[&'static str],
    optional: &[&'static str],
) -> Result<(), ManifestError> {
    for (key, _) in map.iter() {
        if !required.contains(&key) && !optional.contains(&key) {
            return Err(ManifestError::UnknownKey {
                context,
                key: key.into(),
            });
        }
    }
    for key in required {
        if !map.contains_key(key) {
            return Err(ManifestError::MissingKey { context, key });
        }
    }
    Ok(())
}

fn get_string(map: &DvMap, context: &'static str, key: &'static str) -> Result<String, ManifestError> {
    match map.get(key) {
        Some(DvValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(ManifestError::WrongType { context, key }),
        None => Err(ManifestError::MissingKey { context, key }),
    }
}

fn get_u32(map: &DvMap, context: &'static str, key: &'static str) -> Result<u32, ManifestError> {
    match map.get(key) {
        Some(value) => u32_from_value(value).ok_or(ManifestError::WrongType { context, key }),
        None => Err(ManifestError::MissingKey { context, key }),
    }
}

fn u32_from_value(value: &DvValue) -> Option<u32> {
    match value {
        DvValue::Int(n) if (0..=u32::MAX as i64).contains(n) => Some(*n as u32),
        _ => None,
    }
}
