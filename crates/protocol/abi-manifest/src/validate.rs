//! Structural validation of ABI manifests.
//!
//! Every rule here is load-bearing for determinism or dispatch safety:
//! strictly ascending ids keep binary-search routing stable, js_path rules
//! keep the Host.v1 namespace free of collisions and prototype-chain
//! pollution, limit ranges keep envelopes encodable, and the worst-case gas
//! bound guarantees wrapper arithmetic can never overflow at call time.

use crate::types::{
    AbiFunction, AbiManifest, ManifestError, ValueSchema, FORBIDDEN_PATH_SEGMENTS,
    RESERVED_ERROR_CODES,
};

/// Validates a manifest against the exhaustive rule set.
///
/// A manifest that passes is safe to canonicalize, hash, and install.
pub fn validate(manifest: &AbiManifest) -> Result<(), ManifestError> {
    let mut prev_fn_id: Option<u32> = None;
    for function in &manifest.functions {
        if function.fn_id == 0 {
            return Err(ManifestError::FnIdZero);
        }
        if let Some(prev) = prev_fn_id {
            if function.fn_id <= prev {
                return Err(ManifestError::FnIdOrder {
                    fn_id: function.fn_id,
                });
            }
        }
        prev_fn_id = Some(function.fn_id);

        validate_function(function)?;
    }

    validate_path_disjointness(&manifest.functions)?;
    Ok(())
}

fn validate_function(function: &AbiFunction) -> Result<(), ManifestError> {
    let fn_id = function.fn_id;

    if function.js_path.is_empty() {
        return Err(ManifestError::JsPathEmpty { fn_id });
    }
    for segment in &function.js_path {
        validate_path_segment(fn_id, segment)?;
    }

    if function.arg_schema.len() != function.arity as usize {
        return Err(ManifestError::ArityMismatch { fn_id });
    }

    if let Some(caps) = &function.limits.arg_utf8_max {
        if caps.len() != function.arity as usize {
            return Err(ManifestError::ArgUtf8MaxShape { fn_id });
        }
        for (index, schema) in function.arg_schema.iter().enumerate() {
            if *schema != ValueSchema::String {
                return Err(ManifestError::ArgUtf8MaxNonString { fn_id, index });
            }
        }
    }

    let dv_cap = dv_core::MAX_ENCODED_BYTES;
    if function.limits.max_request_bytes == 0 || function.limits.max_request_bytes > dv_cap {
        return Err(ManifestError::RequestLimitOutOfRange { fn_id });
    }
    if function.limits.max_response_bytes == 0 || function.limits.max_response_bytes > dv_cap {
        return Err(ManifestError::ResponseLimitOutOfRange { fn_id });
    }

    let mut prev_code: Option<&str> = None;
    for entry in &function.error_codes {
        if entry.code.is_empty() || entry.tag.is_empty() {
            return Err(ManifestError::ErrorCodeEmpty { fn_id });
        }
        if RESERVED_ERROR_CODES.contains(&entry.code.as_str()) {
            return Err(ManifestError::ReservedErrorCode { fn_id });
        }
        if let Some(prev) = prev_code {
            if entry.code.as_str() <= prev {
                return Err(ManifestError::ErrorCodeOrder { fn_id });
            }
        }
        prev_code = Some(&entry.code);
    }

    if function.worst_case_gas().is_none() {
        return Err(ManifestError::WorstCaseGasOverflow { fn_id });
    }

    Ok(())
}

fn validate_path_segment(fn_id: u32, segment: &str) -> Result<(), ManifestError> {
    if segment.is_empty() {
        return Err(ManifestError::JsPathEmpty { fn_id });
    }
    if !segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(ManifestError::JsPathSegmentInvalid { fn_id });
    }
    if FORBIDDEN_PATH_SEGMENTS.contains(&segment) {
        return Err(ManifestError::JsPathForbiddenSegment { fn_id });
    }
    Ok(())
}

/// No function's js_path may be a prefix of another's (equality included):
/// a function installed at `document` would clobber the namespace object a
/// function at `document.canonical` needs.
fn validate_path_disjointness(functions: &[AbiFunction]) -> Result<(), ManifestError> {
    for (i, a) in functions.iter().enumerate() {
        for b in &functions[i + 1..] {
            let shorter = a.js_path.len().min(b.js_path.len());
            if a.js_path[..shorter] == b.js_path[..shorter] {
                return Err(ManifestError::JsPathCollision {
                    fn_id_a: a.fn_id,
                    fn_id_b: b.fn_id,
                });
            }
        }
    }
    Ok(())
}
