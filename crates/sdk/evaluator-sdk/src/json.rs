//! Embedder JSON boundary.
//!
//! JSON appears only at the edges: loading values from embedder documents
//! and serializing evaluation reports. Wire data never touches serde; the
//! deterministic codec is the single source of canonical bytes.

use serde_json::{json, Value as JsonValue};

use dv_core::{DvMap, DvValue, MAX_SAFE_INTEGER, MIN_SAFE_INTEGER};

use crate::result::{EvalOutcome, EvalReport};

/// JSON value outside the deterministic value space.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DvJsonError {
    #[error("number {value} is not representable deterministically")]
    UnrepresentableNumber { value: String },

    #[error("duplicate object key `{key}`")]
    DuplicateKey { key: String },
}

/// Projects a deterministic value into JSON.
pub fn dv_to_json(value: &DvValue) -> JsonValue {
    match value {
        DvValue::Null => JsonValue::Null,
        DvValue::Bool(b) => JsonValue::Bool(*b),
        DvValue::Int(n) => json!(n),
        // Finite by construction; from_f64 only fails on NaN/infinity.
        DvValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        DvValue::String(s) => JsonValue::String(s.clone()),
        DvValue::Array(items) => JsonValue::Array(items.iter().map(dv_to_json).collect()),
        DvValue::Map(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), dv_to_json(v)))
                .collect(),
        ),
    }
}

/// Parses JSON into the deterministic value space, canonicalizing numbers
/// the way the codec does.
pub fn dv_from_json(value: &JsonValue) -> Result<DvValue, DvJsonError> {
    match value {
        JsonValue::Null => Ok(DvValue::Null),
        JsonValue::Bool(b) => Ok(DvValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                if !(MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i) {
                    return Err(DvJsonError::UnrepresentableNumber {
                        value: n.to_string(),
                    });
                }
                return Ok(DvValue::Int(i));
            }
            if let Some(f) = n.as_f64() {
                return DvValue::float(f).map_err(|_| DvJsonError::UnrepresentableNumber {
                    value: n.to_string(),
                });
            }
            Err(DvJsonError::UnrepresentableNumber {
                value: n.to_string(),
            })
        }
        JsonValue::String(s) => Ok(DvValue::String(s.clone())),
        JsonValue::Array(items) => Ok(DvValue::Array(
            items.iter().map(dv_from_json).collect::<Result<_, _>>()?,
        )),
        JsonValue::Object(entries) => {
            let mut map = DvMap::new();
            for (key, entry) in entries {
                map.insert(key.clone(), dv_from_json(entry)?)
                    .map_err(|_| DvJsonError::DuplicateKey { key: key.clone() })?;
            }
            Ok(DvValue::Map(map))
        }
    }
}

impl EvalReport {
    /// The embedder-facing report shape.
    pub fn to_json_value(&self) -> JsonValue {
        let mut object = serde_json::Map::new();
        match &self.outcome {
            EvalOutcome::Success { value, raw } => {
                object.insert("ok".to_string(), JsonValue::Bool(true));
                object.insert("value".to_string(), dv_to_json(value));
                object.insert("raw".to_string(), JsonValue::String(hex::encode(raw)));
            }
            EvalOutcome::Failure(failure) => {
                object.insert("ok".to_string(), JsonValue::Bool(false));
                object.insert(
                    "type".to_string(),
                    JsonValue::String(failure.failure_type.as_str().to_string()),
                );
                object.insert(
                    "error".to_string(),
                    json!({
                        "kind": failure.kind.as_str(),
                        "code": failure.code,
                        "tag": failure.tag,
                        "message": failure.message,
                    }),
                );
                object.insert("raw".to_string(), JsonValue::Null);
            }
        }
        object.insert("gasUsed".to_string(), json!(self.gas_used));
        object.insert("gasRemaining".to_string(), json!(self.gas_remaining));
        if let Some(tape) = &self.tape {
            object.insert(
                "tape".to_string(),
                JsonValue::Array(tape.iter().map(|r| dv_to_json(&r.to_value())).collect()),
            );
        }
        if let Some(trace) = &self.gas_trace {
            object.insert("gasTrace".to_string(), dv_to_json(&trace.to_value()));
        }
        JsonValue::Object(object)
    }
}
