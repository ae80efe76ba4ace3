//! JSON document form of the ABI manifest.
//!
//! This is the at-rest format embedders check into their repos. It maps
//! one-to-one onto [`AbiManifest`]; the canonical bytes and the pinned hash
//! always come from the deterministic encoding, never from this JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use abi_manifest::{
    AbiFunction, AbiManifest, Effect, ErrorCodeEntry, FnLimits, GasParams, ManifestError,
    ValueSchema,
};

/// Manifest document as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ManifestDoc {
    pub abi_id: String,
    pub abi_version: u32,
    pub functions: Vec<FunctionDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FunctionDoc {
    pub fn_id: u32,
    pub js_path: Vec<String>,
    /// One of `READ`, `EMIT`, `MUTATE`.
    pub effect: String,
    pub arity: u32,
    /// Entries drawn from `string`, `dv`, `null`.
    pub arg_schema: Vec<String>,
    pub return_schema: String,
    pub gas: GasDoc,
    pub limits: LimitsDoc,
    pub error_codes: Vec<ErrorCodeDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GasDoc {
    pub schedule_id: u32,
    pub base: u32,
    pub k_arg_bytes: u32,
    pub k_ret_bytes: u32,
    pub k_units: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LimitsDoc {
    pub max_request_bytes: u32,
    pub max_response_bytes: u32,
    pub max_units: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_utf8_max: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ErrorCodeDoc {
    pub code: String,
    pub tag: String,
}

/// Errors when reading, writing, or converting manifest documents.
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("failed to parse manifest document: {0}")]
    Parse(String),

    #[error("failed to serialize manifest document: {0}")]
    Serialize(String),

    #[error("unknown effect `{0}` (expected READ, EMIT, or MUTATE)")]
    UnknownEffect(String),

    #[error("unknown schema `{0}` (expected string, dv, or null)")]
    UnknownSchema(String),

    #[error("manifest rejected: {0}")]
    Manifest(ManifestError),
}

impl From<ManifestError> for DocError {
    fn from(e: ManifestError) -> Self {
        DocError::Manifest(e)
    }
}

impl ManifestDoc {
    /// Serializes to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a document from a file path.
    pub fn from_file(path: &Path) -> Result<Self, DocError> {
        let content = std::fs::read_to_string(path).map_err(|e| DocError::Io(e.to_string()))?;
        Self::from_json(&content).map_err(|e| DocError::Parse(e.to_string()))
    }

    /// Saves the document to a file path.
    pub fn to_file(&self, path: &Path) -> Result<(), DocError> {
        let json = self
            .to_json_pretty()
            .map_err(|e| DocError::Serialize(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| DocError::Io(e.to_string()))
    }

    /// Converts into the validated protocol manifest.
    pub fn into_manifest(self) -> Result<AbiManifest, DocError> {
        let functions = self
            .functions
            .into_iter()
            .map(function_from_doc)
            .collect::<Result<Vec<_>, _>>()?;
        let manifest = AbiManifest {
            abi_id: self.abi_id,
            abi_version: self.abi_version,
            functions,
        };
        abi_manifest::validate(&manifest)?;
        Ok(manifest)
    }

    /// Builds the document form of a protocol manifest.
    pub fn from_manifest(manifest: &AbiManifest) -> Self {
        Self {
            abi_id: manifest.abi_id.clone(),
            abi_version: manifest.abi_version,
            functions: manifest.functions.iter().map(function_to_doc).collect(),
        }
    }

    /// A starter document with one example function.
    pub fn template(abi_id: String) -> Self {
        Self {
            abi_id,
            abi_version: 1,
            functions: vec![FunctionDoc {
                fn_id: 1,
                js_path: vec!["document".to_string(), "get".to_string()],
                effect: "READ".to_string(),
                arity: 1,
                arg_schema: vec!["string".to_string()],
                return_schema: "dv".to_string(),
                gas: GasDoc {
                    schedule_id: 1,
                    base: 20,
                    k_arg_bytes: 1,
                    k_ret_bytes: 1,
                    k_units: 1,
                },
                limits: LimitsDoc {
                    max_request_bytes: 4096,
                    max_response_bytes: 65536,
                    max_units: 1000,
                    arg_utf8_max: Some(vec![2048]),
                },
                error_codes: vec![ErrorCodeDoc {
                    code: "NOT_FOUND".to_string(),
                    tag: "document/not_found".to_string(),
                }],
            }],
        }
    }
}

fn function_from_doc(doc: FunctionDoc) -> Result<AbiFunction, DocError> {
    let effect = Effect::parse(&doc.effect).ok_or_else(|| DocError::UnknownEffect(doc.effect.clone()))?;
    let arg_schema = doc
        .arg_schema
        .iter()
        .map(|s| ValueSchema::parse(s).ok_or_else(|| DocError::UnknownSchema(s.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    let return_schema = ValueSchema::parse(&doc.return_schema)
        .ok_or_else(|| DocError::UnknownSchema(doc.return_schema.clone()))?;

    Ok(AbiFunction {
        fn_id: doc.fn_id,
        js_path: doc.js_path,
        effect,
        arity: doc.arity,
        arg_schema,
        return_schema,
        gas: GasParams {
            schedule_id: doc.gas.schedule_id,
            base: doc.gas.base,
            k_arg_bytes: doc.gas.k_arg_bytes,
            k_ret_bytes: doc.gas.k_ret_bytes,
            k_units: doc.gas.k_units,
        },
        limits: FnLimits {
            max_request_bytes: doc.limits.max_request_bytes,
            max_response_bytes: doc.limits.max_response_bytes,
            max_units: doc.limits.max_units,
            arg_utf8_max: doc.limits.arg_utf8_max,
        },
        error_codes: doc
            .error_codes
            .into_iter()
            .map(|entry| ErrorCodeEntry {
                code: entry.code,
                tag: entry.tag,
            })
            .collect(),
    })
}

fn function_to_doc(function: &AbiFunction) -> FunctionDoc {
    FunctionDoc {
        fn_id: function.fn_id,
        js_path: function.js_path.clone(),
        effect: function.effect.as_str().to_string(),
        arity: function.arity,
        arg_schema: function
            .arg_schema
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        return_schema: function.return_schema.as_str().to_string(),
        gas: GasDoc {
            schedule_id: function.gas.schedule_id,
            base: function.gas.base,
            k_arg_bytes: function.gas.k_arg_bytes,
            k_ret_bytes: function.gas.k_ret_bytes,
            k_units: function.gas.k_units,
        },
        limits: LimitsDoc {
            max_request_bytes: function.limits.max_request_bytes,
            max_response_bytes: function.limits.max_response_bytes,
            max_units: function.limits.max_units,
            arg_utf8_max: function.limits.arg_utf8_max.clone(),
        },
        error_codes: function
            .error_codes
            .iter()
            .map(|entry| ErrorCodeDoc {
                code: entry.code.clone(),
                tag: entry.tag.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_roundtrips_through_json() {
        let doc = ManifestDoc::template("workflow.host".to_string());
        let json = doc.to_json_pretty().unwrap();
        let parsed = ManifestDoc::from_json(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_template_converts_and_hashes() {
        let manifest = ManifestDoc::template("workflow.host".to_string())
            .into_manifest()
            .unwrap();
        let hash = manifest.manifest_hash().unwrap();
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_doc_manifest_doc_roundtrip() {
        let doc = ManifestDoc::template("workflow.host".to_string());
        let manifest = doc.clone().into_manifest().unwrap();
        assert_eq!(ManifestDoc::from_manifest(&manifest), doc);
    }

    #[test]
    fn test_unknown_effect_rejected() {
        let mut doc = ManifestDoc::template("workflow.host".to_string());
        doc.functions[0].effect = "WRITE".to_string();
        assert!(matches!(
            doc.into_manifest(),
            Err(DocError::UnknownEffect(_))
        ));
    }

    #[test]
    fn test_unknown_json_field_rejected() {
        let json = r#"{"abi_id": "x", "abi_version": 1, "functions": [], "extra": true}"#;
        assert!(ManifestDoc::from_json(json).is_err());
    }

    #[test]
    fn test_reserved_code_rejected_via_doc() {
        let mut doc = ManifestDoc::template("workflow.host".to_string());
        doc.functions[0].error_codes = vec![ErrorCodeDoc {
            code: "HOST_TRANSPORT".to_string(),
            tag: "host/transport".to_string(),
        }];
        assert!(matches!(doc.into_manifest(), Err(DocError::Manifest(_))));
    }
}
