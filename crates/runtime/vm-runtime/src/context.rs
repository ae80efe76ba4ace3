//! Injected evaluation context and canonicalization helpers.
//!
//! The context blob carries `event`, `eventCanonical`, and `steps` into the
//! engine as deep-frozen globals. The `canon` helpers back the ergonomic
//! `canon.unwrap` / `canon.at` globals: unwrap is an encode-then-decode
//! clone (canonicalize and freeze in one step), and `at` is bounded path
//! traversal with JS member-access semantics.

use alloc::string::{String, ToString};

use dv_core::{DvLimits, DvMap, DvValue};

/// The three context values injected as globals. Missing keys default to
/// null.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextBlob {
    pub event: DvValue,
    pub event_canonical: DvValue,
    pub steps: DvValue,
}

impl Default for ContextBlob {
    fn default() -> Self {
        Self::empty()
    }
}

/// Context blob failure.
#[derive(Clone, Debug, PartialEq)]
pub enum ContextError {
    /// The blob is not a map or carries an unknown key.
    InvalidShape { key: String },
    /// The blob exceeds the deterministic-value caps.
    Codec(dv_core::DvError),
}

impl From<dv_core::DvError> for ContextError {
    fn from(e: dv_core::DvError) -> Self {
        ContextError::Codec(e)
    }
}

impl core::fmt::Display for ContextError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ContextError::InvalidShape { key } => {
                write!(f, "unexpected context key `{}`", key)
            }
            ContextError::Codec(e) => write!(f, "context blob rejected: {}", e),
        }
    }
}

impl ContextBlob {
    pub fn new(event: DvValue, event_canonical: DvValue, steps: DvValue) -> Self {
        Self {
            event,
            event_canonical,
            steps,
        }
    }

    /// Parses a context blob map. Missing keys default to null; unknown
    /// keys are rejected.
    pub fn from_value(value: &DvValue) -> Result<Self, ContextError> {
        let map = value.as_map().ok_or(ContextError::InvalidShape {
            key: value.type_name().to_string(),
        })?;
        let mut blob = Self::empty();
        for (key, entry) in map.iter() {
            match key {
                "event" => blob.event = entry.clone(),
                "eventCanonical" => blob.event_canonical = entry.clone(),
                "steps" => blob.steps = entry.clone(),
                other => {
                    return Err(ContextError::InvalidShape {
                        key: other.to_string(),
                    })
                }
            }
        }
        Ok(blob)
    }

    /// An all-null blob.
    pub fn empty() -> Self {
        Self {
            event: DvValue::Null,
            event_canonical: DvValue::Null,
            steps: DvValue::Null,
        }
    }

    /// The canonical single-value form injected into the engine.
    pub fn to_value(&self) -> Result<DvValue, ContextError> {
        let mut map = DvMap::new();
        map.insert("event".to_string(), self.event.clone())?;
        map.insert("eventCanonical".to_string(), self.event_canonical.clone())?;
        map.insert("steps".to_string(), self.steps.clone())?;
        Ok(DvValue::Map(map))
    }

    /// Proves the blob fits the deterministic-value caps (<= 1 MiB encoded)
    /// and returns its canonical clone.
    pub fn validated(&self, limits: &DvLimits) -> Result<Self, ContextError> {
        let value = self.to_value()?;
        let canonical = dv_core::canonical_clone(&value, limits)?;
        Self::from_value(&canonical)
    }
}

// ============================================================================
// canon Helpers
// ============================================================================

/// `canon.unwrap(v)`: encode-then-decode canonical clone. The engine
/// deep-freezes the projection of the returned value.
pub fn canon_unwrap(value: &DvValue, limits: &DvLimits) -> Result<DvValue, dv_core::DvError> {
    dv_core::canonical_clone(value, limits)
}

/// One step of a `canon.at` path: an object key or an array index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSeg {
    Key(String),
    Index(u32),
}

/// Malformed `canon.at` path segment. Surfaces in the engine as a
/// deterministic TypeError.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathError {
    /// Key longer than the deterministic-value string cap.
    KeyTooLong,
    /// Index at or beyond the deterministic-value container cap.
    IndexOutOfRange,
}

impl core::fmt::Display for PathError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PathError::KeyTooLong => write!(f, "canon.at key exceeds the string cap"),
            PathError::IndexOutOfRange => write!(f, "canon.at index exceeds the array cap"),
        }
    }
}

/// `canon.at(v, path)`: bounded traversal.
///
/// Missing keys, out-of-bounds (but well-formed) indices, and traversal
/// into a non-container all yield `None`: JS member access on the wrong
/// shape is `undefined`, not an error. Only malformed segments fail.
pub fn canon_at<'a>(
    value: &'a DvValue,
    path: &[PathSeg],
    limits: &DvLimits,
) -> Result<Option<&'a DvValue>, PathError> {
    let limits = limits.clamped();
    let mut current = value;
    for segment in path {
        match segment {
            PathSeg::Key(key) => {
                if key.len() > limits.max_string_bytes as usize {
                    return Err(PathError::KeyTooLong);
                }
                match current {
                    DvValue::Map(map) => match map.get(key) {
                        Some(next) => current = next,
                        None => return Ok(None),
                    },
                    _ => return Ok(None),
                }
            }
            PathSeg::Index(index) => {
                if *index >= limits.max_container_len {
                    return Err(PathError::IndexOutOfRange);
                }
                match current {
                    DvValue::Array(items) => match items.get(*index as usize) {
                        Some(next) => current = next,
                        None => return Ok(None),
                    },
                    _ => return Ok(None),
                }
            }
        }
    }
    Ok(Some(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample() -> DvValue {
        DvValue::Map(
            DvMap::from_entries([
                (
                    "items".to_string(),
                    DvValue::Array(vec![
                        DvValue::from("first"),
                        DvValue::Map(
                            DvMap::from_entries([("id".to_string(), DvValue::Int(2))]).unwrap(),
                        ),
                    ]),
                ),
                ("name".to_string(), DvValue::from("doc")),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_canon_at_traverses_keys_and_indices() {
        let value = sample();
        let path = [
            PathSeg::Key("items".to_string()),
            PathSeg::Index(1),
            PathSeg::Key("id".to_string()),
        ];
        assert_eq!(
            canon_at(&value, &path, &DvLimits::DEFAULT).unwrap(),
            Some(&DvValue::Int(2))
        );
    }

    #[test]
    fn test_canon_at_missing_yields_undefined() {
        let value = sample();
        for path in [
            vec![PathSeg::Key("missing".to_string())],
            vec![PathSeg::Key("items".to_string()), PathSeg::Index(9)],
            // Indexing an object and keying an array are misses, not errors.
            vec![PathSeg::Index(0)],
            vec![PathSeg::Key("name".to_string()), PathSeg::Key("x".to_string())],
        ] {
            assert_eq!(canon_at(&value, &path, &DvLimits::DEFAULT).unwrap(), None);
        }
    }

    #[test]
    fn test_canon_at_malformed_segments_fail() {
        let value = sample();
        let long_key = "k".repeat(dv_core::MAX_STRING_BYTES as usize + 1);
        assert_eq!(
            canon_at(&value, &[PathSeg::Key(long_key)], &DvLimits::DEFAULT),
            Err(PathError::KeyTooLong)
        );
        assert_eq!(
            canon_at(
                &value,
                &[PathSeg::Index(dv_core::MAX_CONTAINER_LEN)],
                &DvLimits::DEFAULT
            ),
            Err(PathError::IndexOutOfRange)
        );
    }

    #[test]
    fn test_canon_unwrap_canonicalizes() {
        let value = DvValue::Float(4.0);
        assert_eq!(
            canon_unwrap(&value, &DvLimits::DEFAULT).unwrap(),
            DvValue::Int(4)
        );
    }

    #[test]
    fn test_blob_missing_keys_default_null() {
        let partial = DvValue::Map(
            DvMap::from_entries([("event".to_string(), DvValue::Int(1))]).unwrap(),
        );
        let blob = ContextBlob::from_value(&partial).unwrap();
        assert_eq!(blob.event, DvValue::Int(1));
        assert_eq!(blob.event_canonical, DvValue::Null);
        assert_eq!(blob.steps, DvValue::Null);
    }

    #[test]
    fn test_blob_unknown_key_rejected() {
        let bad = DvValue::Map(
            DvMap::from_entries([("extra".to_string(), DvValue::Int(1))]).unwrap(),
        );
        assert!(matches!(
            ContextBlob::from_value(&bad),
            Err(ContextError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_blob_roundtrip() {
        let blob = ContextBlob::new(
            DvValue::from("evt"),
            DvValue::from("canonical"),
            DvValue::Array(vec![DvValue::Int(1)]),
        );
        let rebuilt = ContextBlob::from_value(&blob.to_value().unwrap()).unwrap();
        assert_eq!(rebuilt, blob);
    }
}
