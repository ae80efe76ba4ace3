//! Input envelope validation.

use dv_core::{DvLimits, DvValue};
use vm_runtime::{ContextBlob, ContextError};

/// The three input values handed to a program. Each is bounded by the
/// deterministic-value caps; together they form the context blob injected
/// into the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct InputEnvelope {
    pub event: DvValue,
    pub event_canonical: DvValue,
    pub steps: DvValue,
}

/// Input envelope rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("input envelope rejected: {0}")]
    Context(ContextError),
}

impl From<ContextError> for InputError {
    fn from(e: ContextError) -> Self {
        InputError::Context(e)
    }
}

impl InputEnvelope {
    /// An all-null envelope.
    pub fn empty() -> Self {
        Self {
            event: DvValue::Null,
            event_canonical: DvValue::Null,
            steps: DvValue::Null,
        }
    }

    /// Validates against the DV caps and returns the canonical context
    /// blob.
    pub fn to_blob(&self) -> Result<ContextBlob, InputError> {
        let blob = ContextBlob::new(
            self.event.clone(),
            self.event_canonical.clone(),
            self.steps.clone(),
        );
        Ok(blob.validated(&DvLimits::DEFAULT)?)
    }
}

impl Default for InputEnvelope {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_core::DvMap;

    #[test]
    fn test_empty_envelope_validates() {
        let blob = InputEnvelope::empty().to_blob().unwrap();
        assert_eq!(blob.event, DvValue::Null);
    }

    #[test]
    fn test_envelope_canonicalizes() {
        let envelope = InputEnvelope {
            event: DvValue::Float(3.0),
            event_canonical: DvValue::Null,
            steps: DvValue::Null,
        };
        let blob = envelope.to_blob().unwrap();
        assert_eq!(blob.event, DvValue::Int(3));
    }

    #[test]
    fn test_oversized_envelope_rejected() {
        // A single string over the 256 KiB string cap.
        let big = "x".repeat(dv_core::MAX_STRING_BYTES as usize + 1);
        let envelope = InputEnvelope {
            event: DvValue::from(big),
            event_canonical: DvValue::Null,
            steps: DvValue::Null,
        };
        assert!(envelope.to_blob().is_err());
    }

    #[test]
    fn test_structured_event_roundtrips() {
        let event = DvValue::Map(
            DvMap::from_entries([("type".to_string(), DvValue::from("created"))]).unwrap(),
        );
        let envelope = InputEnvelope {
            event: event.clone(),
            event_canonical: event.clone(),
            steps: DvValue::Array(vec![]),
        };
        let blob = envelope.to_blob().unwrap();
        assert_eq!(blob.event, event);
    }
}
