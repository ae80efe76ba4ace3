//! Reference host handlers for the embedder minimum set.
//!
//! These back `document.get`, `document.getCanonical`, and `emit` in tests
//! and demos. Real embedders supply their own; the dispatcher only sees the
//! [`HostHandler`] trait either way.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use dv_core::{DvLimits, DvValue};
use vm_runtime::{HandlerOutcome, HostHandler};

/// Error code reported for unknown document paths. Manifests wiring this
/// store must declare it.
pub const DOCUMENT_NOT_FOUND_CODE: &str = "NOT_FOUND";

/// In-memory document store backing `document.get` and
/// `document.getCanonical`.
///
/// Cloning shares the underlying documents, so a store can hand out one
/// handler per manifest function while the embedder keeps inserting.
#[derive(Clone, Default)]
pub struct StaticDocumentStore {
    docs: Rc<RefCell<BTreeMap<String, DvValue>>>,
    units_per_get: u32,
}

impl StaticDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose handlers report a fixed unit count per lookup.
    pub fn with_units(units_per_get: u32) -> Self {
        Self {
            docs: Rc::default(),
            units_per_get,
        }
    }

    pub fn insert(&self, path: impl Into<String>, value: DvValue) {
        self.docs.borrow_mut().insert(path.into(), value);
    }

    fn lookup(&self, args: &[DvValue]) -> Result<DvValue, ()> {
        let path = args.first().and_then(DvValue::as_str).ok_or(())?;
        self.docs.borrow().get(path).cloned().ok_or(())
    }

    /// Handler for `document.get`: the stored value as-is.
    pub fn get_handler(&self) -> impl HostHandler {
        let store = self.clone();
        move |args: &[DvValue]| match store.lookup(args) {
            Ok(value) => HandlerOutcome::Ok {
                value,
                units: store.units_per_get,
            },
            Err(()) => HandlerOutcome::Err {
                code: DOCUMENT_NOT_FOUND_CODE.to_string(),
                details: args.first().cloned(),
                units: 0,
            },
        }
    }

    /// Handler for `document.getCanonical`: the stored value after an
    /// encode-then-decode canonical clone.
    pub fn get_canonical_handler(&self) -> impl HostHandler {
        let store = self.clone();
        move |args: &[DvValue]| match store.lookup(args) {
            Ok(value) => match dv_core::canonical_clone(&value, &DvLimits::DEFAULT) {
                Ok(canonical) => HandlerOutcome::Ok {
                    value: canonical,
                    units: store.units_per_get,
                },
                // A stored document over the DV caps cannot be served.
                Err(_) => HandlerOutcome::Err {
                    code: abi_manifest::ERROR_CODE_LIMIT_EXCEEDED.to_string(),
                    details: None,
                    units: 0,
                },
            },
            Err(()) => HandlerOutcome::Err {
                code: DOCUMENT_NOT_FOUND_CODE.to_string(),
                details: args.first().cloned(),
                units: 0,
            },
        }
    }
}

/// Collecting sink backing `emit`. Emitted values are observable after the
/// evaluation, in issue order.
#[derive(Clone, Default)]
pub struct EmitSink {
    emitted: Rc<RefCell<Vec<DvValue>>>,
}

impl EmitSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for `emit`: records the value, returns null.
    pub fn handler(&self) -> impl HostHandler {
        let sink = self.clone();
        move |args: &[DvValue]| {
            sink.emitted
                .borrow_mut()
                .push(args.first().cloned().unwrap_or(DvValue::Null));
            HandlerOutcome::Ok {
                value: DvValue::Null,
                units: 0,
            }
        }
    }

    /// Everything emitted so far, in order.
    pub fn emitted(&self) -> Vec<DvValue> {
        self.emitted.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm_runtime::HostHandler as _;

    #[test]
    fn test_store_get_and_miss() {
        let store = StaticDocumentStore::with_units(9);
        store.insert("path/to/doc", DvValue::from("content"));

        let mut handler = store.get_handler();
        match handler.call(&[DvValue::from("path/to/doc")]) {
            HandlerOutcome::Ok { value, units } => {
                assert_eq!(value, DvValue::from("content"));
                assert_eq!(units, 9);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        match handler.call(&[DvValue::from("missing")]) {
            HandlerOutcome::Err { code, .. } => assert_eq!(code, DOCUMENT_NOT_FOUND_CODE),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_canonical_handler_canonicalizes() {
        let store = StaticDocumentStore::new();
        store.insert("doc", DvValue::Float(5.0));
        let mut handler = store.get_canonical_handler();
        match handler.call(&[DvValue::from("doc")]) {
            HandlerOutcome::Ok { value, .. } => assert_eq!(value, DvValue::Int(5)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_emit_sink_preserves_order() {
        let sink = EmitSink::new();
        let mut handler = sink.handler();
        handler.call(&[DvValue::Int(1)]);
        handler.call(&[DvValue::Int(2)]);
        assert_eq!(sink.emitted(), vec![DvValue::Int(1), DvValue::Int(2)]);
    }
}
