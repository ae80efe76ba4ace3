//! Bounded audit tape of completed host calls.
//!
//! One record per completed invocation, appended after envelope validation
//! and after the post-charge step (or with `charge_failed` set when the
//! post-charge itself runs out of gas). Pre-charge OOG, transport failures,
//! and invalid envelopes never reach the tape. The tape is a ring: when
//! full, the oldest record is dropped.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use dv_core::{hex64, DvMap, DvValue, MAX_SAFE_INTEGER};

/// Hard cap on tape capacity.
pub const MAX_TAPE_CAPACITY: usize = 1024;

/// Requested tape capacity outside [1, 1024].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapeCapacityError {
    pub requested: usize,
}

impl core::fmt::Display for TapeCapacityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "tape capacity {} outside [1, {}]",
            self.requested, MAX_TAPE_CAPACITY
        )
    }
}

/// Audit record of one completed host call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TapeRecord {
    pub fn_id: u32,
    pub req_len: u32,
    pub resp_len: u32,
    pub units: u32,
    /// Gas charged before the syscall (`base + k_arg * req_len`).
    pub gas_pre: u64,
    /// Gas charged after the syscall (`k_ret * resp_len + k_units * units`).
    pub gas_post: u64,
    /// Whether the envelope carried `err`.
    pub is_error: bool,
    /// Whether the post-charge ran out of gas.
    pub charge_failed: bool,
    /// SHA-256 of the request bytes.
    pub req_hash: [u8; 32],
    /// SHA-256 of the response envelope bytes.
    pub resp_hash: [u8; 32],
}

impl TapeRecord {
    /// Exports the record as a deterministic value (hashes as lowercase
    /// hex).
    pub fn to_value(&self) -> DvValue {
        let mut map = DvMap::new();
        // Keys are distinct literals; insert cannot fail.
        let _ = map.insert("fnId".into(), DvValue::Int(self.fn_id as i64));
        let _ = map.insert("reqLen".into(), DvValue::Int(self.req_len as i64));
        let _ = map.insert("respLen".into(), DvValue::Int(self.resp_len as i64));
        let _ = map.insert("units".into(), DvValue::Int(self.units as i64));
        let _ = map.insert(
            "gasPre".into(),
            DvValue::Int(self.gas_pre.min(MAX_SAFE_INTEGER as u64) as i64),
        );
        let _ = map.insert(
            "gasPost".into(),
            DvValue::Int(self.gas_post.min(MAX_SAFE_INTEGER as u64) as i64),
        );
        let _ = map.insert("isError".into(), DvValue::Bool(self.is_error));
        let _ = map.insert("chargeFailed".into(), DvValue::Bool(self.charge_failed));
        let _ = map.insert("reqHash".into(), DvValue::String(hex64(&self.req_hash)));
        let _ = map.insert("respHash".into(), DvValue::String(hex64(&self.resp_hash)));
        DvValue::Map(map)
    }

    /// Request hash as lowercase hex.
    pub fn req_hash_hex(&self) -> String {
        hex64(&self.req_hash)
    }

    /// Response hash as lowercase hex.
    pub fn resp_hash_hex(&self) -> String {
        hex64(&self.resp_hash)
    }
}

/// Bounded ring of host-call records.
#[derive(Clone, Debug)]
pub struct HostTape {
    records: VecDeque<TapeRecord>,
    capacity: usize,
}

impl HostTape {
    pub fn new(capacity: usize) -> Result<Self, TapeCapacityError> {
        if capacity == 0 || capacity > MAX_TAPE_CAPACITY {
            return Err(TapeCapacityError {
                requested: capacity,
            });
        }
        Ok(Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Appends a record, dropping the oldest when full.
    pub fn push(&mut self, record: TapeRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TapeRecord> {
        self.records.iter()
    }

    /// Drains the tape into a plain vector, oldest first.
    pub fn into_records(self) -> Vec<TapeRecord> {
        self.records.into_iter().collect()
    }

    /// Exports the tape as a deterministic value array, oldest first.
    pub fn to_value(&self) -> DvValue {
        DvValue::Array(self.records.iter().map(TapeRecord::to_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_core::sha256;

    fn record(fn_id: u32) -> TapeRecord {
        TapeRecord {
            fn_id,
            req_len: 4,
            resp_len: 8,
            units: 1,
            gas_pre: 24,
            gas_post: 9,
            is_error: false,
            charge_failed: false,
            req_hash: sha256(b"req"),
            resp_hash: sha256(b"resp"),
        }
    }

    #[test]
    fn test_capacity_bounds() {
        assert!(HostTape::new(0).is_err());
        assert!(HostTape::new(MAX_TAPE_CAPACITY).is_ok());
        assert!(HostTape::new(MAX_TAPE_CAPACITY + 1).is_err());
    }

    #[test]
    fn test_ring_drops_oldest() {
        let mut tape = HostTape::new(2).unwrap();
        tape.push(record(1));
        tape.push(record(2));
        tape.push(record(3));
        let ids: Vec<u32> = tape.iter().map(|r| r.fn_id).collect();
        assert_eq!(ids, [2, 3]);
    }

    #[test]
    fn test_export_shape() {
        let mut tape = HostTape::new(4).unwrap();
        tape.push(record(7));
        let value = tape.to_value();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 1);
        let map = items[0].as_map().unwrap();
        assert_eq!(map.get("fnId"), Some(&DvValue::Int(7)));
        assert_eq!(
            map.get("reqHash").and_then(|v| v.as_str()).map(str::len),
            Some(64)
        );
    }
}
