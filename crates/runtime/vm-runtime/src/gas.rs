//! Canonical gas meter.
//!
//! Gas is semantic, not wall-clock: it depends only on opcode sequencing,
//! the fixed builtin cost model, and request-size arithmetic. The meter is
//! the single mutable accounting point for one evaluation; every charging
//! hook below drives it.
//!
//! Charging points:
//! 1. One unit per opcode, charged before the opcode executes.
//! 2. Metered array builtins: 5 on entry, 2 per element before the lookup
//!    or callback runs. The out-of-gas element index is therefore the
//!    observable last-successful-index point.
//! 3. Allocations: `3 + ceil(bytes / 16)` on the requested size (realloc
//!    charges the full new size, not the delta). Allocations made while the
//!    out-of-gas error itself is being built are exempt.
//! 4. Host-call wrapper pre/post charges.
//!
//! Once out of gas, the meter latches: remaining gas is zeroed and every
//! later charge fails, so user code can never observe execution past the
//! boundary.

use dv_core::{DvMap, DvValue, MAX_SAFE_INTEGER};

/// Cost-schedule revision. Any change to the constants below bumps this.
pub const GAS_VERSION: u32 = 1;

/// Charge per opcode, taken before the opcode executes.
pub const OPCODE_GAS: u64 = 1;

/// Entry charge for a metered array builtin.
pub const BUILTIN_ENTRY_GAS: u64 = 5;

/// Per-element charge inside a metered array builtin.
pub const BUILTIN_ELEMENT_GAS: u64 = 2;

/// Fixed part of an allocation charge.
pub const ALLOC_BASE_GAS: u64 = 3;

/// Bytes per allocation gas unit (the variable part is `ceil(n / 16)`).
pub const ALLOC_BYTES_PER_UNIT: u64 = 16;

/// Allocated bytes between checkpoints before a GC pass becomes pending.
pub const GC_CHECKPOINT_THRESHOLD_BYTES: u64 = 512 * 1024;

/// Out-of-gas marker. Uncatchable by user code: the meter latches and the
/// outer evaluator is the only place the condition is observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutOfGas;

impl OutOfGas {
    /// Stable error code.
    pub const CODE: &'static str = "OOG";
    /// Stable error tag.
    pub const TAG: &'static str = "vm/out_of_gas";
}

impl core::fmt::Display for OutOfGas {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", Self::CODE, Self::TAG)
    }
}

/// Aggregate metering counters, kept only when tracing is enabled.
///
/// No per-opcode vectors are kept; the trace is a fixed-size summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GasTrace {
    pub opcode_count: u64,
    pub opcode_gas: u64,
    pub builtin_entry_count: u64,
    pub builtin_entry_gas: u64,
    pub builtin_element_count: u64,
    pub builtin_element_gas: u64,
    pub alloc_count: u64,
    pub alloc_bytes: u64,
    pub alloc_gas: u64,
}

impl GasTrace {
    /// Exports the counters as a deterministic value record.
    pub fn to_value(&self) -> DvValue {
        let mut map = DvMap::new();
        let entries: [(&str, u64); 9] = [
            ("opcodeCount", self.opcode_count),
            ("opcodeGas", self.opcode_gas),
            ("builtinEntryCount", self.builtin_entry_count),
            ("builtinEntryGas", self.builtin_entry_gas),
            ("builtinElementCount", self.builtin_element_count),
            ("builtinElementGas", self.builtin_element_gas),
            ("allocCount", self.alloc_count),
            ("allocBytes", self.alloc_bytes),
            ("allocGas", self.alloc_gas),
        ];
        for (key, count) in entries {
            let clamped = count.min(MAX_SAFE_INTEGER as u64) as i64;
            // Keys are distinct literals; insert cannot fail.
            let _ = map.insert(key.into(), DvValue::Int(clamped));
        }
        DvValue::Map(map)
    }
}

/// Per-evaluation gas accounting state.
#[derive(Clone, Debug)]
pub struct GasMeter {
    limit: u64,
    remaining: u64,
    bytes_since_checkpoint: u64,
    gc_pending: bool,
    exhausted: bool,
    unwind_exempt: bool,
    trace: Option<GasTrace>,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
            bytes_since_checkpoint: 0,
            gc_pending: false,
            exhausted: false,
            unwind_exempt: false,
            trace: None,
        }
    }

    /// A meter that also keeps aggregate trace counters.
    pub fn with_trace(limit: u64) -> Self {
        let mut meter = Self::new(limit);
        meter.trace = Some(GasTrace::default());
        meter
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn used(&self) -> u64 {
        self.limit - self.remaining
    }

    pub fn version(&self) -> u32 {
        GAS_VERSION
    }

    /// Whether the uncatchable out-of-gas latch has fired.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Charge for one opcode, before it executes.
    pub fn charge_opcode(&mut self) -> Result<(), OutOfGas> {
        self.charge(OPCODE_GAS)?;
        if let Some(trace) = &mut self.trace {
            trace.opcode_count += 1;
            trace.opcode_gas += OPCODE_GAS;
        }
        Ok(())
    }

    /// Entry charge for a metered array builtin.
    pub fn charge_builtin_entry(&mut self) -> Result<(), OutOfGas> {
        self.charge(BUILTIN_ENTRY_GAS)?;
        if let Some(trace) = &mut self.trace {
            trace.builtin_entry_count += 1;
            trace.builtin_entry_gas += BUILTIN_ENTRY_GAS;
        }
        Ok(())
    }

    /// Per-element charge inside a metered array builtin, before the
    /// element's property lookup or callback invocation.
    pub fn charge_builtin_element(&mut self) -> Result<(), OutOfGas> {
        self.charge(BUILTIN_ELEMENT_GAS)?;
        if let Some(trace) = &mut self.trace {
            trace.builtin_element_count += 1;
            trace.builtin_element_gas += BUILTIN_ELEMENT_GAS;
        }
        Ok(())
    }

    /// Charge for an allocation of `bytes` requested bytes. Exempt while
    /// the out-of-gas error itself is being constructed.
    pub fn charge_alloc(&mut self, bytes: u64) -> Result<(), OutOfGas> {
        if self.unwind_exempt {
            return Ok(());
        }
        let amount = ALLOC_BASE_GAS + bytes.div_ceil(ALLOC_BYTES_PER_UNIT);
        self.charge(amount)?;
        self.bytes_since_checkpoint = self.bytes_since_checkpoint.saturating_add(bytes);
        if self.bytes_since_checkpoint >= GC_CHECKPOINT_THRESHOLD_BYTES {
            self.gc_pending = true;
        }
        if let Some(trace) = &mut self.trace {
            trace.alloc_count += 1;
            trace.alloc_bytes += bytes;
            trace.alloc_gas += amount;
        }
        Ok(())
    }

    /// Wrapper pre/post charge around a host call.
    pub fn charge_host(&mut self, amount: u64) -> Result<(), OutOfGas> {
        self.charge(amount)
    }

    fn charge(&mut self, amount: u64) -> Result<(), OutOfGas> {
        if self.exhausted || amount > self.remaining {
            self.remaining = 0;
            self.exhausted = true;
            return Err(OutOfGas);
        }
        self.remaining -= amount;
        Ok(())
    }

    /// Marks the start of out-of-gas error construction: allocations made
    /// until [`GasMeter::end_oog_unwind`] are free.
    pub fn begin_oog_unwind(&mut self) {
        self.unwind_exempt = true;
    }

    pub fn end_oog_unwind(&mut self) {
        self.unwind_exempt = false;
    }

    /// Whether a GC pass is due at the next checkpoint.
    pub fn gc_pending(&self) -> bool {
        self.gc_pending
    }

    /// Consumes the pending-GC flag. Returns true when the caller should
    /// run a collection now. GC itself is free; its cost is amortized into
    /// allocation gas.
    pub fn checkpoint(&mut self) -> bool {
        let due = self.gc_pending;
        self.gc_pending = false;
        self.bytes_since_checkpoint = 0;
        due
    }

    /// Takes the trace counters, leaving tracing disabled.
    pub fn take_trace(&mut self) -> Option<GasTrace> {
        self.trace.take()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_charges_one() {
        let mut meter = GasMeter::new(10);
        meter.charge_opcode().unwrap();
        assert_eq!(meter.remaining(), 9);
        assert_eq!(meter.used(), 1);
    }

    #[test]
    fn test_oog_zeroes_and_latches() {
        let mut meter = GasMeter::new(3);
        meter.charge_opcode().unwrap();
        meter.charge_opcode().unwrap();
        meter.charge_opcode().unwrap();
        assert_eq!(meter.charge_opcode(), Err(OutOfGas));
        assert_eq!(meter.remaining(), 0);
        assert!(meter.is_exhausted());
        // Latched: even a free-looking charge keeps failing.
        assert_eq!(meter.charge_host(0), Err(OutOfGas));
    }

    #[test]
    fn test_alloc_cost_model() {
        let mut meter = GasMeter::new(1000);
        // 3 + ceil(0/16) = 3
        meter.charge_alloc(0).unwrap();
        assert_eq!(meter.used(), 3);
        // 3 + ceil(1/16) = 4
        meter.charge_alloc(1).unwrap();
        assert_eq!(meter.used(), 7);
        // 3 + ceil(16/16) = 4
        meter.charge_alloc(16).unwrap();
        assert_eq!(meter.used(), 11);
        // 3 + ceil(17/16) = 5
        meter.charge_alloc(17).unwrap();
        assert_eq!(meter.used(), 16);
    }

    #[test]
    fn test_oog_unwind_exemption() {
        let mut meter = GasMeter::new(4);
        meter.charge_alloc(16).unwrap();
        assert_eq!(meter.remaining(), 0);
        meter.begin_oog_unwind();
        // Error-object allocation is free and does not trip the latch.
        meter.charge_alloc(1024).unwrap();
        meter.end_oog_unwind();
        assert_eq!(meter.remaining(), 0);
        assert!(!meter.is_exhausted());
    }

    #[test]
    fn test_gc_pending_threshold() {
        let mut meter = GasMeter::new(u64::MAX);
        meter.charge_alloc(GC_CHECKPOINT_THRESHOLD_BYTES - 1).unwrap();
        assert!(!meter.gc_pending());
        meter.charge_alloc(1).unwrap();
        assert!(meter.gc_pending());
        assert!(meter.checkpoint());
        assert!(!meter.gc_pending());
        // Counter reset: the next small allocation does not re-arm.
        meter.charge_alloc(1).unwrap();
        assert!(!meter.checkpoint());
    }

    #[test]
    fn test_builtin_charges() {
        let mut meter = GasMeter::new(100);
        meter.charge_builtin_entry().unwrap();
        assert_eq!(meter.used(), BUILTIN_ENTRY_GAS);
        meter.charge_builtin_element().unwrap();
        meter.charge_builtin_element().unwrap();
        assert_eq!(meter.used(), BUILTIN_ENTRY_GAS + 2 * BUILTIN_ELEMENT_GAS);
    }

    #[test]
    fn test_builtin_oog_at_element_boundary() {
        // Budget for entry plus exactly two elements.
        let mut meter = GasMeter::new(BUILTIN_ENTRY_GAS + 2 * BUILTIN_ELEMENT_GAS);
        meter.charge_builtin_entry().unwrap();
        meter.charge_builtin_element().unwrap();
        meter.charge_builtin_element().unwrap();
        // The third element is the deterministic boundary.
        assert_eq!(meter.charge_builtin_element(), Err(OutOfGas));
    }

    #[test]
    fn test_trace_counters() {
        let mut meter = GasMeter::with_trace(1000);
        meter.charge_opcode().unwrap();
        meter.charge_opcode().unwrap();
        meter.charge_builtin_entry().unwrap();
        meter.charge_builtin_element().unwrap();
        meter.charge_alloc(32).unwrap();

        let trace = meter.take_trace().unwrap();
        assert_eq!(trace.opcode_count, 2);
        assert_eq!(trace.opcode_gas, 2);
        assert_eq!(trace.builtin_entry_count, 1);
        assert_eq!(trace.builtin_element_count, 1);
        assert_eq!(trace.alloc_count, 1);
        assert_eq!(trace.alloc_bytes, 32);
        assert_eq!(trace.alloc_gas, 3 + 2);

        let exported = trace.to_value();
        let map = exported.as_map().unwrap();
        assert_eq!(map.get("opcodeCount"), Some(&DvValue::Int(2)));
        assert_eq!(map.get("allocGas"), Some(&DvValue::Int(5)));
    }
}
