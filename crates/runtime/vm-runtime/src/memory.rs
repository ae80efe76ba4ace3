//! Fixed-size linear memory shared between engine and dispatcher.
//!
//! The engine's memory is sized once at context creation (initial equals
//! maximum, growth disabled) so allocator behavior can never depend on host
//! growth policy. The dispatcher borrows non-overlapping request/response
//! slices for the duration of a single call and must not retain them.

use alloc::vec;
use alloc::vec::Vec;

/// Engine memory size: 32 MiB, initial = maximum.
pub const ENGINE_MEMORY_BYTES: u32 = 32 * 1024 * 1024;

/// Engine stack reservation (documented bound; enforced by the engine
/// build, not by this structure).
pub const ENGINE_STACK_BYTES: u32 = 1024 * 1024;

/// Out-of-bounds access into linear memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryFault {
    pub ptr: u32,
    pub len: u32,
}

impl core::fmt::Display for MemoryFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "memory range [{}, +{}) out of bounds", self.ptr, self.len)
    }
}

/// Bounds-checked linear byte memory with a fixed size.
#[derive(Clone, Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
}

impl LinearMemory {
    /// Full-size engine memory (32 MiB, zeroed).
    pub fn new() -> Self {
        Self::with_size(ENGINE_MEMORY_BYTES)
    }

    /// Fixed memory of an explicit size (tests and embedders with smaller
    /// engine builds).
    pub fn with_size(size: u32) -> Self {
        Self {
            bytes: vec![0u8; size as usize],
        }
    }

    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Checks that `[ptr, ptr + len)` lies inside memory.
    pub fn check_range(&self, ptr: u32, len: u32) -> Result<(), MemoryFault> {
        let end = (ptr as u64) + (len as u64);
        if end > self.bytes.len() as u64 {
            return Err(MemoryFault { ptr, len });
        }
        Ok(())
    }

    /// Whether two ranges overlap. Empty ranges never overlap.
    pub fn ranges_overlap(a_ptr: u32, a_len: u32, b_ptr: u32, b_len: u32) -> bool {
        if a_len == 0 || b_len == 0 {
            return false;
        }
        let a_end = a_ptr as u64 + a_len as u64;
        let b_end = b_ptr as u64 + b_len as u64;
        (a_ptr as u64) < b_end && (b_ptr as u64) < a_end
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&[u8], MemoryFault> {
        self.check_range(ptr, len)?;
        Ok(&self.bytes[ptr as usize..(ptr as usize + len as usize)])
    }

    pub fn write(&mut self, ptr: u32, data: &[u8]) -> Result<(), MemoryFault> {
        let len = u32::try_from(data.len()).map_err(|_| MemoryFault { ptr, len: u32::MAX })?;
        self.check_range(ptr, len)?;
        self.bytes[ptr as usize..(ptr as usize + data.len())].copy_from_slice(data);
        Ok(())
    }
}

impl Default for LinearMemory {
    fn default() -> Self {
        Self::new()
    }
}
