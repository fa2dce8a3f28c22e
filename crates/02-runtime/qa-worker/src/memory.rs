//! Private linear memory of the compute unit.
//!
//! The host adapter only ever sees the compute unit through 32-bit pointers
//! into this memory, the same way an embedded module exposes its linear
//! memory to host imports.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("access of {len} bytes at {ptr:#x} is outside the {size} byte memory")]
    OutOfBounds { ptr: u32, len: usize, size: usize },

    #[error("cannot reserve {requested} bytes, {available} left")]
    Exhausted { requested: usize, available: usize },
}

/// Pointer-addressed memory owned by a compute unit.
pub trait GuestMemory {
    fn read(&self, ptr: u32, len: u32) -> Result<&[u8], MemoryError>;
    fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), MemoryError>;
}

/// Flat byte memory with a bump allocator.
#[derive(Debug, Clone)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    top: usize,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            top: 0,
        }
    }

    /// Reserves `len` bytes and returns their address. Address 0 is never handed out.
    pub fn reserve(&mut self, len: usize) -> Result<u32, MemoryError> {
        let start = self.top.max(8);
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len() && *end <= u32::MAX as usize)
            .ok_or(MemoryError::Exhausted {
                requested: len,
                available: self.bytes.len().saturating_sub(start),
            })?;
        self.top = end;
        Ok(start as u32)
    }

    /// Reserves room for `bytes`, copies them in, and returns `(ptr, len)`.
    pub fn store(&mut self, bytes: &[u8]) -> Result<(u32, u32), MemoryError> {
        let ptr = self.reserve(bytes.len())?;
        self.write(ptr, bytes)?;
        Ok((ptr, bytes.len() as u32))
    }

    /// Releases every reservation.
    pub fn reset(&mut self) {
        self.top = 0;
    }

    fn range(&self, ptr: u32, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let start = ptr as usize;
        start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .map(|end| start..end)
            .ok_or(MemoryError::OutOfBounds {
                ptr,
                len,
                size: self.bytes.len(),
            })
    }
}

impl GuestMemory for LinearMemory {
    fn read(&self, ptr: u32, len: u32) -> Result<&[u8], MemoryError> {
        let range = self.range(ptr, len as usize)?;
        Ok(&self.bytes[range])
    }

    fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(ptr, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }
}
