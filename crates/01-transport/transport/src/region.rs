//! Zeroed, aligned backing memory for shared buffers.
//!
//! Native targets prefer anonymous `mmap` regions (page aligned). When that is
//! not possible, or on WebAssembly, we fall back to a zeroed heap allocation
//! honoring the requested alignment. The base pointer is captured once so both
//! threads address the identical bytes for the lifetime of the region.

use crate::{TransportError, TransportResult};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

#[cfg(not(target_arch = "wasm32"))]
type NativeMap = memmap2::MmapMut;

#[derive(Debug)]
enum Backing {
    #[cfg(not(target_arch = "wasm32"))]
    Native(#[allow(dead_code)] NativeMap),
    Owned(Layout),
}

/// Contiguous, zero-initialised memory shared between threads.
#[derive(Debug)]
pub(crate) struct SharedRegion {
    ptr: NonNull<u8>,
    len: usize,
    backing: Backing,
}

// SAFETY: the region exclusively owns its allocation; concurrent access to the
// bytes is coordinated by the callers (atomics for control slots, the exchange
// phase for payload bytes).
unsafe impl Send for SharedRegion {}
// SAFETY: see above.
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Allocates `len` zeroed bytes aligned to `alignment`.
    pub(crate) fn new_zeroed(len: usize, alignment: usize) -> TransportResult<Self> {
        if len == 0 || alignment == 0 || !alignment.is_power_of_two() {
            return Err(TransportError::AllocationFailed {
                size: len,
                alignment,
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(region) = Self::mmap_backed(len, alignment)? {
                return Ok(region);
            }
        }

        Self::heap_backed(len, alignment)
    }

    fn heap_backed(len: usize, alignment: usize) -> TransportResult<Self> {
        let layout = Layout::from_size_align(len, alignment).map_err(|_| {
            TransportError::AllocationFailed {
                size: len,
                alignment,
            }
        })?;

        // SAFETY: `layout` has a non-zero size, checked in `new_zeroed`.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(TransportError::AllocationFailed {
            size: len,
            alignment,
        })?;
        Ok(Self {
            ptr,
            len,
            backing: Backing::Owned(layout),
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mmap_backed(len: usize, alignment: usize) -> TransportResult<Option<Self>> {
        // Anonymous mappings are zero-filled by the kernel.
        let mut map = memmap2::MmapOptions::new()
            .len(len)
            .map_anon()
            .map_err(|_| TransportError::AllocationFailed {
                size: len,
                alignment,
            })?;

        let raw = map.as_mut_ptr();
        if raw as usize % alignment != 0 {
            return Ok(None);
        }
        let ptr = NonNull::new(raw).ok_or(TransportError::AllocationFailed {
            size: len,
            alignment,
        })?;
        Ok(Some(Self {
            ptr,
            len,
            backing: Backing::Native(map),
        }))
    }

    /// Total number of bytes managed by this region.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Base address of the region. Valid for `len` bytes while `self` lives.
    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Backing::Owned(layout) = &self.backing {
            // SAFETY: `ptr` was produced by `alloc_zeroed` with this exact layout.
            unsafe {
                dealloc(self.ptr.as_ptr(), *layout);
            }
        }
    }
}
