//! Heap allocation accounting.
//!
//! Heap counters come from a counting wrapper around the global allocator.
//! The host installs it and hands a reference to the runtime sampler:
//!
//! ```rust,no_run
//! use app_metrics::{RuntimeSampler, TrackingAllocator};
//!
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator::new();
//!
//! let sampler = RuntimeSampler::new().with_allocator(&GLOBAL);
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::data::{AllocStats, FreeStats};

/// Global allocator wrapper that counts allocations and deallocations.
pub struct TrackingAllocator<A = System> {
    inner: A,
    mallocs: AtomicU64,
    frees: AtomicU64,
    allocated_bytes: AtomicU64,
    freed_bytes: AtomicU64,
}

impl TrackingAllocator<System> {
    pub const fn new() -> Self {
        Self::wrap(System)
    }
}

impl Default for TrackingAllocator<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TrackingAllocator<A> {
    /// Count allocations served by `inner`.
    pub const fn wrap(inner: A) -> Self {
        Self {
            inner,
            mallocs: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            allocated_bytes: AtomicU64::new(0),
            freed_bytes: AtomicU64::new(0),
        }
    }

    fn record_alloc(&self, size: usize) {
        self.mallocs.fetch_add(1, Ordering::Relaxed);
        self.allocated_bytes.fetch_add(size as u64, Ordering::Relaxed);
    }

    fn record_free(&self, size: usize) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.freed_bytes.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Allocation counters at this instant.
    pub fn alloc_stats(&self) -> AllocStats {
        let mallocs = self.mallocs.load(Ordering::Relaxed);
        let frees = self.frees.load(Ordering::Relaxed);
        let total_alloc = self.allocated_bytes.load(Ordering::Relaxed);
        let freed = self.freed_bytes.load(Ordering::Relaxed);

        AllocStats {
            alloc: total_alloc.saturating_sub(freed),
            total_alloc,
            mallocs,
            objects: mallocs.saturating_sub(frees),
        }
    }

    /// Deallocation counters at this instant.
    pub fn free_stats(&self) -> FreeStats {
        FreeStats {
            count: self.frees.load(Ordering::Relaxed),
            bytes: self.freed_bytes.load(Ordering::Relaxed),
        }
    }
}

// SAFETY: every call is forwarded unchanged to the wrapped allocator; the
// wrapper only updates atomic counters, which never allocate.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() {
            self.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() {
            self.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.inner.dealloc(ptr, layout);
        self.record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            self.record_free(layout.size());
            self.record_alloc(new_size);
        }
        new_ptr
    }
}
