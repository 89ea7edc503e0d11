//! Shared memory regions
//!
//! A `SharedRegion<T>` is an array of `T` in an anonymous `MAP_SHARED`
//! mapping. Forked workers inherit the mapping at the same address and see
//! the coordinator's writes (and it theirs) without any IPC; a private
//! mapping would be copy-on-write and break the whole scheme.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}

use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::AtomicBool;
use stressng_core::{SharedFlag, SharedZeroed};

/// Zero-filled array of `T` visible to every process forked after allocation
///
/// Dropping the region unmaps it. Drop only after every process that writes
/// into it has exited or been reaped; that is a precondition, not something
/// the region can check.
pub struct SharedRegion<T: SharedZeroed> {
    /// Base address of the mapping
    base: NonNull<T>,

    /// Number of elements
    len: usize,

    /// Mapped size in bytes
    total_size: usize,

    _marker: PhantomData<T>,
}

// Safety: T is Sync and holds no process-local pointers (SharedZeroed);
// the region only hands out shared references.
unsafe impl<T: SharedZeroed> Send for SharedRegion<T> {}
unsafe impl<T: SharedZeroed> Sync for SharedRegion<T> {}

impl<T: SharedZeroed> SharedRegion<T> {
    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mapped size in bytes
    #[inline]
    pub fn total_size(&self) -> usize {
        self.total_size
    }
}

impl<T: SharedZeroed> Deref for SharedRegion<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // Safety: base points at `len` zero-initialized (hence valid) T's that
        // stay mapped until drop.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }
}

impl<T: SharedZeroed> std::fmt::Debug for SharedRegion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("total_size", &self.total_size)
            .finish()
    }
}

impl SharedFlag for SharedRegion<AtomicBool> {
    fn flag(&self) -> &AtomicBool {
        &self[0]
    }
}
