//! Marker for types that may live in zero-filled shared memory

use core::sync::atomic::{AtomicBool, AtomicU64};

/// Types whose all-zero bit pattern is a valid value and that contain no
/// pointers, so they can be placed in an anonymous shared mapping and read
/// by every process that inherits it.
///
/// # Safety
///
/// Implementors must be valid when zero-filled and must not hold pointers,
/// references, or anything whose meaning depends on the address space.
pub unsafe trait SharedZeroed: Sync {}

unsafe impl SharedZeroed for AtomicBool {}
unsafe impl SharedZeroed for AtomicU64 {}
