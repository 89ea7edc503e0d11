//! Unix shared memory implementation using mmap

use super::SharedRegion;
use std::marker::PhantomData;
use std::ptr::NonNull;
use stressng_core::{CoreResult, ResourceError, SharedZeroed};
use tracing::warn;

impl<T: SharedZeroed> SharedRegion<T> {
    /// Map `len` zero-filled elements as shared anonymous memory
    ///
    /// Fails with `ResourceError` when the kernel refuses the mapping; the
    /// caller decides whether that sinks one stressor or the whole run.
    pub fn allocate(len: usize) -> CoreResult<Self> {
        if len == 0 || std::mem::size_of::<T>() == 0 {
            return Err(ResourceError::Empty);
        }

        let total_size = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(ResourceError::TooManySlots(len))?;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if base == libc::MAP_FAILED {
            return Err(ResourceError::MapFailed {
                bytes: total_size,
                errno: nix::errno::Errno::last_raw(),
            });
        }

        // mmap returns page-aligned memory; any T alignment up to a page holds.
        debug_assert_eq!(base as usize % std::mem::align_of::<T>(), 0);

        Ok(Self {
            base: NonNull::new(base as *mut T).ok_or(ResourceError::MapFailed {
                bytes: total_size,
                errno: 0,
            })?,
            len,
            total_size,
            _marker: PhantomData,
        })
    }
}

impl<T: SharedZeroed> Drop for SharedRegion<T> {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.total_size) };
        if ret != 0 {
            warn!(
                "munmap of {} byte shared region failed: errno {}",
                self.total_size,
                nix::errno::Errno::last_raw()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use stressng_core::{SyncState, WorkerStats, WorkerSyncSlot};

    #[test]
    fn test_allocate_zero_filled() {
        let region = SharedRegion::<AtomicU64>::allocate(128).unwrap();
        assert_eq!(region.len(), 128);
        assert_eq!(region.total_size(), 128 * 8);
        assert!(region.iter().all(|v| v.load(Ordering::Relaxed) == 0));
    }

    #[test]
    fn test_zeroed_slot_reads_waiting() {
        let slots = SharedRegion::<WorkerSyncSlot>::allocate(4).unwrap();
        assert!(slots.iter().all(|s| s.state() == SyncState::Waiting));
        slots[2].init();
        assert_eq!(slots[2].state(), SyncState::Started);
    }

    #[test]
    fn test_stats_region() {
        let stats = SharedRegion::<WorkerStats>::allocate(3).unwrap();
        stats[1].counter.fetch_add(5, Ordering::Relaxed);
        assert_eq!(stats[1].counter(), 5);
        assert_eq!(stats[0].counter(), 0);
        assert!(!stats[2].is_ignored());
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(
            SharedRegion::<AtomicBool>::allocate(0).unwrap_err(),
            ResourceError::Empty
        );
    }

    #[test]
    fn test_overflow_rejected() {
        let err = SharedRegion::<WorkerStats>::allocate(usize::MAX).unwrap_err();
        assert_eq!(err, ResourceError::TooManySlots(usize::MAX));
    }

    fn flag_pair() -> CoreResult<(SharedRegion<AtomicBool>, SharedRegion<AtomicBool>)> {
        Ok((SharedRegion::allocate(1)?, SharedRegion::allocate(0)?))
    }

    #[test]
    fn test_allocate_propagates_with_question_mark() {
        assert_eq!(flag_pair().unwrap_err(), ResourceError::Empty);
    }

    #[test]
    fn test_visible_across_fork() {
        let region = SharedRegion::<AtomicU64>::allocate(1).unwrap();
        match unsafe { nix::unistd::fork() }.unwrap() {
            nix::unistd::ForkResult::Child => {
                region[0].store(0xfeed, Ordering::SeqCst);
                unsafe { libc::_exit(0) };
            }
            nix::unistd::ForkResult::Parent { child } => {
                nix::sys::wait::waitpid(child, None).unwrap();
                assert_eq!(region[0].load(Ordering::SeqCst), 0xfeed);
            }
        }
    }
}
