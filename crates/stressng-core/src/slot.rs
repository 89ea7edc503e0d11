//! Per-worker sync slot
//!
//! One slot per worker process, allocated in a shared array before any fork.
//! Layout is `repr(C)` and pointer-free so the same bytes mean the same thing
//! in every process that maps them.
//!
//! ```text
//! 0x00: pid          (i32) - Worker pid, written at fork
//! 0x04: oomable_pid  (i32) - Delegate child pid, preferred as signal target
//! 0x08: next         (u32) - Index of the next slot in the sync list
//! 0x0C: state        (u8)  - SyncState
//! ```

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use crate::constants::{PID_NONE, SLOT_NONE};
use crate::shared::SharedZeroed;
use crate::state::{StateCell, StateStore, SyncState};

#[repr(C, align(64))]
pub struct WorkerSyncSlot {
    pid: AtomicI32,
    oomable_pid: AtomicI32,
    next: AtomicU32,
    state: StateCell,
}

// Safety: atomics and a state byte; all-zero is a valid (WAITING, pid 0) slot.
unsafe impl SharedZeroed for WorkerSyncSlot {}

impl WorkerSyncSlot {
    /// Create an initialized slot (pid unknown, STARTED)
    pub const fn new() -> Self {
        Self {
            pid: AtomicI32::new(PID_NONE),
            oomable_pid: AtomicI32::new(PID_NONE),
            next: AtomicU32::new(SLOT_NONE),
            state: StateCell::new(SyncState::Started),
        }
    }

    /// Reset the slot: pid unknown, state STARTED
    ///
    /// The `next` link is left alone; it belongs to the list owner.
    pub fn init(&self) {
        self.pid.store(PID_NONE, Ordering::Relaxed);
        self.oomable_pid.store(PID_NONE, Ordering::Relaxed);
        self.state.store(SyncState::Started);
    }

    #[inline]
    pub fn pid(&self) -> i32 {
        self.pid.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_pid(&self, pid: i32) {
        self.pid.store(pid, Ordering::Relaxed);
    }

    #[inline]
    pub fn oomable_pid(&self) -> i32 {
        self.oomable_pid.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_oomable_pid(&self, pid: i32) {
        self.oomable_pid.store(pid, Ordering::Relaxed);
    }

    /// Pid that stop/continue signals should go to
    ///
    /// Prefers the oomable delegate when one is registered.
    #[inline]
    pub fn target_pid(&self) -> i32 {
        let oomable = self.oomable_pid();
        if oomable > 1 {
            oomable
        } else {
            self.pid()
        }
    }

    #[inline]
    pub fn state(&self) -> SyncState {
        self.state.load()
    }

    #[inline]
    pub fn set_state(&self, state: SyncState) {
        self.state.store(state);
    }

    /// Index of the next slot, or `None` at the end of the list
    #[inline]
    pub fn next(&self) -> Option<u32> {
        match self.next.load(Ordering::Relaxed) {
            SLOT_NONE => None,
            idx => Some(idx),
        }
    }

    #[inline]
    pub fn set_next(&self, next: Option<u32>) {
        self.next.store(next.unwrap_or(SLOT_NONE), Ordering::Relaxed);
    }
}

impl Default for WorkerSyncSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for WorkerSyncSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerSyncSlot")
            .field("pid", &self.pid())
            .field("oomable_pid", &self.oomable_pid())
            .field("next", &self.next())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        let slot = WorkerSyncSlot::new();
        slot.set_pid(1234);
        slot.set_state(SyncState::Running);

        slot.init();
        assert_eq!(slot.pid(), PID_NONE);
        assert_eq!(slot.state(), SyncState::Started);
    }

    #[test]
    fn test_target_prefers_oomable() {
        let slot = WorkerSyncSlot::new();
        slot.set_pid(100);
        assert_eq!(slot.target_pid(), 100);

        slot.set_oomable_pid(200);
        assert_eq!(slot.target_pid(), 200);

        // init is never a valid delegate
        slot.set_oomable_pid(1);
        assert_eq!(slot.target_pid(), 100);
    }

    #[test]
    fn test_next_link() {
        let slot = WorkerSyncSlot::new();
        assert_eq!(slot.next(), None);
        slot.set_next(Some(3));
        assert_eq!(slot.next(), Some(3));
        slot.set_next(None);
        assert_eq!(slot.next(), None);
    }

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::align_of::<WorkerSyncSlot>(), 64);
        assert_eq!(core::mem::size_of::<WorkerSyncSlot>(), 64);
    }
}
