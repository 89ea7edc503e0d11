//! Worker sync state and its storage strategies
//!
//! The `state` byte of a sync slot is the only field two processes touch
//! concurrently: the worker stores it, the coordinator polls it. Two storage
//! strategies share one interface:
//!
//! - [`AtomicStateCell`] - `AtomicU8` with acquire/release ordering
//! - [`VolatileStateCell`] - plain byte with volatile read/write, for targets
//!   without byte atomics. A stale read costs the poller one more poll cycle;
//!   a single aligned byte cannot tear.
//!
//! [`StateCell`] names whichever one the build selected.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Synchronized-start state of a worker
///
/// Values are stable: zero-filled shared memory reads as `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncState {
    /// Parked (or about to park) at the start line
    Waiting = 0,

    /// Slot initialized, worker not yet at the start line
    Started = 1,

    /// Resumed and running its stressor body
    Running = 2,

    /// Stressor body returned
    Finished = 3,
}

impl SyncState {
    /// Check if the worker has passed the start line (or never needs to)
    #[inline]
    pub const fn is_released(&self) -> bool {
        matches!(self, SyncState::Running | SyncState::Finished)
    }

    /// Check if the barrier may count this worker as ready
    #[inline]
    pub const fn is_ready(&self) -> bool {
        matches!(self, SyncState::Waiting | SyncState::Finished)
    }
}

impl From<u8> for SyncState {
    fn from(v: u8) -> Self {
        match v {
            0 => SyncState::Waiting,
            1 => SyncState::Started,
            2 => SyncState::Running,
            3 => SyncState::Finished,
            _ => SyncState::Started, // Unknown: treat as not yet at the start line
        }
    }
}

impl From<SyncState> for u8 {
    fn from(state: SyncState) -> u8 {
        state as u8
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Waiting => write!(f, "WAITING"),
            SyncState::Started => write!(f, "STARTED"),
            SyncState::Running => write!(f, "RUNNING"),
            SyncState::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Load/store interface shared by both state storage strategies
pub trait StateStore: Send + Sync {
    fn load(&self) -> SyncState;
    fn store(&self, state: SyncState);
}

/// Byte-atomic state storage
#[repr(transparent)]
pub struct AtomicStateCell(AtomicU8);

impl AtomicStateCell {
    pub const fn new(state: SyncState) -> Self {
        Self(AtomicU8::new(state as u8))
    }
}

impl StateStore for AtomicStateCell {
    #[inline]
    fn load(&self) -> SyncState {
        SyncState::from(self.0.load(Ordering::Acquire))
    }

    #[inline]
    fn store(&self, state: SyncState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Volatile plain-byte state storage
#[repr(transparent)]
pub struct VolatileStateCell(UnsafeCell<u8>);

// Safety: one byte, written by a single process and polled by another.
// Volatile access keeps the compiler from caching it; the hardware never
// tears an aligned byte.
unsafe impl Send for VolatileStateCell {}
unsafe impl Sync for VolatileStateCell {}

impl VolatileStateCell {
    pub const fn new(state: SyncState) -> Self {
        Self(UnsafeCell::new(state as u8))
    }
}

impl StateStore for VolatileStateCell {
    #[inline]
    fn load(&self) -> SyncState {
        SyncState::from(unsafe { core::ptr::read_volatile(self.0.get()) })
    }

    #[inline]
    fn store(&self, state: SyncState) {
        unsafe { core::ptr::write_volatile(self.0.get(), state as u8) }
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_has_atomic = "8", not(feature = "plain-state")))] {
        /// State storage selected for this build
        pub type StateCell = AtomicStateCell;
    } else {
        /// State storage selected for this build
        pub type StateCell = VolatileStateCell;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SyncState; 4] = [
        SyncState::Waiting,
        SyncState::Started,
        SyncState::Running,
        SyncState::Finished,
    ];

    #[test]
    fn test_zero_is_waiting() {
        assert_eq!(SyncState::from(0u8), SyncState::Waiting);
        assert_eq!(SyncState::from(200u8), SyncState::Started);
    }

    #[test]
    fn test_atomic_round_trip() {
        let cell = AtomicStateCell::new(SyncState::Started);
        for state in ALL {
            cell.store(state);
            assert_eq!(cell.load(), state);
        }
    }

    #[test]
    fn test_volatile_matches_atomic() {
        let atomic = AtomicStateCell::new(SyncState::Started);
        let plain = VolatileStateCell::new(SyncState::Started);
        assert_eq!(atomic.load(), plain.load());
        for state in ALL {
            atomic.store(state);
            plain.store(state);
            assert_eq!(plain.load(), state);
            assert_eq!(atomic.load(), plain.load());
        }
    }

    #[test]
    fn test_state_predicates() {
        assert!(SyncState::Running.is_released());
        assert!(SyncState::Finished.is_released());
        assert!(!SyncState::Waiting.is_released());

        assert!(SyncState::Waiting.is_ready());
        assert!(SyncState::Finished.is_ready());
        assert!(!SyncState::Started.is_ready());
        assert!(!SyncState::Running.is_ready());
    }

    #[test]
    fn test_cell_is_one_byte() {
        assert_eq!(core::mem::size_of::<StateCell>(), 1);
        assert_eq!(core::mem::size_of::<VolatileStateCell>(), 1);
    }
}
