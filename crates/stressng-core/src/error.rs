//! Error types shared by the harness crates

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, ResourceError>;

/// Shared memory could not be set up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// mmap failed (out of memory or mapping limit reached)
    #[error("failed to map {bytes} bytes of shared memory: errno {errno}")]
    MapFailed { bytes: usize, errno: i32 },

    /// Requested element count overflows the mapping size
    #[error("too many slots requested: {0}")]
    TooManySlots(usize),

    /// Zero-sized regions cannot be mapped
    #[error("shared region must hold at least one element")]
    Empty,
}

/// A stop/continue/kill could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot send {signal} to pid {pid}: errno {errno}")]
pub struct SignalError {
    pub pid: i32,
    pub signal: &'static str,
    pub errno: i32,
}
