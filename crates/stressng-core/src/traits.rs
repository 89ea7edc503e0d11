//! Process control seam
//!
//! The barrier never calls `kill` itself; it goes through `ProcessControl`.
//! On Unix that is SIGSTOP/SIGCONT (the OS suspends the process, no CPU
//! burn while parked). Targets without those signals, and tests that model
//! workers as threads, plug in a blocking primitive instead.

use crate::error::SignalError;

pub trait ProcessControl: Send + Sync {
    /// Suspend `pid`
    ///
    /// When `pid` is the caller, this returns only after someone calls
    /// `resume(pid)`.
    fn suspend(&self, pid: i32) -> Result<(), SignalError>;

    /// Resume `pid`; a no-op if it is not suspended
    fn resume(&self, pid: i32) -> Result<(), SignalError>;

    /// Forcibly terminate `pid`
    fn kill(&self, pid: i32) -> Result<(), SignalError>;

    /// Whether `pid` can still reach the start line
    ///
    /// An exited but unreaped child counts as gone. Implementations that
    /// cannot tell answer `true`.
    fn is_alive(&self, _pid: i32) -> bool {
        true
    }
}
