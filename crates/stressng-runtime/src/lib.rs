//! # stressng-runtime
//!
//! Unix runtime for the stress harness.
//!
//! This crate provides:
//! - Shared memory regions (anonymous `MAP_SHARED` mmap) inherited by forked workers
//! - Process control (SIGSTOP/SIGCONT) and a condvar-backed stand-in for threads
//! - The synchronized start barrier
//! - Interrupt and thermal zone sampling
//! - The fork/release/reap harness that runs a stressor's instances

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod memory;
pub mod signal;
pub mod parking;
pub mod sync;
pub mod interrupts;
pub mod thermal;
pub mod report;
pub mod worker;
pub mod harness;

// Re-exports
pub use config::{Budget, ConfigError, RunFlags, StressConfig};
pub use context::RunContext;
pub use error::{StressError, StressResult};
pub use memory::SharedRegion;
pub use signal::SignalControl;
pub use parking::ParkingControl;
pub use sync::{init_slot, park_self, release_all, release_all_until, resume_one, BarrierOutcome, SyncList};
pub use interrupts::InterruptSampler;
pub use thermal::ThermalSampler;
pub use report::{ReportLine, StressorReport, StressorRun};
pub use worker::{Stressor, WorkerArgs};
pub use harness::Harness;

cfg_if::cfg_if! {
    if #[cfg(not(unix))] {
        compile_error!("Unsupported platform: fork and SIGSTOP/SIGCONT are required");
    }
}
