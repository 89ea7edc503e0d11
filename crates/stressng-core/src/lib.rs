//! # stressng-core
//!
//! Core types for the stress harness: the pieces that forked workers and the
//! coordinator process share.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! All platform-specific implementations are in `stressng-runtime`.
//!
//! ## Modules
//!
//! - `state` - Worker sync state enum and the `StateCell` storage strategies
//! - `slot` - Per-worker sync slot layout (repr(C), lives in shared memory)
//! - `stats` - Per-worker statistics block (counters, interrupt/thermal readings, metrics)
//! - `shared` - Marker trait for types that may live in zero-filled shared memory
//! - `interrupts` - Interrupt capability table and delta aggregation
//! - `thermal` - Thermal zone model and deterministic ordering
//! - `metrics` - Metric reducers and per-stressor aggregation
//! - `exit` - Worker exit status taxonomy
//! - `cancel` - Cancellation token (process-local or shared-memory backed)
//! - `traits` - Process control seam (suspend/resume)
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod state;
pub mod slot;
pub mod stats;
pub mod shared;
pub mod interrupts;
pub mod thermal;
pub mod metrics;
pub mod exit;
pub mod cancel;
pub mod traits;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use state::{SyncState, StateCell, StateStore, AtomicStateCell, VolatileStateCell};
pub use slot::WorkerSyncSlot;
pub use stats::{WorkerStats, InterruptCount, ThermalStat, MetricSlot};
pub use shared::SharedZeroed;
pub use interrupts::{InterruptInfo, InterruptSource, CounterSnapshot, DeltaAverage, interrupt_table};
pub use thermal::{ThermalZone, order_zones};
pub use metrics::{MetricReducer, MetricsAggregator, NamedMetric, StressorMetrics, reduce};
pub use exit::ExitStatus;
pub use cancel::{CancellationToken, SharedFlag};
pub use traits::ProcessControl;
pub use error::{CoreResult, ResourceError, SignalError};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};

/// Constants for shared layout sizing
pub mod constants {
    /// Maximum interrupt classes tracked per worker
    pub const MAX_INTERRUPTS: usize = 16;

    /// Maximum thermal zones tracked per worker
    pub const MAX_THERMAL_ZONES: usize = 31;

    /// Maximum named metrics per worker
    pub const MAX_METRICS: usize = 8;

    /// Bytes reserved for a metric name (NUL padded)
    pub const METRIC_NAME_LEN: usize = 40;

    /// No slot sentinel value (end of the sync list)
    pub const SLOT_NONE: u32 = u32::MAX;

    /// Unknown pid sentinel
    pub const PID_NONE: i32 = -1;

    /// Readings above this (millidegrees C) are sensor noise, not temperatures
    pub const THERMAL_BOGUS_MILLI_C: u64 = 250_000;

    /// Cache line size for alignment
    pub const CACHE_LINE_SIZE: usize = 64;
}
