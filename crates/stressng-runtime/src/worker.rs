//! Worker side of a run
//!
//! Everything that happens inside a forked worker process: register the
//! pid, wait at the start line, sample the environment, run the stressor
//! body, record the outcome in the shared stats block.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::time::Instant;
use stressng_core::constants::MAX_METRICS;
use stressng_core::{ExitStatus, MetricReducer, SyncState, WorkerStats, WorkerSyncSlot};
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::interrupts::InterruptSampler;
use crate::signal;
use crate::sync;
use crate::thermal::ThermalSampler;

const DEFAULT_PAGE_SIZE: usize = 4096;

/// A workload the harness can run N instances of
pub trait Stressor: Send + Sync {
    fn name(&self) -> &str;

    /// Run until `args.keep_running()` goes false
    ///
    /// Return `NotImplemented` or `NoResource` to have the instance skipped.
    fn run(&self, args: &WorkerArgs<'_>) -> ExitStatus;
}

/// What a stressor body gets to see
pub struct WorkerArgs<'a> {
    name: &'a str,
    instance: usize,
    num_instances: usize,
    page_size: usize,
    ctx: &'a RunContext,
    slot: &'a WorkerSyncSlot,
    stats: &'a WorkerStats,
}

impl<'a> WorkerArgs<'a> {
    pub fn new(
        name: &'a str,
        instance: usize,
        num_instances: usize,
        ctx: &'a RunContext,
        slot: &'a WorkerSyncSlot,
        stats: &'a WorkerStats,
    ) -> Self {
        Self { name, instance, num_instances, page_size: page_size(), ctx, slot, stats }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Zero-based instance index
    #[inline]
    pub fn instance(&self) -> usize {
        self.instance
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Hot-loop predicate
    ///
    /// False once the run is cancelled, the run timeout fires, or the
    /// op budget is spent.
    #[inline]
    pub fn keep_running(&self) -> bool {
        if signal::alarm_fired() || !self.ctx.keep_running() {
            return false;
        }
        let max_ops = self.ctx.budget().max_ops;
        max_ops == 0 || self.bogo_get() < max_ops
    }

    /// Count one completed unit of work
    #[inline]
    pub fn bogo_inc(&self) {
        self.stats.counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn bogo_add(&self, n: u64) {
        self.stats.counter.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn bogo_get(&self) -> u64 {
        self.stats.counter()
    }

    /// Report a named metric in slot `idx` (< `MAX_METRICS`)
    pub fn metrics_set(&self, idx: usize, name: &str, value: f64, reducer: MetricReducer) {
        match self.stats.metrics.get(idx) {
            Some(slot) => slot.set(name, value, reducer),
            None => debug!("{}: metric index {} out of range (max {})", self.name, idx, MAX_METRICS),
        }
    }

    /// Register a delegate child; stop/continue goes to it from now on
    pub fn set_oomable_child(&self, pid: i32) {
        self.slot.set_oomable_pid(pid);
    }
}

/// Page size of the running system
pub fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as usize
    } else {
        DEFAULT_PAGE_SIZE
    }
}

/// Samplers a worker runs around its stressor body
#[derive(Clone, Copy)]
pub struct Samplers<'a> {
    pub interrupts: Option<&'a InterruptSampler>,
    pub thermal: Option<&'a ThermalSampler>,
}

/// Full worker lifecycle; returns the status to exit with
///
/// Runs in the forked process. The slot and stats block belong to this
/// instance alone.
pub fn run_worker(
    ctx: &RunContext,
    stressor: &dyn Stressor,
    instance: usize,
    num_instances: usize,
    slot: &WorkerSyncSlot,
    stats: &WorkerStats,
    samplers: Samplers<'_>,
) -> ExitStatus {
    slot.set_pid(std::process::id() as i32);
    if let Err(e) = signal::install_alarm_handler() {
        info!("{}: cannot install run timeout handler: {}", stressor.name(), e);
    }

    if !sync::park_self(ctx, slot) {
        slot.set_state(SyncState::Running);
        signal::arm_alarm(ctx.budget().timeout);
    }

    if let Some(s) = samplers.interrupts {
        s.record_start(stats);
    }
    if let Some(s) = samplers.thermal {
        s.record_start(stats);
    }

    let args = WorkerArgs::new(stressor.name(), instance, num_instances, ctx, slot, stats);
    let t0 = Instant::now();
    let status = panic::catch_unwind(AssertUnwindSafe(|| stressor.run(&args))).unwrap_or_else(|_| {
        warn!("{}: instance {} panicked", stressor.name(), instance);
        ExitStatus::BySysExit
    });
    let elapsed = t0.elapsed();

    if let Some(s) = samplers.interrupts {
        s.record_stop(stats);
    }
    if let Some(s) = samplers.thermal {
        s.record_stop(stats);
    }

    slot.set_state(SyncState::Finished);
    stats.finish(status, elapsed.as_nanos().min(u64::MAX as u128) as u64);
    debug!(
        "{}: instance {} finished: {} after {} bogo ops",
        stressor.name(),
        instance,
        status,
        stats.counter()
    );
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StressConfig;
    use crate::parking::ParkingControl;
    use std::sync::Arc;
    use stressng_core::CancellationToken;

    struct Counter;

    impl Stressor for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn run(&self, args: &WorkerArgs<'_>) -> ExitStatus {
            while args.keep_running() {
                args.bogo_inc();
            }
            args.metrics_set(0, "loops", args.bogo_get() as f64, MetricReducer::Sum);
            args.metrics_set(MAX_METRICS, "dropped", 1.0, MetricReducer::Sum);
            ExitStatus::Success
        }
    }

    struct Unsupported;

    impl Stressor for Unsupported {
        fn name(&self) -> &str {
            "unsupported"
        }

        fn run(&self, _: &WorkerArgs<'_>) -> ExitStatus {
            ExitStatus::NotImplemented
        }
    }

    struct Panics;

    impl Stressor for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn run(&self, _: &WorkerArgs<'_>) -> ExitStatus {
            panic!("boom");
        }
    }

    fn ctx(max_ops: u64) -> RunContext {
        let config = StressConfig::new().sync_start(false).timeout(None).max_ops(max_ops);
        RunContext::with_control(&config, CancellationToken::new(), Arc::new(ParkingControl::new()))
    }

    fn none() -> Samplers<'static> {
        Samplers { interrupts: None, thermal: None }
    }

    #[test]
    fn test_runs_to_op_budget() {
        let ctx = ctx(500);
        let slot = WorkerSyncSlot::new();
        let stats = WorkerStats::new();

        let status = run_worker(&ctx, &Counter, 0, 1, &slot, &stats, none());
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(stats.counter(), 500);
        assert_eq!(slot.state(), SyncState::Finished);
        assert_eq!(slot.pid(), std::process::id() as i32);
        assert!(stats.counter_ready.load(Ordering::Acquire));
        assert_eq!(stats.metrics[0].name(), "loops");
        assert_eq!(stats.metrics[0].value(), 500.0);
    }

    #[test]
    fn test_cancelled_token_stops_immediately() {
        let ctx = ctx(0).with_token(CancellationToken::new());
        ctx.token().cancel();
        let slot = WorkerSyncSlot::new();
        let stats = WorkerStats::new();

        assert_eq!(run_worker(&ctx, &Counter, 0, 1, &slot, &stats, none()), ExitStatus::Success);
        assert_eq!(stats.counter(), 0);
    }

    #[test]
    fn test_skipped_instance_is_ignored() {
        let ctx = ctx(1);
        let slot = WorkerSyncSlot::new();
        let stats = WorkerStats::new();

        let status = run_worker(&ctx, &Unsupported, 0, 1, &slot, &stats, none());
        assert_eq!(status, ExitStatus::NotImplemented);
        assert!(stats.is_ignored());
    }

    #[test]
    fn test_panic_becomes_status() {
        let ctx = ctx(1);
        let slot = WorkerSyncSlot::new();
        let stats = WorkerStats::new();

        let status = run_worker(&ctx, &Panics, 0, 1, &slot, &stats, none());
        assert_eq!(status, ExitStatus::BySysExit);
        assert_eq!(slot.state(), SyncState::Finished);
    }

    #[test]
    fn test_args_accessors() {
        let ctx = ctx(1);
        let slot = WorkerSyncSlot::new();
        let stats = WorkerStats::new();
        let args = WorkerArgs::new("cpu", 2, 4, &ctx, &slot, &stats);
        assert_eq!(args.name(), "cpu");
        assert_eq!(args.instance(), 2);
        assert_eq!(args.num_instances(), 4);
        assert!(args.page_size().is_power_of_two());

        args.set_oomable_child(4321);
        assert_eq!(slot.target_pid(), 4321);

        args.bogo_add(3);
        assert_eq!(args.bogo_get(), 3);
        assert!(!args.keep_running());
    }
}
