//! # stressng - stress harness core
//!
//! Runs N forked instances of a stressor so that none of them starts its
//! hot loop before all of them are ready, collects their counters through
//! shared memory, and watches the machine's interrupt and thermal counters
//! while they run.
//!
//! ## Quick Start
//!
//! ```ignore
//! use stressng::{ExitStatus, Runtime, StressConfig, Stressor, WorkerArgs};
//!
//! struct Spin;
//!
//! impl Stressor for Spin {
//!     fn name(&self) -> &str { "spin" }
//!
//!     fn run(&self, args: &WorkerArgs<'_>) -> ExitStatus {
//!         while args.keep_running() {
//!             args.bogo_inc();
//!         }
//!         ExitStatus::Success
//!     }
//! }
//!
//! fn main() {
//!     stressng::init_logging();
//!     let runtime = Runtime::new(StressConfig::from_env().instances(4)).unwrap();
//!     let summary = runtime.run(&[&Spin]);
//!     std::process::exit(summary.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Coordinator                           │
//! │       fork N ─► release_all ─► reap ─► aggregate/report     │
//! └─────────────────────────────────────────────────────────────┘
//!          │ fork               │ SIGCONT             ▲ waitpid
//!          ▼                    ▼                     │
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker 0 │      │  Worker 1 │ ...  │  Worker N │
//!    │ SIGSTOP'd │      │ SIGSTOP'd │      │ SIGSTOP'd │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                Shared Memory Regions                    │
//!    │   sync slots × N, stats blocks × N, keep-running flag   │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use stressng_core::{
    CancellationToken,
    ExitStatus,
    MetricReducer,
    MetricsAggregator,
    NamedMetric,
    StressorMetrics,
    SyncState,
    WorkerStats,
    WorkerSyncSlot,
    ResourceError,
    SignalError,
};

// Re-export env utilities
pub use stressng_core::{env_get, env_get_bool, env_get_opt, env_get_str};

// Re-export runtime types
pub use stressng_runtime::{
    Harness,
    RunContext,
    StressConfig,
    StressError,
    StressResult,
    Stressor,
    StressorReport,
    WorkerArgs,
};
pub use stressng_runtime::logging;
pub use stressng_runtime::logging::init as init_logging;

use stressng_runtime::signal;
use tracing::info;

/// Runs stressor classes one after another with one shared config
pub struct Runtime {
    config: StressConfig,
    harness: Harness,
}

/// Outcome of `Runtime::run`
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<StressorReport>,
    /// Stressor classes that could not be run at all; informational
    pub errors: Vec<StressError>,
}

impl RunSummary {
    /// Classes in `errors` were skipped, not failed; only reports count
    pub fn passed(&self) -> bool {
        self.reports.iter().all(StressorReport::passed)
    }

    /// Worst status across every report
    pub fn status(&self) -> ExitStatus {
        ExitStatus::combine(self.reports.iter().map(|r| r.status))
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            self.status().code()
        }
    }
}

impl Runtime {
    /// Validate the config, map the shared keep-running flag and install
    /// the SIGINT/SIGTERM handler
    pub fn new(config: StressConfig) -> StressResult<Self> {
        signal::install_interrupt_handler()?;
        let harness = Harness::new(&config)?;
        Ok(Self { config, harness })
    }

    pub fn config(&self) -> &StressConfig {
        &self.config
    }

    /// Request every run in progress to stop
    pub fn cancel(&self) {
        self.harness.context().token().cancel();
    }

    /// Run each stressor with `config.instances` instances
    ///
    /// A class whose shared memory cannot be mapped is recorded and skipped;
    /// the rest still run. Stops early once cancelled.
    pub fn run(&self, stressors: &[&dyn Stressor]) -> RunSummary {
        let mut summary = RunSummary::default();
        for stressor in stressors {
            if !self.harness.context().keep_running() {
                info!("run cancelled, skipping {}", stressor.name());
                break;
            }
            match self.harness.run_stressor(*stressor, self.config.instances as usize) {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    info!("skipping {}", e);
                    summary.errors.push(e);
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stressng_core::ResourceError;

    fn report(status: ExitStatus) -> StressorReport {
        StressorReport {
            name: "x".into(),
            instances: 1,
            status,
            metrics: None,
            interrupts: Vec::new(),
            thermal: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_summary_status() {
        let summary = RunSummary {
            reports: vec![report(ExitStatus::Success), report(ExitStatus::NotImplemented)],
            errors: Vec::new(),
        };
        assert!(summary.passed());
        assert_eq!(summary.exit_code(), 0);

        let summary = RunSummary {
            reports: vec![report(ExitStatus::Success), report(ExitStatus::Failure)],
            errors: Vec::new(),
        };
        assert!(!summary.passed());
        assert_eq!(summary.exit_code(), ExitStatus::Failure.code());
    }

    #[test]
    fn test_summary_resource_error_is_informational() {
        let summary = RunSummary {
            reports: vec![report(ExitStatus::Success)],
            errors: vec![StressError::Resource {
                stressor: "x".into(),
                source: ResourceError::Empty,
            }],
        };
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.passed());
        assert_eq!(summary.status(), ExitStatus::Success);
        assert_eq!(summary.exit_code(), 0);

        let summary = RunSummary {
            reports: vec![report(ExitStatus::Failure)],
            errors: vec![StressError::NoInstances("x".into())],
        };
        assert_eq!(summary.exit_code(), ExitStatus::Failure.code());
    }

    struct Never;

    impl Stressor for Never {
        fn name(&self) -> &str {
            "never"
        }

        fn run(&self, _: &WorkerArgs<'_>) -> ExitStatus {
            ExitStatus::Failure
        }
    }

    #[test]
    fn test_cancelled_runtime_runs_nothing() {
        let runtime = Runtime::new(StressConfig::new().max_ops(1)).unwrap();
        runtime.cancel();
        let summary = runtime.run(&[&Never]);
        assert!(summary.reports.is_empty());
        assert!(summary.passed());
    }
}
