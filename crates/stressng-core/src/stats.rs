//! Per-worker statistics block
//!
//! One `WorkerStats` per worker, in a shared array mapped before fork. The
//! worker owns its block while running; the coordinator reads it after the
//! worker has been reaped (and may peek at `counter` while it runs).

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use crate::constants::{MAX_INTERRUPTS, MAX_METRICS, MAX_THERMAL_ZONES, METRIC_NAME_LEN};
use crate::exit::ExitStatus;
use crate::metrics::MetricReducer;
use crate::shared::SharedZeroed;

/// Start/stop reading of one interrupt class
#[repr(C)]
#[derive(Default)]
pub struct InterruptCount {
    pub count_start: AtomicU64,
    pub count_stop: AtomicU64,
}

impl InterruptCount {
    pub fn start(&self) -> u64 {
        self.count_start.load(Ordering::Relaxed)
    }

    pub fn stop(&self) -> u64 {
        self.count_stop.load(Ordering::Relaxed)
    }

    /// Signed stop - start, saturating at the i64 range
    ///
    /// Negative when the counter went backwards (wrap or reset).
    pub fn delta(&self) -> i64 {
        signed_delta(self.start(), self.stop())
    }
}

/// Start/stop temperature of one thermal zone, in millidegrees C (0 = no reading)
#[repr(C)]
#[derive(Default)]
pub struct ThermalStat {
    pub temp_start: AtomicU64,
    pub temp_stop: AtomicU64,
}

impl ThermalStat {
    pub fn start(&self) -> u64 {
        self.temp_start.load(Ordering::Relaxed)
    }

    pub fn stop(&self) -> u64 {
        self.temp_stop.load(Ordering::Relaxed)
    }
}

/// One named metric a worker reports
///
/// The name is stored inline (NUL padded, truncated at a char boundary)
/// since pointers mean nothing across processes.
#[repr(C)]
pub struct MetricSlot {
    set: AtomicBool,
    reducer: AtomicU8,
    value: AtomicU64,
    name: [AtomicU8; METRIC_NAME_LEN],
}

impl MetricSlot {
    pub fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            reducer: AtomicU8::new(0),
            value: AtomicU64::new(0),
            name: core::array::from_fn(|_| AtomicU8::new(0)),
        }
    }

    pub fn set(&self, name: &str, value: f64, reducer: MetricReducer) {
        let mut len = name.len().min(METRIC_NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let bytes = &name.as_bytes()[..len];
        for (i, cell) in self.name.iter().enumerate() {
            cell.store(bytes.get(i).copied().unwrap_or(0), Ordering::Relaxed);
        }
        self.value.store(value.to_bits(), Ordering::Relaxed);
        self.reducer.store(reducer as u8, Ordering::Relaxed);
        self.set.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }

    pub fn reducer(&self) -> MetricReducer {
        MetricReducer::from(self.reducer.load(Ordering::Relaxed))
    }

    pub fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .name
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .take_while(|&b| b != 0)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for MetricSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics block for one worker instance
#[repr(C, align(64))]
pub struct WorkerStats {
    /// Bogo-op counter
    pub counter: AtomicU64,
    /// Set once the worker finished and `counter` is final
    pub counter_ready: AtomicBool,
    /// Worker was skipped (unsupported / no resource); excluded from aggregation
    pub ignore_run: AtomicBool,
    /// Worker reported success
    pub run_ok: AtomicBool,
    /// ExitStatus code the worker returned
    pub exit_status: AtomicU8,
    /// Wall time of the stressor body, nanoseconds
    pub duration_ns: AtomicU64,
    pub interrupts: [InterruptCount; MAX_INTERRUPTS],
    pub thermal: [ThermalStat; MAX_THERMAL_ZONES],
    pub metrics: [MetricSlot; MAX_METRICS],
}

// Safety: atomics only; all-zero is an empty, not-ready block.
unsafe impl SharedZeroed for WorkerStats {}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            counter_ready: AtomicBool::new(false),
            ignore_run: AtomicBool::new(false),
            run_ok: AtomicBool::new(false),
            exit_status: AtomicU8::new(0),
            duration_ns: AtomicU64::new(0),
            interrupts: core::array::from_fn(|_| InterruptCount::default()),
            thermal: core::array::from_fn(|_| ThermalStat::default()),
            metrics: core::array::from_fn(|_| MetricSlot::new()),
        }
    }

    #[inline]
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.ignore_run.load(Ordering::Acquire)
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.duration_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::from_code(self.exit_status.load(Ordering::Acquire) as i32)
    }

    /// Record the worker's final outcome
    ///
    /// Skipped statuses mark the block ignored so reducers leave it out.
    pub fn finish(&self, status: ExitStatus, duration_ns: u64) {
        self.duration_ns.store(duration_ns, Ordering::Relaxed);
        self.exit_status.store(status.code() as u8, Ordering::Relaxed);
        self.run_ok.store(status == ExitStatus::Success, Ordering::Relaxed);
        self.ignore_run.store(status.is_skipped(), Ordering::Relaxed);
        self.counter_ready.store(true, Ordering::Release);
    }
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed `stop - start` for unsigned counters, saturating at the i64 range
pub fn signed_delta(start: u64, stop: u64) -> i64 {
    if stop >= start {
        i64::try_from(stop - start).unwrap_or(i64::MAX)
    } else {
        i64::try_from(start - stop).map(|d| -d).unwrap_or(i64::MIN + 1)
    }
}
