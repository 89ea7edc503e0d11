//! Interrupt sampler
//!
//! Reads every interrupt class in the capability table around a worker's
//! run. Unreadable sources read as zero: this is an instrument, never a
//! reason to fail a run.

use std::fs::{self, File};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use stressng_core::constants::MAX_INTERRUPTS;
use stressng_core::interrupts::parse_proc_interrupts;
use stressng_core::{
    interrupt_table, CounterSnapshot, DeltaAverage, ExitStatus, InterruptInfo, InterruptSource,
    WorkerStats,
};
use tracing::{debug, error};

use crate::report::{ReportLine, StressorRun};

pub const PROC_INTERRUPTS: &str = "/proc/interrupts";
pub const MSR_DEV_DIR: &str = "/dev/cpu";

#[derive(Debug, Clone)]
pub struct InterruptSampler {
    table: &'static [InterruptInfo],
    proc_path: PathBuf,
    msr_dir: PathBuf,
}

impl Default for InterruptSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptSampler {
    /// Sampler for this architecture's table and the live system files
    pub fn new() -> Self {
        Self::with_paths(interrupt_table(), PROC_INTERRUPTS, MSR_DEV_DIR)
    }

    pub fn with_paths(
        table: &'static [InterruptInfo],
        proc_path: impl Into<PathBuf>,
        msr_dir: impl Into<PathBuf>,
    ) -> Self {
        let table = &table[..table.len().min(MAX_INTERRUPTS)];
        Self { table, proc_path: proc_path.into(), msr_dir: msr_dir.into() }
    }

    #[inline]
    pub fn table(&self) -> &'static [InterruptInfo] {
        self.table
    }

    /// One count per table entry
    pub fn sample_all(&self) -> CounterSnapshot {
        let text = match fs::read_to_string(&self.proc_path) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("{}: {}", self.proc_path.display(), e);
                None
            }
        };

        let counts = self
            .table
            .iter()
            .map(|info| match info.source {
                InterruptSource::ProcInterrupts(label) => {
                    text.as_deref().map_or(0, |t| parse_proc_interrupts(t, label))
                }
                InterruptSource::Msr { register, cpu } => self.read_msr(cpu, register).unwrap_or(0),
            })
            .collect();
        CounterSnapshot { counts }
    }

    fn read_msr(&self, cpu: u32, register: u64) -> Option<u64> {
        let path = self.msr_dir.join(cpu.to_string()).join("msr");
        read_msr_at(&path, register)
            .map_err(|e| debug!("{}: {}", path.display(), e))
            .ok()
    }

    /// Snapshot into `count_start`, with `count_stop` set to match
    pub fn record_start(&self, stats: &WorkerStats) {
        let snapshot = self.sample_all();
        for (idx, slot) in stats.interrupts.iter().enumerate().take(self.table.len()) {
            let count = snapshot.get(idx);
            slot.count_start.store(count, Ordering::Relaxed);
            slot.count_stop.store(count, Ordering::Relaxed);
        }
    }

    pub fn record_stop(&self, stats: &WorkerStats) {
        let snapshot = self.sample_all();
        for (idx, slot) in stats.interrupts.iter().enumerate().take(self.table.len()) {
            slot.count_stop.store(snapshot.get(idx), Ordering::Relaxed);
        }
    }

    /// Fail the instance if a failure-class interrupt fired during its run
    ///
    /// Every instance escalates its own status; only instance 0 reports,
    /// since every instance sees the same system-wide counters. Returns the
    /// messages emitted.
    pub fn check_failures(
        &self,
        name: &str,
        stats: &WorkerStats,
        instance: usize,
        status: &mut ExitStatus,
    ) -> Vec<String> {
        let mut messages = Vec::new();
        for (info, slot) in self.table.iter().zip(stats.interrupts.iter()) {
            if !info.check_failure {
                continue;
            }
            let delta = slot.delta();
            if delta <= 0 {
                continue;
            }
            *status = status.escalate(ExitStatus::Failure);
            if instance == 0 {
                let count = delta as u64;
                let msg = format!("{}: detected {} {}", name, count, info.describe_count(count));
                error!("{}", msg);
                messages.push(msg);
            }
        }
        messages
    }

    /// Average positive deltas per interrupt class, per stressor that ran
    ///
    /// Classes averaging zero are left out.
    pub fn dump_report(&self, runs: &[StressorRun<'_>]) -> Vec<ReportLine> {
        let mut lines = Vec::new();
        for run in runs.iter().filter(|r| r.did_run()) {
            for (idx, info) in self.table.iter().enumerate() {
                let avg = DeltaAverage::from_deltas(run.ran().map(|s| s.interrupts[idx].delta()));
                if avg.average == 0 {
                    continue;
                }
                lines.push(ReportLine {
                    stressor: run.name.to_string(),
                    text: format!("{} {}", avg.average, info.describe_count(avg.average)),
                    yaml_key: info.yaml_key(),
                    yaml_value: avg.average.to_string(),
                });
            }
        }
        lines
    }
}

/// Read one 64-bit MSR through the msr device (needs privilege)
fn read_msr_at(path: &Path, register: u64) -> std::io::Result<u64> {
    let file = File::open(path)?;
    let mut buf = [0u8; 8];
    file.read_exact_at(&mut buf, register)?;
    Ok(u64::from_ne_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    static TABLE: &[InterruptInfo] = &[
        InterruptInfo {
            source: InterruptSource::ProcInterrupts("MCE:"),
            description: "Machine Check Exception",
            check_failure: true,
        },
        InterruptInfo {
            source: InterruptSource::ProcInterrupts("NMI:"),
            description: "Non-Maskable Interrupt",
            check_failure: false,
        },
        InterruptInfo {
            source: InterruptSource::Msr { register: 0x34, cpu: 0 },
            description: "System Management Interrupt",
            check_failure: false,
        },
    ];

    struct Fixture {
        dir: TempDir,
        sampler: InterruptSampler,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let sampler =
                InterruptSampler::with_paths(TABLE, dir.path().join("interrupts"), dir.path().join("cpu"));
            Self { dir, sampler }
        }

        fn write_proc(&self, mce: [u64; 2], nmi: [u64; 2]) {
            let text = format!(
                "           CPU0       CPU1\n NMI: {} {} Non-maskable interrupts\n MCE: {} {} Machine check exceptions\n",
                nmi[0], nmi[1], mce[0], mce[1]
            );
            fs::write(self.dir.path().join("interrupts"), text).unwrap();
        }

        fn write_msr(&self, value: u64) {
            let cpu = self.dir.path().join("cpu").join("0");
            fs::create_dir_all(&cpu).unwrap();
            let mut f = File::create(cpu.join("msr")).unwrap();
            f.write_all(&[0u8; 0x34]).unwrap();
            f.write_all(&value.to_ne_bytes()).unwrap();
        }
    }

    fn set_counts(stats: &WorkerStats, idx: usize, start: u64, stop: u64) {
        stats.interrupts[idx].count_start.store(start, Ordering::Relaxed);
        stats.interrupts[idx].count_stop.store(stop, Ordering::Relaxed);
    }

    #[test]
    fn test_sample_all() {
        let fx = Fixture::new();
        fx.write_proc([2, 1], [10, 20]);
        fx.write_msr(9);
        assert_eq!(fx.sampler.sample_all().counts, vec![3, 30, 9]);
    }

    #[test]
    fn test_missing_sources_read_zero() {
        let fx = Fixture::new();
        assert_eq!(fx.sampler.sample_all().counts, vec![0, 0, 0]);
    }

    #[test]
    fn test_record_start_primes_stop() {
        let fx = Fixture::new();
        fx.write_proc([1, 1], [5, 5]);
        let stats = WorkerStats::new();
        fx.sampler.record_start(&stats);
        assert_eq!(stats.interrupts[0].start(), 2);
        assert_eq!(stats.interrupts[0].delta(), 0);
        assert_eq!(stats.interrupts[1].stop(), 10);

        fx.write_proc([1, 2], [5, 9]);
        fx.sampler.record_stop(&stats);
        assert_eq!(stats.interrupts[0].delta(), 1);
        assert_eq!(stats.interrupts[1].delta(), 4);
    }

    #[test]
    fn test_unchanged_counters_pass() {
        let fx = Fixture::new();
        for instance in 0..2 {
            let stats = WorkerStats::new();
            set_counts(&stats, 0, 100, 100);
            let mut status = ExitStatus::Success;
            let msgs = fx.sampler.check_failures("cpu", &stats, instance, &mut status);
            assert!(msgs.is_empty());
            assert_eq!(status, ExitStatus::Success);
        }
    }

    #[test]
    fn test_machine_check_fails_once() {
        let fx = Fixture::new();
        let stats: Vec<WorkerStats> = (0..2).map(|_| WorkerStats::new()).collect();
        set_counts(&stats[0], 0, 100, 102);
        set_counts(&stats[1], 0, 100, 100);

        let mut status = ExitStatus::Success;
        let mut messages = Vec::new();
        for (instance, s) in stats.iter().enumerate() {
            messages.extend(fx.sampler.check_failures("cpu", s, instance, &mut status));
        }
        assert_eq!(status, ExitStatus::Failure);
        assert_eq!(messages, vec!["cpu: detected 2 Machine Check Exceptions".to_string()]);
    }

    #[test]
    fn test_only_instance_zero_reports() {
        let fx = Fixture::new();
        let stats = WorkerStats::new();
        set_counts(&stats, 0, 100, 101);
        let mut status = ExitStatus::Success;
        assert!(fx.sampler.check_failures("cpu", &stats, 1, &mut status).is_empty());
        assert_eq!(status, ExitStatus::Failure);
    }

    #[test]
    fn test_non_failure_class_ignored() {
        let fx = Fixture::new();
        let stats = WorkerStats::new();
        set_counts(&stats, 1, 0, 50);
        let mut status = ExitStatus::Success;
        assert!(fx.sampler.check_failures("cpu", &stats, 0, &mut status).is_empty());
        assert_eq!(status, ExitStatus::Success);
    }

    #[test]
    fn test_dump_report() {
        let fx = Fixture::new();
        let stats: Vec<WorkerStats> = (0..4).map(|_| WorkerStats::new()).collect();
        for (s, (start, stop)) in stats.iter().zip([(0, 5), (7, 7), (0, 3), (10, 8)]) {
            set_counts(s, 1, start, stop);
            s.finish(ExitStatus::Success, 1);
        }

        let lines = fx.sampler.dump_report(&[StressorRun::new("cpu", &stats)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "4 Non-Maskable Interrupts");
        assert_eq!(lines[0].yaml(), "non-maskable_interrupt: 4");
    }

    #[test]
    fn test_dump_report_skips_idle_stressors() {
        let fx = Fixture::new();
        let stats = [WorkerStats::new()];
        set_counts(&stats[0], 1, 0, 5);
        stats[0].finish(ExitStatus::NotImplemented, 1);
        assert!(fx.sampler.dump_report(&[StressorRun::new("cpu", &stats)]).is_empty());
    }
}
