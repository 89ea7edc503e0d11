//! Report data handed back to the caller
//!
//! The harness does not print anything itself beyond log events. Each
//! report line carries a human-readable rendering and a YAML key/value so
//! the caller can emit either.

use std::fmt;
use stressng_core::{ExitStatus, StressorMetrics, WorkerStats};

/// The stats blocks of one stressor class, as the samplers see them
#[derive(Clone, Copy)]
pub struct StressorRun<'a> {
    pub name: &'a str,
    pub stats: &'a [WorkerStats],
}

impl<'a> StressorRun<'a> {
    pub fn new(name: &'a str, stats: &'a [WorkerStats]) -> Self {
        Self { name, stats }
    }

    /// Instances that were not skipped
    pub fn ran(&self) -> impl Iterator<Item = &'a WorkerStats> + 'a {
        self.stats.iter().filter(|s| !s.is_ignored())
    }

    /// At least one instance was not skipped
    pub fn did_run(&self) -> bool {
        self.ran().next().is_some()
    }
}

/// One line of the environmental report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub stressor: String,
    pub text: String,
    pub yaml_key: String,
    pub yaml_value: String,
}

impl ReportLine {
    /// `key: value`, ready to indent under the stressor's YAML section
    pub fn yaml(&self) -> String {
        format!("{}: {}", self.yaml_key, self.yaml_value)
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stressor, self.text)
    }
}

/// Everything one `run_stressor` call produced
#[derive(Debug, Clone)]
pub struct StressorReport {
    pub name: String,
    /// Instances requested
    pub instances: usize,
    /// Worst status across instances that ran
    pub status: ExitStatus,
    /// `None` when every instance was skipped
    pub metrics: Option<StressorMetrics>,
    pub interrupts: Vec<ReportLine>,
    pub thermal: Vec<ReportLine>,
    /// Environmental anomaly messages
    pub failures: Vec<String>,
}

impl StressorReport {
    #[inline]
    pub fn passed(&self) -> bool {
        matches!(
            self.status,
            ExitStatus::Success | ExitStatus::NoResource | ExitStatus::NotImplemented
        )
    }

    /// Human-readable summary, one line per entry
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        match &self.metrics {
            Some(m) => {
                out.push(format!(
                    "{}: {} instances, {} bogo ops in {:.2}s, {:.2} bogo ops/s ({:.2} per instance)",
                    self.name,
                    m.instances,
                    m.bogo_ops,
                    m.wall_time,
                    m.bogo_ops_per_sec,
                    m.bogo_ops_per_sec_per_instance,
                ));
                for metric in &m.named {
                    out.push(format!(
                        "{}: {:.2} {} ({})",
                        self.name, metric.value, metric.name, metric.reducer
                    ));
                }
            }
            None => out.push(format!("{}: skipped", self.name)),
        }
        out.extend(self.interrupts.iter().map(ToString::to_string));
        out.extend(self.thermal.iter().map(ToString::to_string));
        out.push(format!("{}: {}", self.name, self.status));
        out
    }

    /// YAML-subset rendering of the metrics and environmental readings
    pub fn yaml(&self) -> String {
        let mut out = format!("  - stressor: {}\n", self.name);
        out.push_str(&format!("    status: {}\n", self.status.code()));
        if let Some(m) = &self.metrics {
            out.push_str(&format!("    bogo-ops: {}\n", m.bogo_ops));
            out.push_str(&format!("    wall-clock-time: {:.6}\n", m.wall_time));
            out.push_str(&format!("    bogo-ops-per-second-real-time: {:.6}\n", m.bogo_ops_per_sec));
            for metric in &m.named {
                out.push_str(&format!(
                    "    {}: {:.6}\n",
                    metric.name.to_lowercase().replace(' ', "-"),
                    metric.value
                ));
            }
        }
        for line in self.interrupts.iter().chain(&self.thermal) {
            out.push_str(&format!("    {}\n", line.yaml()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use stressng_core::MetricsAggregator;

    fn report(status: ExitStatus) -> StressorReport {
        let stats = [WorkerStats::new()];
        stats[0].counter.store(50, Ordering::Relaxed);
        stats[0].finish(status, 2_000_000_000);
        StressorReport {
            name: "cpu".into(),
            instances: 1,
            status,
            metrics: MetricsAggregator::summarize(&stats),
            interrupts: vec![ReportLine {
                stressor: "cpu".into(),
                text: "3 Non-Maskable Interrupts".into(),
                yaml_key: "non-maskable_interrupt".into(),
                yaml_value: "3".into(),
            }],
            thermal: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_passed() {
        assert!(report(ExitStatus::Success).passed());
        assert!(report(ExitStatus::NotImplemented).passed());
        assert!(!report(ExitStatus::Failure).passed());
    }

    #[test]
    fn test_lines() {
        let lines = report(ExitStatus::Success).lines();
        assert!(lines[0].starts_with("cpu: 1 instances, 50 bogo ops in 2.00s, 25.00 bogo ops/s"));
        assert_eq!(lines[1], "cpu: 3 Non-Maskable Interrupts");
        assert_eq!(lines.last().map(String::as_str), Some("cpu: passed"));

        let skipped = report(ExitStatus::NoResource).lines();
        assert_eq!(skipped[0], "cpu: skipped");
    }

    #[test]
    fn test_yaml() {
        let yaml = report(ExitStatus::Success).yaml();
        assert!(yaml.starts_with("  - stressor: cpu\n    status: 0\n"));
        assert!(yaml.contains("    bogo-ops: 50\n"));
        assert!(yaml.contains("    non-maskable_interrupt: 3\n"));
    }

    #[test]
    fn test_stressor_run_filters_skipped() {
        let stats = [WorkerStats::new(), WorkerStats::new()];
        stats[0].finish(ExitStatus::NotImplemented, 0);
        let run = StressorRun::new("x", &stats);
        assert_eq!(run.ran().count(), 1);
        assert!(run.did_run());

        stats[1].finish(ExitStatus::NoResource, 0);
        assert!(!run.did_run());
    }
}
