//! Metric reducers and per-stressor aggregation
//!
//! Every worker of a stressor class fills an identically shaped stats block.
//! `MetricsAggregator` folds them into one view: counts are summed, rates
//! use the harmonic mean, multiplicative quantities the geometric mean.
//! Skipped instances (`ignore_run`) are left out; a class where every
//! instance was skipped yields `None` rather than zeros.

use core::fmt;
use crate::constants::MAX_METRICS;
use crate::stats::WorkerStats;

/// How per-instance values of one metric combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MetricReducer {
    Sum = 0,
    Average = 1,
    GeometricMean = 2,
    HarmonicMean = 3,
}

impl From<u8> for MetricReducer {
    fn from(v: u8) -> Self {
        match v {
            0 => MetricReducer::Sum,
            1 => MetricReducer::Average,
            2 => MetricReducer::GeometricMean,
            3 => MetricReducer::HarmonicMean,
            _ => MetricReducer::Sum,
        }
    }
}

impl fmt::Display for MetricReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricReducer::Sum => write!(f, "sum"),
            MetricReducer::Average => write!(f, "mean"),
            MetricReducer::GeometricMean => write!(f, "geometric mean"),
            MetricReducer::HarmonicMean => write!(f, "harmonic mean"),
        }
    }
}

/// Reduce a set of values
///
/// Geometric and harmonic means are only defined over positive values;
/// non-positive entries are skipped. Returns `None` when nothing is left.
pub fn reduce(values: &[f64], reducer: MetricReducer) -> Option<f64> {
    match reducer {
        MetricReducer::Sum => (!values.is_empty()).then(|| values.iter().sum()),
        MetricReducer::Average => {
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        }
        MetricReducer::GeometricMean => {
            let logs: Vec<f64> = values.iter().filter(|v| **v > 0.0).map(|v| v.ln()).collect();
            (!logs.is_empty()).then(|| (logs.iter().sum::<f64>() / logs.len() as f64).exp())
        }
        MetricReducer::HarmonicMean => {
            let inv: Vec<f64> = values.iter().filter(|v| **v > 0.0).map(|v| 1.0 / v).collect();
            (!inv.is_empty()).then(|| inv.len() as f64 / inv.iter().sum::<f64>())
        }
    }
}

/// A named per-worker metric after reduction
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMetric {
    pub index: usize,
    pub name: String,
    pub value: f64,
    pub reducer: MetricReducer,
}

/// Reduced view of one stressor class
#[derive(Debug, Clone, PartialEq)]
pub struct StressorMetrics {
    /// Instances that ran (not skipped)
    pub instances: usize,
    /// Total bogo ops across instances
    pub bogo_ops: u64,
    /// Mean wall time per instance, seconds
    pub wall_time: f64,
    /// Total bogo ops over mean wall time
    pub bogo_ops_per_sec: f64,
    /// Harmonic mean of per-instance bogo-op rates
    pub bogo_ops_per_sec_per_instance: f64,
    pub named: Vec<NamedMetric>,
}

pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Reduce one field across the instances that ran
    pub fn reduce_across_instances<F>(
        stats: &[WorkerStats],
        field: F,
        reducer: MetricReducer,
    ) -> Option<f64>
    where
        F: Fn(&WorkerStats) -> f64,
    {
        let values: Vec<f64> = stats.iter().filter(|s| !s.is_ignored()).map(field).collect();
        reduce(&values, reducer)
    }

    /// Full per-class summary, `None` when every instance was skipped
    pub fn summarize(stats: &[WorkerStats]) -> Option<StressorMetrics> {
        let ran: Vec<&WorkerStats> = stats.iter().filter(|s| !s.is_ignored()).collect();
        if ran.is_empty() {
            return None;
        }

        let bogo_ops = ran.iter().map(|s| s.counter()).fold(0u64, u64::saturating_add);
        let wall_time =
            Self::reduce_across_instances(stats, WorkerStats::duration_secs, MetricReducer::Average)
                .unwrap_or(0.0);
        let bogo_ops_per_sec = if wall_time > 0.0 { bogo_ops as f64 / wall_time } else { 0.0 };
        let bogo_ops_per_sec_per_instance = Self::reduce_across_instances(
            stats,
            |s| {
                let secs = s.duration_secs();
                if secs > 0.0 { s.counter() as f64 / secs } else { 0.0 }
            },
            MetricReducer::HarmonicMean,
        )
        .unwrap_or(0.0);

        Some(StressorMetrics {
            instances: ran.len(),
            bogo_ops,
            wall_time,
            bogo_ops_per_sec,
            bogo_ops_per_sec_per_instance,
            named: Self::named_metrics(&ran),
        })
    }

    fn named_metrics(ran: &[&WorkerStats]) -> Vec<NamedMetric> {
        (0..MAX_METRICS)
            .filter_map(|index| {
                let slots: Vec<_> = ran
                    .iter()
                    .map(|s| &s.metrics[index])
                    .filter(|m| m.is_set())
                    .collect();
                let first = slots.first()?;
                let reducer = first.reducer();
                let values: Vec<f64> = slots.iter().map(|m| m.value()).collect();
                Some(NamedMetric {
                    index,
                    name: first.name(),
                    value: reduce(&values, reducer)?,
                    reducer,
                })
            })
            .collect()
    }
}
