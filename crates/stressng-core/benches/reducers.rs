//! Reducer throughput over instance-count-sized inputs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::Ordering;
use stressng_core::{reduce, ExitStatus, MetricReducer, MetricsAggregator, WorkerStats};

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce");
    for n in [4usize, 64, 1024] {
        let values: Vec<f64> = (1..=n).map(|i| i as f64 * 1.5).collect();
        for reducer in [
            MetricReducer::Sum,
            MetricReducer::GeometricMean,
            MetricReducer::HarmonicMean,
        ] {
            group.bench_with_input(
                BenchmarkId::new(reducer.to_string(), n),
                &values,
                |b, v| b.iter(|| reduce(black_box(v), reducer)),
            );
        }
    }
    group.finish();
}

fn bench_summarize(c: &mut Criterion) {
    let stats: Vec<WorkerStats> = (0..64)
        .map(|i| {
            let s = WorkerStats::new();
            s.counter.store(1000 + i, Ordering::Relaxed);
            s.finish(ExitStatus::Success, 1_000_000_000);
            s
        })
        .collect();
    c.bench_function("summarize_64", |b| {
        b.iter(|| MetricsAggregator::summarize(black_box(&stats)))
    });
}

criterion_group!(benches, bench_reduce, bench_summarize);
criterion_main!(benches);
