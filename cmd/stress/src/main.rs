//! Stress - run demonstration stressors through the harness
//!
//! Usage: `stress [STRESSOR...]` (default: all of them)
//!
//! Instances, timeout, op budget and feature switches come from the
//! `STRESS_*` environment variables; `STRESS_YAML=1` also prints the
//! machine-readable report.

use stressng::{
    env_get_bool, ExitStatus, MetricReducer, Runtime, StressConfig, Stressor, WorkerArgs,
};
use std::time::Instant;

/// Floating point square roots
struct Cpu;

impl Stressor for Cpu {
    fn name(&self) -> &str {
        "cpu"
    }

    fn run(&self, args: &WorkerArgs<'_>) -> ExitStatus {
        let mut acc = 0.0f64;
        while args.keep_running() {
            for i in 1..1024u32 {
                acc += std::hint::black_box(i as f64).sqrt();
            }
            args.bogo_inc();
        }
        std::hint::black_box(acc);
        ExitStatus::Success
    }
}

/// sched_yield storm
struct Yield;

impl Stressor for Yield {
    fn name(&self) -> &str {
        "yield"
    }

    fn run(&self, args: &WorkerArgs<'_>) -> ExitStatus {
        while args.keep_running() {
            std::thread::yield_now();
            args.bogo_inc();
        }
        ExitStatus::Success
    }
}

/// Cheapest possible system call, with a latency metric
struct Getpid;

impl Stressor for Getpid {
    fn name(&self) -> &str {
        "getpid"
    }

    fn run(&self, args: &WorkerArgs<'_>) -> ExitStatus {
        let start = Instant::now();
        while args.keep_running() {
            for _ in 0..64 {
                std::hint::black_box(unsafe { libc::getpid() });
            }
            args.bogo_add(64);
        }
        let ops = args.bogo_get();
        if ops > 0 {
            let ns = start.elapsed().as_nanos() as f64 / ops as f64;
            args.metrics_set(0, "nanosecs per getpid call", ns, MetricReducer::GeometricMean);
        }
        ExitStatus::Success
    }
}

fn main() {
    stressng::init_logging();

    let all: [&dyn Stressor; 3] = [&Cpu, &Yield, &Getpid];
    let wanted: Vec<String> = std::env::args().skip(1).collect();
    let selected: Vec<&dyn Stressor> = if wanted.is_empty() {
        all.to_vec()
    } else {
        let mut selected = Vec::new();
        for name in &wanted {
            match all.iter().find(|s| s.name() == name.as_str()) {
                Some(s) => selected.push(*s),
                None => {
                    let names: Vec<&str> = all.iter().map(|s| s.name()).collect();
                    eprintln!("unknown stressor '{}', choose from: {}", name, names.join(", "));
                    std::process::exit(ExitStatus::Failure.code());
                }
            }
        }
        selected
    };

    let config = StressConfig::from_env();
    let runtime = match Runtime::new(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("stress: {}", e);
            std::process::exit(ExitStatus::Failure.code());
        }
    };

    println!(
        "=== stress: {} stressor(s), {} instance(s) each ===\n",
        selected.len(),
        runtime.config().instances
    );

    let t0 = Instant::now();
    let summary = runtime.run(&selected);

    for report in &summary.reports {
        for line in report.lines() {
            println!("{}", line);
        }
        for failure in &report.failures {
            println!("FAIL {}", failure);
        }
    }
    for err in &summary.errors {
        println!("SKIP {}", err);
    }

    if env_get_bool("STRESS_YAML", false) {
        println!("\nmetrics:");
        for report in &summary.reports {
            print!("{}", report.yaml());
        }
    }

    println!(
        "\n{} in {:.2}s",
        if summary.passed() { "passed" } else { "failed" },
        t0.elapsed().as_secs_f64()
    );
    std::process::exit(summary.exit_code());
}
