//! Harness entry point: fork, release, reap, report
//!
//! ```text
//!   allocate slots + stats + run flag (shared)
//!   link sync list, init slots
//!   fork N workers ──► run_worker (park, run, finish, _exit)
//!   release_all (when synchronized start is on), bounded by timeout + grace
//!   reap: WNOHANG poll; at deadline cancel; after grace CONT+KILL
//!   statuses, interrupt failure checks, metrics, reports
//!   unmap
//! ```

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use stressng_core::{ExitStatus, MetricsAggregator, SyncState, WorkerStats, WorkerSyncSlot};
use tracing::{debug, info, warn};

use crate::config::StressConfig;
use crate::context::RunContext;
use crate::error::{StressError, StressResult};
use crate::interrupts::InterruptSampler;
use crate::memory::SharedRegion;
use crate::report::{StressorReport, StressorRun};
use crate::sync::{self, BarrierOutcome, SyncList};
use crate::thermal::ThermalSampler;
use crate::worker::{self, Samplers, Stressor};

pub struct Harness {
    ctx: RunContext,
    interrupts: InterruptSampler,
    thermal: ThermalSampler,
}

impl Harness {
    /// Harness with a fresh signal-backed context
    pub fn new(config: &StressConfig) -> StressResult<Self> {
        Ok(Self::with_context(RunContext::new(config)?))
    }

    /// Harness over an existing context, sampling the live system
    pub fn with_context(ctx: RunContext) -> Self {
        let thermal = if ctx.flags().thermal_zones {
            ThermalSampler::discover()
        } else {
            ThermalSampler::default()
        };
        Self::with_samplers(ctx, InterruptSampler::new(), thermal)
    }

    pub fn with_samplers(ctx: RunContext, interrupts: InterruptSampler, thermal: ThermalSampler) -> Self {
        Self { ctx, interrupts, thermal }
    }

    #[inline]
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn samplers(&self) -> Samplers<'_> {
        let flags = self.ctx.flags();
        Samplers {
            interrupts: flags.interrupts.then_some(&self.interrupts),
            thermal: (flags.thermal_zones && !self.thermal.is_empty()).then_some(&self.thermal),
        }
    }

    /// Run `instances` workers of `stressor` to completion
    ///
    /// Fails only when the shared regions cannot be mapped; everything that
    /// goes wrong in a worker is folded into the report's status.
    pub fn run_stressor(&self, stressor: &dyn Stressor, instances: usize) -> StressResult<StressorReport> {
        let name = stressor.name();
        if instances == 0 {
            return Err(StressError::NoInstances(name.to_string()));
        }

        let slots = SharedRegion::<WorkerSyncSlot>::allocate(instances)
            .map_err(|e| StressError::resource(name, e))?;
        let stats = SharedRegion::<WorkerStats>::allocate(instances)
            .map_err(|e| StressError::resource(name, e))?;
        let run_flag = SharedRegion::<AtomicBool>::allocate(1)
            .map_err(|e| StressError::resource(name, e))?;

        // Deadline cancels stop this run only; an interrupt stops them all
        let run_ctx = self.ctx.with_token(self.ctx.token().child_shared(Arc::new(run_flag)));

        let list = SyncList::link(&slots);
        for slot in slots.iter() {
            sync::init_slot(slot);
        }

        info!("{}: starting {} instances", name, instances);
        let pids = self.spawn_workers(&run_ctx, stressor, &slots, &stats);

        if run_ctx.flags().sync_start {
            // Workers still held at the start line after this are given up on
            let deadline = run_ctx.budget().timeout.map(|t| Instant::now() + t + run_ctx.reap_grace());
            match sync::release_all_until(&run_ctx, &list, deadline) {
                BarrierOutcome::Released => debug!("{}: all instances released", name),
                BarrierOutcome::Cancelled => info!("{}: cancelled at the start line", name),
            }
        }

        let statuses = self.reap(&run_ctx, name, &pids, &stats);
        Ok(self.build_report(name, statuses, &stats))
    }

    fn spawn_workers(
        &self,
        run_ctx: &RunContext,
        stressor: &dyn Stressor,
        slots: &[WorkerSyncSlot],
        stats: &[WorkerStats],
    ) -> Vec<Option<Pid>> {
        let name = stressor.name();
        let instances = slots.len();
        let mut pids = Vec::with_capacity(instances);

        for instance in 0..instances {
            if !run_ctx.keep_running() {
                slots[instance].set_state(SyncState::Finished);
                stats[instance].finish(ExitStatus::NoResource, 0);
                pids.push(None);
                continue;
            }

            match unsafe { fork() } {
                Ok(ForkResult::Child) => {
                    let status = worker::run_worker(
                        run_ctx,
                        stressor,
                        instance,
                        instances,
                        &slots[instance],
                        &stats[instance],
                        self.samplers(),
                    );
                    unsafe { libc::_exit(status.code()) };
                }
                Ok(ForkResult::Parent { child }) => {
                    slots[instance].set_pid(child.as_raw());
                    pids.push(Some(child));
                }
                Err(e) => {
                    warn!("{}: cannot fork instance {}: {}", name, instance, e);
                    slots[instance].set_state(SyncState::Finished);
                    stats[instance].finish(ExitStatus::NoResource, 0);
                    pids.push(None);
                }
            }
        }
        pids
    }

    /// Wait for every worker; returns one status per instance
    fn reap(
        &self,
        run_ctx: &RunContext,
        name: &str,
        pids: &[Option<Pid>],
        stats: &[WorkerStats],
    ) -> Vec<ExitStatus> {
        let mut statuses: Vec<Option<ExitStatus>> = pids
            .iter()
            .enumerate()
            .map(|(i, pid)| pid.is_none().then(|| stats[i].exit_status()))
            .collect();

        let deadline = run_ctx.budget().timeout.map(|t| Instant::now() + t);
        let mut cancelled_at: Option<Instant> = None;

        loop {
            for (i, pid) in pids.iter().enumerate() {
                let Some(pid) = pid else { continue };
                if statuses[i].is_some() {
                    continue;
                }
                statuses[i] = poll_child(*pid, &stats[i], WaitPidFlag::WNOHANG);
            }

            let remaining: Vec<usize> = (0..pids.len()).filter(|&i| statuses[i].is_none()).collect();
            if remaining.is_empty() {
                break;
            }

            let now = Instant::now();
            if cancelled_at.is_none() && (deadline.is_some_and(|d| now >= d) || !run_ctx.keep_running()) {
                debug!("{}: stopping {} instances", name, remaining.len());
                run_ctx.token().cancel();
                cancelled_at = Some(now);
                // Anyone still parked must wake to see the cancel
                for &i in &remaining {
                    self.resume(run_ctx, pids[i]);
                }
            }

            if cancelled_at.is_some_and(|at| now >= at + run_ctx.reap_grace()) {
                warn!("{}: killing {} instances that did not stop", name, remaining.len());
                for &i in &remaining {
                    let Some(pid) = pids[i] else { continue };
                    self.resume(run_ctx, Some(pid));
                    if let Err(e) = run_ctx.control().kill(pid.as_raw()) {
                        info!("{}", e);
                    }
                    statuses[i] = Some(poll_child(pid, &stats[i], WaitPidFlag::empty()).unwrap_or(ExitStatus::Signaled));
                }
                break;
            }

            thread::sleep(run_ctx.poll_interval());
        }

        statuses.into_iter().map(|s| s.unwrap_or(ExitStatus::BySysExit)).collect()
    }

    fn resume(&self, run_ctx: &RunContext, pid: Option<Pid>) {
        if let Some(pid) = pid {
            if let Err(e) = run_ctx.control().resume(pid.as_raw()) {
                debug!("{}", e);
            }
        }
    }

    fn build_report(&self, name: &str, mut statuses: Vec<ExitStatus>, stats: &[WorkerStats]) -> StressorReport {
        let mut failures = Vec::new();
        if self.ctx.flags().interrupts {
            for (instance, (status, s)) in statuses.iter_mut().zip(stats).enumerate() {
                if !s.is_ignored() {
                    failures.extend(self.interrupts.check_failures(name, s, instance, status));
                }
            }
        }

        let run = [StressorRun::new(name, stats)];
        let flags = self.ctx.flags();
        StressorReport {
            name: name.to_string(),
            instances: stats.len(),
            status: ExitStatus::combine(statuses.iter().copied()),
            metrics: MetricsAggregator::summarize(stats),
            interrupts: if flags.interrupts { self.interrupts.dump_report(&run) } else { Vec::new() },
            thermal: if flags.thermal_zones { self.thermal.dump_report(&run) } else { Vec::new() },
            failures,
        }
    }
}

/// One `waitpid` on `pid`; `None` while it is still running
fn poll_child(pid: Pid, stats: &WorkerStats, flags: WaitPidFlag) -> Option<ExitStatus> {
    loop {
        match waitpid(pid, Some(flags)) {
            Ok(WaitStatus::Exited(_, code)) => {
                let status = ExitStatus::from_code(code);
                if !stats.counter_ready.load(Ordering::Acquire) {
                    return Some(status.escalate(ExitStatus::MetricsUntrustworthy));
                }
                return Some(status);
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                debug!("pid {} terminated by {}", pid, sig.as_str());
                return Some(ExitStatus::Signaled);
            }
            Ok(WaitStatus::StillAlive) => return None,
            // Stopped/continued notifications: keep waiting if blocking
            Ok(_) if flags.contains(WaitPidFlag::WNOHANG) => return None,
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("waitpid {}: {}", pid, e);
                return Some(ExitStatus::BySysExit);
            }
        }
    }
}
