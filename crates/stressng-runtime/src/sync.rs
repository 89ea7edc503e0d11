//! Synchronized start
//!
//! No worker enters its hot loop until every worker has reached the start
//! line. Workers park themselves (SIGSTOP on their own pid); the coordinator
//! waits until every slot reports WAITING, then sweeps SIGCONT over the list
//! until every slot reports RUNNING.
//!
//! ```text
//!   worker                         coordinator
//!   ──────                         ───────────
//!   init: STARTED
//!   state = WAITING
//!   kill(self, SIGSTOP) ──┐        poll until no slot is STARTED/RUNNING
//!        (stopped)        │        sweep: SIGCONT each slot not yet RUNNING
//!   state = RUNNING  ◄────┘        repeat sweep until all RUNNING/FINISHED
//!   alarm(timeout)
//! ```
//!
//! Both coordinator loops poll at `poll_interval` and stop as soon as the
//! context's keep-running predicate goes false or the barrier deadline
//! passes. A worker whose target process is gone before release is marked
//! FINISHED so the rest are not held back.

use std::thread;
use std::time::Instant;
use stressng_core::{SyncState, WorkerSyncSlot};
use tracing::{debug, info};

use crate::context::RunContext;
use crate::signal;

/// How `release_all` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// Every slot reached RUNNING or FINISHED
    Released,
    /// The keep-running predicate went false or the deadline passed first
    Cancelled,
}

/// Singly linked list of sync slots, threaded through `WorkerSyncSlot::next`
///
/// Links are slot indices. The list is built once, before any worker
/// exists, and never changes while it is traversed.
#[derive(Debug, Clone, Copy)]
pub struct SyncList<'a> {
    slots: &'a [WorkerSyncSlot],
    head: Option<u32>,
}

impl<'a> SyncList<'a> {
    /// Link every slot in array order
    pub fn link(slots: &'a [WorkerSyncSlot]) -> Self {
        for (i, slot) in slots.iter().enumerate() {
            let next = (i + 1 < slots.len()).then(|| (i + 1) as u32);
            slot.set_next(next);
        }
        Self { slots, head: (!slots.is_empty()).then_some(0) }
    }

    /// Adopt an already linked array
    pub fn from_head(slots: &'a [WorkerSyncSlot], head: Option<u32>) -> Self {
        Self { slots, head }
    }

    pub fn iter(&self) -> SyncListIter<'a> {
        SyncListIter { slots: self.slots, cursor: self.head, remaining: self.slots.len() }
    }
}

pub struct SyncListIter<'a> {
    slots: &'a [WorkerSyncSlot],
    cursor: Option<u32>,
    /// Bounds the walk if a link is corrupt
    remaining: usize,
}

impl<'a> Iterator for SyncListIter<'a> {
    type Item = &'a WorkerSyncSlot;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.slots.get(self.cursor? as usize)?;
        self.remaining -= 1;
        self.cursor = slot.next();
        Some(slot)
    }
}

/// Reset a slot before its worker exists: pid unknown, STARTED
pub fn init_slot(slot: &WorkerSyncSlot) {
    slot.init();
}

/// Park the calling worker at the start line
///
/// No-op unless synchronized start is enabled and the slot has a usable
/// target pid (> 1). Returns whether the worker parked; a parked worker has
/// its run timeout armed on the way out.
pub fn park_self(ctx: &RunContext, slot: &WorkerSyncSlot) -> bool {
    if !ctx.flags().sync_start {
        return false;
    }
    let pid = slot.target_pid();
    if pid <= 1 {
        return false;
    }

    slot.set_state(SyncState::Waiting);
    if let Err(e) = ctx.control().suspend(pid) {
        info!("cannot park worker for synchronized start: {}", e);
    }
    // Only reached once resumed when the target is this process
    slot.set_state(SyncState::Running);
    signal::arm_alarm(ctx.budget().timeout);
    true
}

/// Send the slot's target a continue; its state is its own to update
pub fn resume_one(ctx: &RunContext, slot: &WorkerSyncSlot) {
    let pid = slot.target_pid();
    if pid <= 1 {
        return;
    }
    if let Err(e) = ctx.control().resume(pid) {
        info!("cannot resume worker for synchronized start: {}", e);
    }
}

/// Retire a slot whose target exited before it was released
fn retire_if_gone(ctx: &RunContext, slot: &WorkerSyncSlot) -> bool {
    let pid = slot.target_pid();
    if pid <= 1 || ctx.control().is_alive(pid) {
        return false;
    }
    info!("worker {} exited before the start line", pid);
    slot.set_state(SyncState::Finished);
    true
}

/// False once cancelled or past `deadline`; the deadline cancels the token
fn barrier_open(ctx: &RunContext, deadline: Option<Instant>) -> bool {
    if deadline.is_some_and(|d| Instant::now() >= d) {
        ctx.token().cancel();
        return false;
    }
    ctx.keep_running()
}

/// Wait for every worker to park, then release them all
///
/// Nobody is resumed until every slot is WAITING (or FINISHED, which is
/// exempt), so no worker gets a head start while others are still arriving.
pub fn release_all(ctx: &RunContext, list: &SyncList<'_>) -> BarrierOutcome {
    release_all_until(ctx, list, None)
}

/// `release_all` that gives up at `deadline`, cancelling the context token
pub fn release_all_until(ctx: &RunContext, list: &SyncList<'_>, deadline: Option<Instant>) -> BarrierOutcome {
    // Phase 1: everyone at the start line
    loop {
        let unready = list
            .iter()
            .filter(|s| !s.state().is_ready() && !retire_if_gone(ctx, s))
            .count();
        if unready == 0 {
            break;
        }
        if !barrier_open(ctx, deadline) {
            debug!("start barrier cancelled with {} workers not ready", unready);
            return BarrierOutcome::Cancelled;
        }
        thread::sleep(ctx.poll_interval());
    }

    // Phase 2: continue everyone until they report in
    loop {
        let mut total = 0usize;
        let mut released = 0usize;
        for slot in list.iter() {
            total += 1;
            if slot.state().is_released() || retire_if_gone(ctx, slot) {
                released += 1;
            } else {
                resume_one(ctx, slot);
            }
        }
        if released == total {
            debug!("start barrier released {} workers", total);
            return BarrierOutcome::Released;
        }
        if !barrier_open(ctx, deadline) {
            debug!("start barrier cancelled with {}/{} workers released", released, total);
            return BarrierOutcome::Cancelled;
        }
        thread::sleep(ctx.poll_interval());
    }
}
