//! Cancellation token for the "keep running" flag
//!
//! Every poll loop in the harness and every worker hot loop checks a token.
//! A token's flag is either process-local or lives in shared memory, in which
//! case cancelling it in the coordinator is seen by every forked worker.
//! Tokens can be linked to form parent-child relationships: a per-run token
//! is a child of the context token, so a user interrupt stops every run
//! while a deadline only stops its own.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag stored somewhere both sides of a fork can see
pub trait SharedFlag: Send + Sync {
    fn flag(&self) -> &AtomicBool;
}

/// Token for checking and triggering cancellation
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    flag: FlagStorage,

    /// Parent token (if any)
    parent: Option<CancellationToken>,
}

enum FlagStorage {
    Local(AtomicBool),
    Shared(Arc<dyn SharedFlag>),
}

impl FlagStorage {
    #[inline]
    fn get(&self) -> &AtomicBool {
        match self {
            FlagStorage::Local(flag) => flag,
            FlagStorage::Shared(shared) => shared.flag(),
        }
    }
}

impl CancellationToken {
    /// Create a new process-local token
    pub fn new() -> Self {
        Self::build(FlagStorage::Local(AtomicBool::new(false)), None)
    }

    /// Create a token whose flag lives in shared memory
    pub fn from_shared(flag: Arc<dyn SharedFlag>) -> Self {
        Self::build(FlagStorage::Shared(flag), None)
    }

    /// Create a process-local child linked to this one
    pub fn child(&self) -> Self {
        Self::build(FlagStorage::Local(AtomicBool::new(false)), Some(self.clone()))
    }

    /// Create a shared-memory child linked to this one
    pub fn child_shared(&self, flag: Arc<dyn SharedFlag>) -> Self {
        Self::build(FlagStorage::Shared(flag), Some(self.clone()))
    }

    fn build(flag: FlagStorage, parent: Option<CancellationToken>) -> Self {
        Self { inner: Arc::new(Inner { flag, parent }) }
    }

    /// Check if cancellation was requested
    ///
    /// Also checks parent tokens recursively.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        if self.inner.flag.get().load(Ordering::Acquire) {
            return true;
        }
        match self.inner.parent {
            Some(ref parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Request cancellation
    ///
    /// Only sets this token's flag; children see it, parents do not.
    pub fn cancel(&self) {
        self.inner.flag.get().store(true, Ordering::Release);
    }

    /// Clear this token's own flag (parents are untouched)
    pub fn reset(&self) {
        self.inner.flag.get().store(false, Ordering::Release);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
