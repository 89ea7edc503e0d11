//! Run context
//!
//! Everything the coordinator and samplers used to reach through globals:
//! the feature flags, the budget, the keep-running token (backed by shared
//! memory so forked workers see it) and the process-control capability.
//! Passing it explicitly lets independent runs coexist in one process and
//! lets tests inject fake control.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use stressng_core::{CancellationToken, ProcessControl};

use crate::config::{Budget, RunFlags, StressConfig};
use crate::error::{StressError, StressResult};
use crate::memory::SharedRegion;
use crate::signal::{self, SignalControl};

#[derive(Clone)]
pub struct RunContext {
    flags: RunFlags,
    budget: Budget,
    token: CancellationToken,
    control: Arc<dyn ProcessControl>,
    poll_interval: Duration,
    reap_grace: Duration,
}

impl RunContext {
    /// Context for a real forked run
    ///
    /// The keep-running flag is mapped shared so a cancel here reaches
    /// every worker forked later.
    pub fn new(config: &StressConfig) -> StressResult<Self> {
        config.validate()?;
        let flag = SharedRegion::<AtomicBool>::allocate(1)
            .map_err(|e| StressError::resource("run context", e))?;
        Ok(Self {
            flags: config.flags,
            budget: config.budget,
            token: CancellationToken::from_shared(Arc::new(flag)),
            control: Arc::new(SignalControl::new()),
            poll_interval: config.poll_interval,
            reap_grace: config.reap_grace,
        })
    }

    /// Context with caller-supplied token and control
    pub fn with_control(
        config: &StressConfig,
        token: CancellationToken,
        control: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            flags: config.flags,
            budget: config.budget,
            token,
            control,
            poll_interval: config.poll_interval,
            reap_grace: config.reap_grace,
        }
    }

    /// Same context, different token
    pub fn with_token(&self, token: CancellationToken) -> Self {
        Self { token, ..self.clone() }
    }

    #[inline]
    pub fn flags(&self) -> RunFlags {
        self.flags
    }

    #[inline]
    pub fn budget(&self) -> Budget {
        self.budget
    }

    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[inline]
    pub fn control(&self) -> &dyn ProcessControl {
        self.control.as_ref()
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[inline]
    pub fn reap_grace(&self) -> Duration {
        self.reap_grace
    }

    /// The global continue predicate every poll loop checks
    ///
    /// An interrupt signal cancels the token on first sight.
    pub fn keep_running(&self) -> bool {
        if signal::interrupted() {
            self.token.cancel();
        }
        !self.token.is_cancelled()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("flags", &self.flags)
            .field("budget", &self.budget)
            .field("token", &self.token)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parking::ParkingControl;

    #[test]
    fn test_new_shared_token() {
        let ctx = RunContext::new(&StressConfig::new()).unwrap();
        assert!(ctx.keep_running());
        ctx.token().cancel();
        assert!(!ctx.keep_running());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = RunContext::new(&StressConfig::new().instances(0)).unwrap_err();
        assert!(matches!(err, StressError::Config(_)));
    }

    #[test]
    fn test_with_token_scopes_cancel() {
        let ctx = RunContext::with_control(
            &StressConfig::new(),
            CancellationToken::new(),
            Arc::new(ParkingControl::new()),
        );
        let run = ctx.with_token(ctx.token().child());
        run.token().cancel();
        assert!(!run.keep_running());
        assert!(ctx.keep_running());
    }
}
