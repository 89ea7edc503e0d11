//! Harness configuration
//!
//! Library defaults with runtime environment overrides, plus builder
//! methods for programmatic control.
//!
//! ```rust,ignore
//! use stressng_runtime::config::StressConfig;
//!
//! let config = StressConfig::from_env()
//!     .instances(8)
//!     .timeout(Some(Duration::from_secs(10)));
//! ```

use std::time::Duration;
use stressng_core::env::{env_get, env_get_bool};
use thiserror::Error;

/// Library defaults
pub mod defaults {
    pub const INSTANCES: u32 = 1;
    pub const TIMEOUT_SECS: u64 = 60;
    pub const MAX_OPS: u64 = 0;
    pub const SYNC_START: bool = true;
    pub const INTERRUPTS: bool = true;
    pub const THERMAL_ZONES: bool = false;
    pub const POLL_INTERVAL_MS: u64 = 10;
    pub const REAP_GRACE_MS: u64 = 2000;
}

/// Feature switches consulted by the coordinator and samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunFlags {
    /// Park workers at the start line and release them together
    pub sync_start: bool,
    /// Sample interrupt counters around each worker's run
    pub interrupts: bool,
    /// Sample thermal zones around each worker's run
    pub thermal_zones: bool,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            sync_start: defaults::SYNC_START,
            interrupts: defaults::INTERRUPTS,
            thermal_zones: defaults::THERMAL_ZONES,
        }
    }
}

/// Per-stressor time and op-count budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Budget {
    /// Wall time each stressor runs for; `None` runs until ops or cancel
    pub timeout: Option<Duration>,
    /// Bogo ops per instance; 0 is unlimited
    pub max_ops: u64,
}

#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Worker instances per stressor
    pub instances: u32,
    pub budget: Budget,
    pub flags: RunFlags,
    /// Barrier and reaper poll granularity
    pub poll_interval: Duration,
    /// How long after cancellation stragglers get before SIGKILL
    pub reap_grace: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl StressConfig {
    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `STRESS_INSTANCES` - Worker instances per stressor
    /// - `STRESS_TIMEOUT_SECS` - Run time per stressor, 0 for none
    /// - `STRESS_MAX_OPS` - Bogo ops per instance, 0 for unlimited
    /// - `STRESS_SYNC_START` - Synchronized start (0/1)
    /// - `STRESS_INTERRUPTS` - Interrupt sampling (0/1)
    /// - `STRESS_THERMAL_ZONES` - Thermal zone sampling (0/1)
    /// - `STRESS_POLL_INTERVAL_MS` - Poll interval in milliseconds
    /// - `STRESS_REAP_GRACE_MS` - Grace before killing stragglers
    pub fn from_env() -> Self {
        let timeout_secs: u64 = env_get("STRESS_TIMEOUT_SECS", defaults::TIMEOUT_SECS);
        Self {
            instances: env_get("STRESS_INSTANCES", defaults::INSTANCES),
            budget: Budget {
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                max_ops: env_get("STRESS_MAX_OPS", defaults::MAX_OPS),
            },
            flags: RunFlags {
                sync_start: env_get_bool("STRESS_SYNC_START", defaults::SYNC_START),
                interrupts: env_get_bool("STRESS_INTERRUPTS", defaults::INTERRUPTS),
                thermal_zones: env_get_bool("STRESS_THERMAL_ZONES", defaults::THERMAL_ZONES),
            },
            poll_interval: Duration::from_millis(env_get(
                "STRESS_POLL_INTERVAL_MS",
                defaults::POLL_INTERVAL_MS,
            )),
            reap_grace: Duration::from_millis(env_get("STRESS_REAP_GRACE_MS", defaults::REAP_GRACE_MS)),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            instances: defaults::INSTANCES,
            budget: Budget {
                timeout: Some(Duration::from_secs(defaults::TIMEOUT_SECS)),
                max_ops: defaults::MAX_OPS,
            },
            flags: RunFlags::default(),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            reap_grace: Duration::from_millis(defaults::REAP_GRACE_MS),
        }
    }

    // Builder methods

    pub fn instances(mut self, n: u32) -> Self {
        self.instances = n;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.budget.timeout = timeout;
        self
    }

    pub fn max_ops(mut self, ops: u64) -> Self {
        self.budget.max_ops = ops;
        self
    }

    pub fn sync_start(mut self, enable: bool) -> Self {
        self.flags.sync_start = enable;
        self
    }

    pub fn interrupts(mut self, enable: bool) -> Self {
        self.flags.interrupts = enable;
        self
    }

    pub fn thermal_zones(mut self, enable: bool) -> Self {
        self.flags.thermal_zones = enable;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn reap_grace(mut self, d: Duration) -> Self {
        self.reap_grace = d;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instances == 0 {
            return Err(ConfigError::InvalidValue("instances must be > 0"));
        }
        if self.instances > 4096 {
            return Err(ConfigError::InvalidValue("instances must be <= 4096"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue("poll_interval must be > 0"));
        }
        if self.poll_interval > Duration::from_secs(1) {
            return Err(ConfigError::InvalidValue("poll_interval must be <= 1s"));
        }
        if self.budget.timeout.is_none() && self.budget.max_ops == 0 {
            return Err(ConfigError::InvalidValue("either a timeout or max_ops is required"));
        }
        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = StressConfig::new();
        assert_eq!(config.instances, defaults::INSTANCES);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert!(config.flags.sync_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = StressConfig::new()
            .instances(8)
            .timeout(Some(Duration::from_secs(5)))
            .max_ops(1000)
            .sync_start(false)
            .thermal_zones(true);

        assert_eq!(config.instances, 8);
        assert_eq!(config.budget.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.budget.max_ops, 1000);
        assert!(!config.flags.sync_start);
        assert!(config.flags.thermal_zones);
    }

    #[test]
    fn test_validation() {
        assert!(StressConfig::new().instances(0).validate().is_err());
        assert!(StressConfig::new().poll_interval(Duration::ZERO).validate().is_err());

        let unbounded = StressConfig::new().timeout(None).max_ops(0);
        assert_eq!(
            unbounded.validate(),
            Err(ConfigError::InvalidValue("either a timeout or max_ops is required"))
        );
        assert!(StressConfig::new().timeout(None).max_ops(10).validate().is_ok());
    }
}
