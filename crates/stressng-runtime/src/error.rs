//! Harness error types

use crate::config::ConfigError;
use stressng_core::ResourceError;
use thiserror::Error;

/// Result type for harness operations
pub type StressResult<T> = Result<T, StressError>;

#[derive(Debug, Error)]
pub enum StressError {
    /// Shared memory for this run could not be mapped
    #[error("{stressor}: {source}")]
    Resource {
        stressor: String,
        #[source]
        source: ResourceError,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Signal handlers could not be installed
    #[error("signal setup failed: {0}")]
    SignalSetup(#[from] nix::Error),

    /// A stressor was asked to run with zero instances
    #[error("{0}: no instances requested")]
    NoInstances(String),
}

impl StressError {
    pub(crate) fn resource(stressor: &str, source: ResourceError) -> Self {
        StressError::Resource { stressor: stressor.to_string(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = StressError::resource("cpu", ResourceError::Empty);
        assert_eq!(e.to_string(), "cpu: shared region must hold at least one element");

        let e: StressError = ConfigError::InvalidValue("instances must be > 0").into();
        assert_eq!(e.to_string(), "Invalid config: instances must be > 0");
    }
}
