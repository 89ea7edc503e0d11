//! Logging setup
//!
//! Events go through `tracing`; this installs a stderr fmt subscriber.
//!
//! # Environment Variables
//!
//! - `STRESS_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0..=5)
//! - `STRESS_LOG` - full `EnvFilter` directive string; wins over the level
//! - `STRESS_LOG_TIME=1` - prefix each line with a timestamp

use std::sync::Once;
use stressng_core::env::{env_get_bool, env_get_str};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Map a level name or number to a filter directive
pub fn parse_level(val: &str) -> &'static str {
    match val.trim().to_lowercase().as_str() {
        "off" | "0" => "off",
        "error" | "1" => "error",
        "warn" | "2" => "warn",
        "info" | "3" => "info",
        "debug" | "4" => "debug",
        "trace" | "5" => "trace",
        _ => "info",
    }
}

/// Initialize logging from environment variables
///
/// Safe to call more than once; only the first call installs a subscriber.
/// A subscriber installed elsewhere (e.g. by a test harness) is left alone.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("STRESS_LOG")
            .unwrap_or_else(|_| EnvFilter::new(parse_level(&env_get_str("STRESS_LOG_LEVEL", "info"))));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false);

        let _ = if env_get_bool("STRESS_LOG_TIME", false) {
            builder.try_init()
        } else {
            builder.without_time().try_init()
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("0"), "off");
        assert_eq!(parse_level("WARN"), "warn");
        assert_eq!(parse_level(" debug "), "debug");
        assert_eq!(parse_level("5"), "trace");
        assert_eq!(parse_level("bogus"), "info");
    }

    #[test]
    fn test_init_twice() {
        init();
        init();
    }
}
