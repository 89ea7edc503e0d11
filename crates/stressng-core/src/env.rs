//! Environment variable utilities
//!
//! ```ignore
//! use stressng_core::env::{env_get, env_get_bool};
//!
//! let instances: u32 = env_get("STRESS_INSTANCES", 4);
//! let sync: bool = env_get_bool("STRESS_SYNC_START", true);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" are true and "0", "false", "no", "off" are false
/// (case-insensitive). Anything else, including unset, returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).map(|v| v.to_lowercase()) {
        Ok(val) if matches!(val.as_str(), "1" | "true" | "yes" | "on") => true,
        Ok(val) if matches!(val.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
