//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment knobs with defaults. All
//! runtime tunables (`UMS_*`) go through these helpers.
//!
//! # Usage
//!
//! ```ignore
//! use umsched_core::env::{env_get, env_get_bool};
//!
//! let cpus: usize = env_get("UMS_NUM_CPUS", 4);
//! let debug: bool = env_get_bool("UMS_DEBUG", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Works with any type that implements `FromStr`. Unparseable values fall
/// back to the default rather than erroring.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Everything else set means false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
///
/// Returns `Some(T)` if the variable is set and parses successfully,
/// `None` otherwise.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_returns_default() {
        let val: usize = env_get("__UMS_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        assert!(env_get_bool("__UMS_TEST_UNSET__", true));
        assert!(env_get_opt::<u32>("__UMS_TEST_UNSET__").is_none());
        assert_eq!(env_get_str("__UMS_TEST_UNSET__", "fallback"), "fallback");
        assert!(!env_is_set("__UMS_TEST_UNSET__"));
    }

    #[test]
    fn test_set_var_parses() {
        std::env::set_var("__UMS_TEST_NUM__", "123");
        let val: usize = env_get("__UMS_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__UMS_TEST_NUM__");
    }

    #[test]
    fn test_bool_variants() {
        for truthy in ["1", "true", "YES", "on"] {
            std::env::set_var("__UMS_TEST_BOOL__", truthy);
            assert!(env_get_bool("__UMS_TEST_BOOL__", false), "{}", truthy);
        }
        for falsy in ["0", "false", "garbage"] {
            std::env::set_var("__UMS_TEST_BOOL__", falsy);
            assert!(!env_get_bool("__UMS_TEST_BOOL__", true), "{}", falsy);
        }
        std::env::remove_var("__UMS_TEST_BOOL__");
    }

    #[test]
    fn test_invalid_parse_uses_default() {
        std::env::set_var("__UMS_TEST_BAD__", "not_a_number");
        let val: usize = env_get("__UMS_TEST_BAD__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__UMS_TEST_BAD__");
    }
}
