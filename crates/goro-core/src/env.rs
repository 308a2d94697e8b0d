//! Environment variable parsing helpers
//!
//! The runtime is configured through `GORO_*` variables; these helpers do
//! the parse-with-default dance in one place.
//!
//! ```ignore
//! let workers: usize = env_get("GORO_NUM_WORKERS", 4);
//! let trace = env_get_bool("GORO_TRACE_SWITCHES", false);
//! ```

use std::str::FromStr;

/// Parse an environment variable as `T`, falling back to `default` when
/// the variable is unset or fails to parse.
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

/// Boolean environment variable.
///
/// "1", "true", "yes", "on" (case-insensitive) are true; any other set
/// value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Parse an environment variable as `Option<T>`; `None` when unset or
/// unparseable.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_returns_default() {
        let val: usize = env_get("__GORO_TEST_UNSET__", 7);
        assert_eq!(val, 7);
        assert!(env_get_bool("__GORO_TEST_UNSET__", true));
        let opt: Option<u16> = env_get_opt("__GORO_TEST_UNSET__");
        assert!(opt.is_none());
    }

    #[test]
    fn test_parse_failure_returns_default() {
        std::env::set_var("__GORO_TEST_BAD__", "not_a_number");
        let val: usize = env_get("__GORO_TEST_BAD__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__GORO_TEST_BAD__");
    }

    #[test]
    fn test_bool_variants() {
        std::env::set_var("__GORO_TEST_BOOL__", "YES");
        assert!(env_get_bool("__GORO_TEST_BOOL__", false));

        std::env::set_var("__GORO_TEST_BOOL__", "0");
        assert!(!env_get_bool("__GORO_TEST_BOOL__", true));

        std::env::set_var("__GORO_TEST_BOOL__", "garbage");
        assert!(!env_get_bool("__GORO_TEST_BOOL__", true));

        std::env::remove_var("__GORO_TEST_BOOL__");
    }

    #[test]
    fn test_set_value_parses() {
        std::env::set_var("__GORO_TEST_NUM__", "123");
        let val: usize = env_get("__GORO_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__GORO_TEST_NUM__");
    }
}
