//! Runtime configuration
//!
//! Compile-time defaults with environment overrides and builder methods.
//!
//! # Environment Variables
//!
//! - `GORO_NUM_WORKERS` - worker thread count
//! - `GORO_MAX_COROUTINES` - slot table size
//! - `GORO_STACK_SIZE` - usable stack bytes per coroutine
//! - `GORO_PARK_TIMEOUT_MS` - worker park timeout
//! - `GORO_IDLE_SPINS` - idle spin rounds before parking
//! - `GORO_SPIN_LIMIT` - bounded-spin budget for lock fast paths
//! - `GORO_DEBUG` - enable debug logging

use goro_core::env::{env_get, env_get_bool};
use std::time::Duration;

/// Library defaults, overridable per build by editing here and per run
/// through the `GORO_*` environment variables.
pub mod defaults {
    pub const NUM_WORKERS: usize = 4;
    pub const MAX_COROUTINES: usize = 4096;
    pub const STACK_SIZE: usize = 256 * 1024;
    pub const PARK_TIMEOUT_MS: u64 = 20;
    pub const IDLE_SPINS: u32 = 10;
    pub const SPIN_LIMIT: u32 = 64;
    pub const DEBUG_LOGGING: bool = false;
}

/// Scheduler configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads
    pub num_workers: usize,
    /// Maximum concurrent coroutines (slot table size)
    pub max_coroutines: usize,
    /// Usable stack size per coroutine (guard page added on top)
    pub stack_size: usize,
    /// Upper bound on how long an idle worker sleeps between wake checks
    pub park_timeout: Duration,
    /// Spin rounds an idle worker burns before parking
    pub idle_spins: u32,
    /// Bounded-spin budget used by lock fast paths before yielding
    pub spin_limit: u32,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Defaults with environment variable overrides applied.
    pub fn from_env() -> Self {
        Self {
            num_workers: env_get("GORO_NUM_WORKERS", defaults::NUM_WORKERS),
            max_coroutines: env_get("GORO_MAX_COROUTINES", defaults::MAX_COROUTINES),
            stack_size: env_get("GORO_STACK_SIZE", defaults::STACK_SIZE),
            park_timeout: Duration::from_millis(env_get(
                "GORO_PARK_TIMEOUT_MS",
                defaults::PARK_TIMEOUT_MS,
            )),
            idle_spins: env_get("GORO_IDLE_SPINS", defaults::IDLE_SPINS),
            spin_limit: env_get("GORO_SPIN_LIMIT", defaults::SPIN_LIMIT),
            debug_logging: env_get_bool("GORO_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Plain defaults, no environment lookups. Useful for tests.
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            max_coroutines: defaults::MAX_COROUTINES,
            stack_size: defaults::STACK_SIZE,
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
            idle_spins: defaults::IDLE_SPINS,
            spin_limit: defaults::SPIN_LIMIT,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn max_coroutines(mut self, n: usize) -> Self {
        self.max_coroutines = n;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    pub fn idle_spins(mut self, spins: u32) -> Self {
        self.idle_spins = spins;
        self
    }

    pub fn spin_limit(mut self, spins: u32) -> Self {
        self.spin_limit = spins;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue("num_workers must be > 0"));
        }
        if self.num_workers > 256 {
            return Err(ConfigError::InvalidValue("num_workers must be <= 256"));
        }
        if self.max_coroutines == 0 {
            return Err(ConfigError::InvalidValue("max_coroutines must be > 0"));
        }
        if self.max_coroutines > u32::MAX as usize {
            return Err(ConfigError::InvalidValue("max_coroutines must fit in u32"));
        }
        if self.stack_size < 16 * 1024 {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.park_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("park_timeout must be > 0"));
        }
        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = RuntimeConfig::new();
        assert!(config.validate().is_ok());
        assert!(config.num_workers >= 1);
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .num_workers(8)
            .stack_size(128 * 1024)
            .park_timeout(Duration::from_millis(5));

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.stack_size, 128 * 1024);
        assert_eq!(config.park_timeout, Duration::from_millis(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(RuntimeConfig::new().num_workers(0).validate().is_err());
        assert!(RuntimeConfig::new().num_workers(1000).validate().is_err());
        assert!(RuntimeConfig::new().max_coroutines(0).validate().is_err());
        assert!(RuntimeConfig::new().stack_size(1024).validate().is_err());
    }
}
