//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. Builder methods
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use umsched_runtime::config::UmsConfig;
//!
//! // Use defaults with env overrides
//! let config = UmsConfig::from_env();
//!
//! // Or customize programmatically
//! let config = UmsConfig::from_env()
//!     .num_cpus(4)
//!     .pin_carriers(false);
//! ```

pub mod defaults;

use umsched_core::constants::MAX_CPUS;
use umsched_core::env::{env_get, env_get_bool};

use crate::platform;

/// Runtime configuration with builder pattern.
///
/// Use `from_env()` to start with library defaults and apply any
/// environment variable overrides.
#[derive(Debug, Clone)]
pub struct UmsConfig {
    /// Carrier worker slots (one per CPU)
    pub num_cpus: usize,
    /// Maximum live execution contexts
    pub max_contexts: usize,
    /// Default reservation batch for dispatch helpers
    pub reserve_batch: u32,
    /// Pin carrier threads to their CPU
    pub pin_carriers: bool,
    /// Enable debug logging
    pub debug_logging: bool,
    /// Stack size per completion element thread
    pub stack_size: usize,
}

impl Default for UmsConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl UmsConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UMS_NUM_CPUS` - Carrier worker slots
    /// - `UMS_MAX_CONTEXTS` - Max live execution contexts
    /// - `UMS_RESERVE_BATCH` - Default reservation batch size
    /// - `UMS_PIN_CARRIERS` - Pin carriers to CPUs (0/1)
    /// - `UMS_DEBUG` - Enable debug logging (0/1)
    /// - `UMS_STACK_SIZE` - Stack size per element thread
    pub fn from_env() -> Self {
        Self {
            num_cpus: env_get("UMS_NUM_CPUS", platform::num_cpus()).min(MAX_CPUS),
            max_contexts: env_get("UMS_MAX_CONTEXTS", defaults::MAX_CONTEXTS),
            reserve_batch: env_get("UMS_RESERVE_BATCH", defaults::RESERVE_BATCH),
            pin_carriers: env_get_bool("UMS_PIN_CARRIERS", defaults::PIN_CARRIERS),
            debug_logging: env_get_bool("UMS_DEBUG", defaults::DEBUG_LOGGING),
            stack_size: env_get("UMS_STACK_SIZE", defaults::STACK_SIZE),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            num_cpus: platform::num_cpus(),
            max_contexts: defaults::MAX_CONTEXTS,
            reserve_batch: defaults::RESERVE_BATCH,
            pin_carriers: defaults::PIN_CARRIERS,
            debug_logging: defaults::DEBUG_LOGGING,
            stack_size: defaults::STACK_SIZE,
        }
    }

    // Builder methods

    pub fn num_cpus(mut self, n: usize) -> Self {
        self.num_cpus = n;
        self
    }

    pub fn max_contexts(mut self, n: usize) -> Self {
        self.max_contexts = n;
        self
    }

    pub fn reserve_batch(mut self, n: u32) -> Self {
        self.reserve_batch = n;
        self
    }

    pub fn pin_carriers(mut self, enable: bool) -> Self {
        self.pin_carriers = enable;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cpus == 0 {
            return Err(ConfigError::InvalidValue("num_cpus must be > 0"));
        }
        if self.num_cpus > MAX_CPUS {
            return Err(ConfigError::InvalidValue("num_cpus exceeds MAX_CPUS"));
        }
        if self.max_contexts <= self.num_cpus {
            return Err(ConfigError::InvalidValue(
                "max_contexts must exceed num_cpus (carriers bind contexts too)",
            ));
        }
        if self.reserve_batch == 0 {
            return Err(ConfigError::InvalidValue("reserve_batch must be > 0"));
        }
        if self.stack_size < 64 * 1024 {
            return Err(ConfigError::InvalidValue("stack_size must be >= 64KB"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("umsched Configuration:");
        eprintln!("  num_cpus:       {}", self.num_cpus);
        eprintln!("  max_contexts:   {}", self.max_contexts);
        eprintln!("  reserve_batch:  {}", self.reserve_batch);
        eprintln!("  pin_carriers:   {}", self.pin_carriers);
        eprintln!("  debug_logging:  {}", self.debug_logging);
        eprintln!("  stack_size:     {}", self.stack_size);
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
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env() {
        let config = UmsConfig::from_env();
        assert!(config.num_cpus >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = UmsConfig::new()
            .num_cpus(4)
            .reserve_batch(3)
            .pin_carriers(false);

        assert_eq!(config.num_cpus, 4);
        assert_eq!(config.reserve_batch, 3);
        assert!(!config.pin_carriers);
    }

    #[test]
    fn test_validation() {
        assert!(UmsConfig::new().num_cpus(0).validate().is_err());
        assert!(UmsConfig::new().reserve_batch(0).validate().is_err());
        assert!(UmsConfig::new().stack_size(1024).validate().is_err());
        assert!(UmsConfig::new()
            .num_cpus(8)
            .max_contexts(8)
            .validate()
            .is_err());
    }
}
