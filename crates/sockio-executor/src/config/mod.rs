//! Executor configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use sockio_executor::config::ExecutorConfig;
//!
//! // Defaults with env overrides
//! let config = ExecutorConfig::from_env();
//!
//! // Or customize programmatically
//! let config = ExecutorConfig::new()
//!     .io_timeout(Duration::from_secs(5))
//!     .write_chunk_size(4096);
//! ```

pub mod defaults;

use std::time::Duration;

use sockio_core::env::env_get;

/// Executor configuration with builder pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Connect deadline applied to `Timeout::Default`
    pub connect_timeout: Duration,
    /// IO deadline applied to `Timeout::Default`
    pub io_timeout: Duration,
    /// Null-operation passes before a socket is treated as unmanaged
    pub guardian_max_attempts: u32,
    /// Largest slice offered to a single socket write
    pub write_chunk_size: usize,
    /// Selector wait cap while delayed operations poll
    pub delay_poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ExecutorConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `SOCKIO_CONNECT_TIMEOUT_MS` - Default connect deadline
    /// - `SOCKIO_IO_TIMEOUT_MS` - Default IO deadline
    /// - `SOCKIO_GUARDIAN_MAX_ATTEMPTS` - Idle passes before force close
    /// - `SOCKIO_WRITE_CHUNK_SIZE` - Bytes per write call
    /// - `SOCKIO_DELAY_POLL_MS` - Delayed operation poll interval
    pub fn from_env() -> Self {
        Self {
            connect_timeout: Duration::from_millis(env_get(
                "SOCKIO_CONNECT_TIMEOUT_MS",
                defaults::CONNECT_TIMEOUT_MS,
            )),
            io_timeout: Duration::from_millis(env_get(
                "SOCKIO_IO_TIMEOUT_MS",
                defaults::IO_TIMEOUT_MS,
            )),
            guardian_max_attempts: env_get(
                "SOCKIO_GUARDIAN_MAX_ATTEMPTS",
                defaults::GUARDIAN_MAX_ATTEMPTS,
            ),
            write_chunk_size: env_get("SOCKIO_WRITE_CHUNK_SIZE", defaults::WRITE_CHUNK_SIZE),
            delay_poll_interval: Duration::from_millis(env_get(
                "SOCKIO_DELAY_POLL_MS",
                defaults::DELAY_POLL_MS,
            )),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_millis(defaults::CONNECT_TIMEOUT_MS),
            io_timeout: Duration::from_millis(defaults::IO_TIMEOUT_MS),
            guardian_max_attempts: defaults::GUARDIAN_MAX_ATTEMPTS,
            write_chunk_size: defaults::WRITE_CHUNK_SIZE,
            delay_poll_interval: Duration::from_millis(defaults::DELAY_POLL_MS),
        }
    }

    // Builder methods

    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    pub fn io_timeout(mut self, d: Duration) -> Self {
        self.io_timeout = d;
        self
    }

    pub fn guardian_max_attempts(mut self, n: u32) -> Self {
        self.guardian_max_attempts = n;
        self
    }

    pub fn write_chunk_size(mut self, size: usize) -> Self {
        self.write_chunk_size = size;
        self
    }

    pub fn delay_poll_interval(mut self, d: Duration) -> Self {
        self.delay_poll_interval = d;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("connect_timeout must be > 0"));
        }
        if self.io_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("io_timeout must be > 0"));
        }
        if self.guardian_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("guardian_max_attempts must be > 0"));
        }
        if self.write_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("write_chunk_size must be > 0"));
        }
        if self.delay_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue("delay_poll_interval must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("sockio executor configuration:");
        eprintln!("  connect_timeout:        {:?}", self.connect_timeout);
        eprintln!("  io_timeout:             {:?}", self.io_timeout);
        eprintln!("  guardian_max_attempts:  {}", self.guardian_max_attempts);
        eprintln!("  write_chunk_size:       {}", self.write_chunk_size);
        eprintln!("  delay_poll_interval:    {:?}", self.delay_poll_interval);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
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
    fn test_defaults_valid() {
        let config = ExecutorConfig::new();
        assert_eq!(config.guardian_max_attempts, 25);
        assert_eq!(config.write_chunk_size, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ExecutorConfig::new()
            .io_timeout(Duration::from_millis(250))
            .guardian_max_attempts(3)
            .write_chunk_size(16);

        assert_eq!(config.io_timeout, Duration::from_millis(250));
        assert_eq!(config.guardian_max_attempts, 3);
        assert_eq!(config.write_chunk_size, 16);
    }

    #[test]
    fn test_validation() {
        assert!(ExecutorConfig::new().write_chunk_size(0).validate().is_err());
        assert!(ExecutorConfig::new().guardian_max_attempts(0).validate().is_err());
        assert_eq!(
            ExecutorConfig::new().io_timeout(Duration::ZERO).validate(),
            Err(ConfigError::InvalidValue("io_timeout must be > 0"))
        );
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var("SOCKIO_WRITE_CHUNK_SIZE", "512");
        let config = ExecutorConfig::from_env();
        std::env::remove_var("SOCKIO_WRITE_CHUNK_SIZE");
        assert_eq!(config.write_chunk_size, 512);
    }
}
