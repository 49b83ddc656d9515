use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A [`ResilienceConfig`] value that would stop a stage from making progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("timeout_ms must be positive")]
    ZeroTimeout,
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("breaker_threshold must be at least 1")]
    ZeroBreakerThreshold,
    #[error("half_open_successes must be at least 1")]
    ZeroHalfOpenSuccesses,
}

/// Parameters of the four resilience stages.
///
/// Durations are stored in milliseconds so the struct reads naturally from
/// TOML; use the accessor methods to get [`Duration`] values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Deadline for a single attempt; a timed-out attempt is retried.
    pub timeout_ms: u64,
    /// Window in which an identical call joins the in-flight one.
    pub debounce_ms: u64,
    /// Total attempts made by the retry stage (first call included).
    pub max_attempts: u32,
    /// Pause between retry attempts.
    pub backoff_ms: u64,
    /// Consecutive failures that open the circuit breaker.
    pub breaker_threshold: u32,
    /// How long an open breaker rejects calls before probing.
    pub breaker_cooldown_ms: u64,
    /// Successful probes needed to close a half-open breaker.
    pub half_open_successes: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            debounce_ms: 100,
            max_attempts: 3,
            backoff_ms: 5_000,
            breaker_threshold: 3,
            breaker_cooldown_ms: 30_000,
            half_open_successes: 1,
        }
    }
}

impl ResilienceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_millis(self.breaker_cooldown_ms)
    }

    /// Check that every stage can make progress with these values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.breaker_threshold == 0 {
            return Err(ConfigError::ZeroBreakerThreshold);
        }
        if self.half_open_successes == 0 {
            return Err(ConfigError::ZeroHalfOpenSuccesses);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.debounce_window(), Duration::from_millis(100));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff(), Duration::from_secs(5));
        assert_eq!(config.breaker_threshold, 3);
        assert_eq!(config.breaker_cooldown(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ResilienceConfig = toml::from_str("max_attempts = 5\nbackoff_ms = 10").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff(), Duration::from_millis(10));
        assert_eq!(config.timeout_ms, 5_000);
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = ResilienceConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroAttempts));
    }

    #[test]
    fn each_zero_field_has_its_own_error() {
        let zero_timeout = ResilienceConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(zero_timeout.validate(), Err(ConfigError::ZeroTimeout));

        let zero_threshold = ResilienceConfig {
            breaker_threshold: 0,
            ..Default::default()
        };
        assert_eq!(zero_threshold.validate(), Err(ConfigError::ZeroBreakerThreshold));
        assert_eq!(
            ConfigError::ZeroBreakerThreshold.to_string(),
            "breaker_threshold must be at least 1"
        );

        let zero_probes = ResilienceConfig {
            half_open_successes: 0,
            ..Default::default()
        };
        assert_eq!(zero_probes.validate(), Err(ConfigError::ZeroHalfOpenSuccesses));
    }
}
