//! # Resilience Configuration
//!
//! Per-plugin circuit breaker and token bucket settings, with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single plugin's circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (while closed) before opening the circuit
    pub failure_threshold: u32,

    /// Time to stay open before admitting a recovery probe
    pub reset_timeout: Duration,

    /// Calls admitted in half-open; that many successes close the circuit
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.reset_timeout.is_zero() {
            return Err("reset_timeout must be greater than 0".to_string());
        }

        if self.half_open_max_calls == 0 {
            return Err("half_open_max_calls must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

/// Token bucket sizing for a single plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

impl RateLimiterConfig {
    /// Size a bucket from a vendor's hourly quota
    pub fn from_hourly(requests_per_hour: u32, burst_size: u32) -> Self {
        Self {
            requests_per_minute: (requests_per_hour / 60).max(1),
            burst_size,
        }
    }

    /// Tokens added per second
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.requests_per_minute == 0 {
            return Err("requests_per_minute must be greater than 0".to_string());
        }

        if self.burst_size == 0 {
            return Err("burst_size must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::from_hourly(300, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let breaker = CircuitBreakerConfig::default();
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.reset_timeout, Duration::from_secs(30));
        assert_eq!(breaker.half_open_max_calls, 3);
        assert!(breaker.validate().is_ok());

        let limiter = RateLimiterConfig::default();
        assert_eq!(limiter.requests_per_minute, 5);
        assert_eq!(limiter.burst_size, 10);
    }

    #[test]
    fn test_hourly_conversion() {
        assert_eq!(RateLimiterConfig::from_hourly(5000, 20).requests_per_minute, 83);
        // Quotas under one request per minute still make progress
        assert_eq!(RateLimiterConfig::from_hourly(30, 1).requests_per_minute, 1);
    }

    #[test]
    fn test_validation_rejects_zeroes() {
        let config = CircuitBreakerConfig {
            failure_threshold: 0,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RateLimiterConfig {
            requests_per_minute: 60,
            burst_size: 0,
        };
        assert!(config.validate().is_err());
    }
}
