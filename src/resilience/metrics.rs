//! # Circuit Breaker Metrics
//!
//! Counters kept by each circuit breaker, snapshotted on demand.

use crate::resilience::CircuitState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metrics for a single circuit breaker instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Calls that ran (rejections excluded)
    pub total_calls: u64,

    pub success_count: u64,

    pub failure_count: u64,

    /// Calls refused while open or half-open saturated
    pub rejected_calls: u64,

    /// Times the circuit went closed/half-open → open
    pub times_opened: u64,

    pub total_duration: Duration,

    pub current_state: CircuitState,

    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_calls: 0,
            times_opened: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
            failure_rate: 0.0,
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.total_calls == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.total_calls as u32
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Failures: {} | Rejected: {} | Avg Duration: {}ms",
            self.current_state,
            self.total_calls,
            self.failure_count,
            self.rejected_calls,
            self.average_duration().as_millis()
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
