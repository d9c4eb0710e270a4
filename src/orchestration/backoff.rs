//! # Backoff Calculator
//!
//! Delay between retry attempts of a single operation.
//!
//! ## Strategies
//!
//! - **Exponential**: `min(base · 2^attempt, max_delay)`
//! - **Linear**: `min(base · (attempt + 1), max_delay)`
//! - **Fixed**: `base`
//!
//! With [`RetryPolicy::jitter`] set, the delay is spread by up to ±10% using a
//! seeded `fastrand` generator, so tests can pin the sequence with
//! [`BackoffCalculator::with_seed`].

use parking_lot::Mutex;
use std::time::Duration;

use crate::models::{BackoffStrategy, RetryPolicy};

/// Maximum jitter as a fraction of the delay
pub const MAX_JITTER: f64 = 0.1;

#[derive(Debug)]
pub struct BackoffCalculator {
    rng: Mutex<fastrand::Rng>,
}

impl BackoffCalculator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Delay to sleep after failed attempt number `attempt` (zero-based)
    pub fn delay(&self, policy: &RetryPolicy, attempt: u32) -> Duration {
        let delay = Self::base_delay(policy, attempt);
        if policy.jitter {
            self.apply_jitter(delay)
        } else {
            delay
        }
    }

    /// Delay before jitter
    pub fn base_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
        match policy.strategy {
            BackoffStrategy::Exponential => 2u32
                .checked_pow(attempt)
                .and_then(|factor| policy.base_delay.checked_mul(factor))
                .map_or(policy.max_delay, |delay| delay.min(policy.max_delay)),
            BackoffStrategy::Linear => policy
                .base_delay
                .checked_mul(attempt.saturating_add(1))
                .map_or(policy.max_delay, |delay| delay.min(policy.max_delay)),
            BackoffStrategy::Fixed => policy.base_delay,
        }
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if delay.is_zero() {
            return delay;
        }
        // Uniform in [-MAX_JITTER, +MAX_JITTER)
        let spread = (self.rng.lock().f64() * 2.0 - 1.0) * MAX_JITTER;
        delay.mul_f64(1.0 + spread)
    }
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: BackoffStrategy) -> RetryPolicy {
        RetryPolicy {
            strategy,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let calculator = BackoffCalculator::new();
        let exponential = policy(BackoffStrategy::Exponential);

        assert_eq!(calculator.delay(&exponential, 0), Duration::from_secs(1));
        assert_eq!(calculator.delay(&exponential, 2), Duration::from_secs(4));
        assert_eq!(calculator.delay(&exponential, 6), Duration::from_secs(30));
        assert_eq!(calculator.delay(&exponential, 64), Duration::from_secs(30));
    }

    #[test]
    fn test_linear_and_fixed() {
        let calculator = BackoffCalculator::new();
        let linear = policy(BackoffStrategy::Linear);
        assert_eq!(calculator.delay(&linear, 0), Duration::from_secs(1));
        assert_eq!(calculator.delay(&linear, 4), Duration::from_secs(5));
        assert_eq!(calculator.delay(&linear, 100), Duration::from_secs(30));

        let fixed = policy(BackoffStrategy::Fixed);
        assert_eq!(calculator.delay(&fixed, 0), Duration::from_secs(1));
        assert_eq!(calculator.delay(&fixed, 9), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let calculator = BackoffCalculator::with_seed(42);
        let jittered = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };

        for attempt in 0..8 {
            let base = BackoffCalculator::base_delay(&jittered, attempt).as_secs_f64();
            let delay = calculator.delay(&jittered, attempt).as_secs_f64();
            assert!(delay >= base * 0.9 - 1e-9, "{delay} below {base}");
            assert!(delay <= base * 1.1 + 1e-9, "{delay} above {base}");
        }
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let jittered = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };
        let a = BackoffCalculator::with_seed(7);
        let b = BackoffCalculator::with_seed(7);

        let left: Vec<_> = (0..5).map(|n| a.delay(&jittered, n)).collect();
        let right: Vec<_> = (0..5).map(|n| b.delay(&jittered, n)).collect();
        assert_eq!(left, right);
    }
}
