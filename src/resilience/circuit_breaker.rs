//! # Circuit Breaker Implementation
//!
//! Per-plugin admission guard that stops hammering an external tracker once it
//! starts failing. Classic three states: Closed (normal operation), Open
//! (failing fast) and Half-Open (admitting a bounded number of probes).
//!
//! All state lives behind one short-lived mutex so transitions are
//! linearizable per plugin. The lock is never held while the guarded
//! operation runs.

use crate::error::ZenError;
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - limited calls allowed to test plugin health
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> From<CircuitBreakerError<E>> for ZenError
where
    E: Into<ZenError>,
{
    fn from(error: CircuitBreakerError<E>) -> Self {
        match error {
            CircuitBreakerError::CircuitOpen { component } => {
                ZenError::CircuitBreakerOpen { component }
            }
            CircuitBreakerError::OperationFailed(e) => e.into(),
        }
    }
}

/// Point-in-time view of the breaker's state machine
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
    pub half_open_calls: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_calls: u32,
    metrics: CircuitBreakerMetrics,
}

impl BreakerInner {
    fn reset_window_elapsed(&self, reset_timeout: Duration) -> bool {
        match self.last_failure {
            Some(at) => at.elapsed() >= reset_timeout,
            // Open without a timestamp only happens after force_open; let a probe through
            None => true,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    /// Plugin name for logging and metrics
    name: String,

    config: CircuitBreakerConfig,

    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        debug!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            half_open_max_calls = config.half_open_max_calls,
            "Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                half_open_calls: 0,
                metrics: CircuitBreakerMetrics::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state without triggering any transition
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.inner.lock();
        CircuitBreakerState {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure: inner.last_failure,
            half_open_calls: inner.half_open_calls,
        }
    }

    /// Would a call be admitted right now?
    ///
    /// Reports true for an open circuit whose reset window has elapsed, so
    /// callers can see that the next admission will be the recovery probe.
    pub fn is_call_allowed(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => inner.reset_window_elapsed(self.config.reset_timeout),
            CircuitState::HalfOpen => inner.half_open_calls < self.config.half_open_max_calls,
        }
    }

    /// Admit a call, advancing open → half-open when the reset window has passed.
    ///
    /// Every admission must be followed by exactly one `record_success`,
    /// `record_failure` or `release`.
    pub fn try_acquire(&self) -> Result<(), ZenError> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open
            && inner.reset_window_elapsed(self.config.reset_timeout)
        {
            inner.state = CircuitState::HalfOpen;
            inner.half_open_calls = 0;
            info!(
                component = %self.name,
                half_open_max_calls = self.config.half_open_max_calls,
                "Circuit breaker half-open (testing recovery)"
            );
        }

        let admitted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.half_open_calls < self.config.half_open_max_calls {
                    inner.half_open_calls += 1;
                    true
                } else {
                    false
                }
            }
        };

        if admitted {
            Ok(())
        } else {
            inner.metrics.rejected_calls += 1;
            debug!(component = %self.name, state = %inner.state, "Call rejected by circuit breaker");
            Err(ZenError::CircuitBreakerOpen {
                component: self.name.clone(),
            })
        }
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use zen_core::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
    ///
    /// # tokio_test::block_on(async {
    /// let breaker = CircuitBreaker::new(
    ///     "jira",
    ///     CircuitBreakerConfig {
    ///         failure_threshold: 1,
    ///         reset_timeout: Duration::from_secs(30),
    ///         half_open_max_calls: 1,
    ///     },
    /// );
    ///
    /// let failed = breaker.execute(|| async { Err::<(), _>("503") }).await;
    /// assert!(matches!(failed, Err(CircuitBreakerError::OperationFailed("503"))));
    /// assert_eq!(breaker.state(), CircuitState::Open);
    ///
    /// let rejected = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
    /// assert!(matches!(rejected, Err(CircuitBreakerError::CircuitOpen { .. })));
    /// # });
    /// ```
    pub async fn execute<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.try_acquire().is_err() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    pub fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.success_count += 1;
        inner.metrics.total_duration += duration;

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.half_open_calls = 0;
                    info!(
                        component = %self.name,
                        total_calls = inner.metrics.total_calls,
                        "Circuit breaker closed (recovered)"
                    );
                }
            }
            CircuitState::Open => {
                warn!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    pub fn record_failure(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.failure_count += 1;
        inner.metrics.total_duration += duration;

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure while probing reopens immediately
                self.open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    /// Hand back an admission whose call never ran (rate limited, cancelled
    /// before dispatch). Frees the half-open probe slot; records nothing.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.last_failure = Some(Instant::now());
        inner.half_open_calls = 0;
        inner.failure_count = inner.failure_count.min(self.config.failure_threshold);
        inner.metrics.times_opened += 1;

        warn!(
            component = %self.name,
            failure_count = inner.failure_count,
            failure_threshold = self.config.failure_threshold,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            "Circuit breaker opened (failing fast)"
        );
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "Circuit breaker forced open");
        let mut inner = self.inner.lock();
        self.open(&mut inner);
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.half_open_calls = 0;
        inner.last_failure = None;
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        let mut snapshot = inner.metrics.clone();
        snapshot.current_state = inner.state;
        if snapshot.total_calls > 0 {
            snapshot.failure_rate = snapshot.failure_count as f64 / snapshot.total_calls as f64;
        }
        snapshot
    }

    /// Closed with fewer than 10% failures (or too few calls to judge)
    pub fn is_healthy(&self) -> bool {
        let metrics = self.metrics();
        metrics.current_state == CircuitState::Closed
            && (metrics.total_calls < 10 || metrics.failure_rate < 0.1)
    }
}
