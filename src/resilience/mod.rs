//! # Resilience Module
//!
//! Per-plugin admission control for calls into external task trackers.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: Stop calling a tracker that keeps failing, then probe for recovery
//! - **Rate Limiters**: Token buckets sized from each plugin's advertised quota
//! - **Metrics Collection**: Call counts and state transitions per breaker
//!
//! Each plugin gets at most one of each; the orchestrator owns the tables.
//!
//! ## Usage
//!
//! ```rust
//! use zen_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let circuit_breaker = CircuitBreaker::new("jira", CircuitBreakerConfig::default());
//!
//! let result = circuit_breaker
//!     .execute(|| async { Ok::<&str, std::io::Error>("issue fetched") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod metrics;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerState, CircuitState};
pub use config::{CircuitBreakerConfig, RateLimiterConfig};
pub use metrics::CircuitBreakerMetrics;
pub use rate_limiter::{RateLimiter, RateLimiterState};
