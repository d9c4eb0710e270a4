//! # Token Bucket Rate Limiter
//!
//! One bucket per plugin. The bucket holds at most `burst_size` whole tokens
//! and refills lazily at `requests_per_minute / 60` tokens per second: each call
//! adds `⌊elapsed · rate⌋` tokens. The refill clock stays put until at least
//! one whole token accrues, then jumps to `now`, dropping any leftover fraction.

use crate::error::{ZenError, ZenResult};
use crate::resilience::RateLimiterConfig;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Point-in-time view of a bucket
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterState {
    pub tokens: u32,
    pub last_refill: Instant,
    pub burst_size: u32,
    pub requests_per_minute: u32,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    config: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        Self {
            name: name.into(),
            bucket: Mutex::new(Bucket {
                tokens: config.burst_size,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Spend a token if one is available
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    pub(crate) fn allow_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, now);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let accrued = (elapsed.as_secs_f64() * self.config.refill_rate()).floor();

        if accrued >= 1.0 {
            let accrued = accrued.min(f64::from(self.config.burst_size)) as u32;
            bucket.tokens = bucket
                .tokens
                .saturating_add(accrued)
                .min(self.config.burst_size);
            bucket.last_refill = now;
        }
    }

    /// Block until a token is spent or `cancel` fires
    pub async fn wait_for_token(&self, cancel: &CancellationToken) -> ZenResult<()> {
        let poll_interval = self.poll_interval();

        loop {
            if self.allow() {
                return Ok(());
            }

            debug!(
                component = %self.name,
                wait_ms = poll_interval.as_millis() as u64,
                "Waiting for rate limit token"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ZenError::Cancelled(format!(
                        "cancelled while waiting for rate limit token for {}",
                        self.name
                    )));
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// ⌈1 / rate⌉ seconds
    fn poll_interval(&self) -> Duration {
        let rate = self.config.refill_rate();
        if rate <= 0.0 {
            return Duration::from_secs(1);
        }
        Duration::from_secs_f64((1.0 / rate).ceil())
    }

    pub fn available_tokens(&self) -> u32 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    pub fn state(&self) -> RateLimiterState {
        let bucket = self.bucket.lock();
        RateLimiterState {
            tokens: bucket.tokens,
            last_refill: bucket.last_refill,
            burst_size: self.config.burst_size,
            requests_per_minute: self.config.requests_per_minute,
        }
    }
}
