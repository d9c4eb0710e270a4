#![allow(dead_code)]

pub mod mock_plugin;

pub use mock_plugin::*;

use std::time::Duration;
use zen_core::config::ZenConfig;
use zen_core::models::RetryPolicy;

/// Retry policy with millisecond delays so retry tests stay fast
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    }
}

/// Default configuration with fast orchestrator-level retries
pub fn test_config() -> ZenConfig {
    let mut config = ZenConfig::default();
    config.orchestrator.base_delay_ms = 1;
    config.orchestrator.max_delay_ms = 5;
    config
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("zen_core=debug")
        .with_test_writer()
        .try_init();
}
