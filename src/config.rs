//! # Configuration
//!
//! Layered settings for the orchestration core.
//!
//! ## Sources
//!
//! 1. Built-in defaults (every section is `#[serde(default)]`)
//! 2. An optional YAML, TOML or JSON file
//! 3. Environment overrides with the `ZEN` prefix and `__` as the nesting
//!    separator, e.g. `ZEN__ORCHESTRATOR__MAX_RETRIES=5`
//!
//! Durations are written as integer `_ms`/`_secs` fields so they read
//! naturally from both files and environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zen_core::config::ZenConfig;
//!
//! # fn main() -> zen_core::error::ZenResult<()> {
//! let config = ZenConfig::load(Some("config/zen.yaml".as_ref()))?;
//! println!("retries: {}", config.orchestrator.max_retries);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{ZenError, ZenResult};
use crate::models::{BackoffStrategy, RetryPolicy};
use crate::plugin::RateLimitInfo;
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig};

pub const ENV_PREFIX: &str = "ZEN";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenConfig {
    pub orchestrator: OrchestratorConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub rate_limit: RateLimitSettings,
    pub auth: AuthSettings,
    pub logging: LoggingConfig,
}

impl ZenConfig {
    /// Load from an optional file plus `ZEN__*` environment overrides
    pub fn load(path: Option<&Path>) -> ZenResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`ZenConfig::load`] with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> ZenResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ZenError::ConfigurationError(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("orchestrator.retryable_errors"),
        );

        let config: ZenConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            file = ?path.map(|p| p.display().to_string()),
            max_retries = config.orchestrator.max_retries,
            wait_for_rate_limit = config.orchestrator.wait_for_rate_limit,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> ZenResult<()> {
        let checks = [
            ("orchestrator", self.orchestrator.validate()),
            ("circuit_breaker", self.circuit_breaker.to_config().validate()),
            ("rate_limit", self.rate_limit.validate()),
        ];

        let problems: Vec<String> = checks
            .into_iter()
            .filter_map(|(section, check)| check.err().map(|e| format!("{section}: {e}")))
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ZenError::ConfigurationError(problems.join("; ")))
        }
    }
}

/// Orchestrator-wide defaults applied when an operation does not carry its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_strategy: BackoffStrategy,
    pub retryable_errors: Vec<String>,
    pub jitter: bool,
    /// Block on an empty token bucket instead of failing with RATE_LIMITED
    pub wait_for_rate_limit: bool,
    pub operation_timeout_secs: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_strategy: policy.strategy,
            retryable_errors: Vec::new(),
            jitter: false,
            wait_for_rate_limit: false,
            operation_timeout_secs: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            strategy: self.backoff_strategy,
            retryable_errors: self.retryable_errors.clone(),
            jitter: self.jitter,
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(format!(
                "base_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ));
        }

        if self.operation_timeout_secs == Some(0) {
            return Err("operation_timeout_secs must be greater than 0".to_string());
        }

        if let Some(code) = self
            .retryable_errors
            .iter()
            .find(|code| code.parse::<crate::error::ErrorCode>().is_err())
        {
            return Err(format!("unknown error code in retryable_errors: {code}"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            reset_timeout_ms: defaults.reset_timeout.as_millis() as u64,
            half_open_max_calls: defaults.half_open_max_calls,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            half_open_max_calls: self.half_open_max_calls,
        }
    }
}

/// Per-plugin overrides of the quota a plugin advertises
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub overrides: HashMap<String, RateLimitInfo>,
}

impl RateLimitSettings {
    /// Bucket sizing for `plugin`: the configured override, else what it advertises
    pub fn for_plugin(&self, plugin: &str, advertised: RateLimitInfo) -> RateLimiterConfig {
        self.overrides
            .get(plugin)
            .copied()
            .unwrap_or(advertised)
            .into()
    }

    pub fn validate(&self) -> Result<(), String> {
        for (plugin, info) in &self.overrides {
            if info.requests_per_hour == 0 || info.burst == 0 {
                return Err(format!(
                    "override for {plugin} needs non-zero requests_per_hour and burst"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Refresh tokens this long before they expire
    pub refresh_grace_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            refresh_grace_secs: 300,
        }
    }
}

impl AuthSettings {
    /// Grace window in the form [`crate::auth::AuthManager::ensure_valid_token`] takes
    pub fn refresh_grace(&self) -> chrono::Duration {
        chrono::Duration::from_std(Duration::from_secs(self.refresh_grace_secs))
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `ZEN_LOG` wins when set
    pub level: Option<String>,
    /// Also write JSON lines under `directory`
    pub file_output: bool,
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            file_output: false,
            directory: "log".to_string(),
        }
    }
}
