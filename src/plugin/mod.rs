//! # Plugin Contract
//!
//! The capability set every task-tracker adapter (Jira, GitHub, Linear, ...)
//! implements to plug into the orchestration core.
//!
//! ## Overview
//!
//! The orchestrator only ever sees `Arc<dyn IntegrationPlugin>`. It dispatches
//! each [`OperationType`] to the matching task method, sizes the plugin's rate
//! limiter from [`IntegrationPlugin::get_rate_limit_info`], and asks
//! [`IntegrationPlugin::compensation_for`] for the undo action of every
//! successful operation inside a transaction.
//!
//! Errors cross the boundary as [`PluginError`] values so the retry policy
//! can read their code and retryable flag. Adapters translating HTTP failures
//! should go through [`PluginError::from_http_status`].
//!
//! [`PluginError`]: crate::error::PluginError
//! [`PluginError::from_http_status`]: crate::error::PluginError::from_http_status

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::auth::AuthConfig;
use crate::error::PluginResult;
use crate::mapping::FieldMappingConfig;
use crate::models::{Operation, OperationResult, OperationType, SearchQuery, SyncMetadata, SyncResult, Task};
use crate::resilience::RateLimiterConfig;
use crate::transaction::CompensationFn;

/// Free-form per-call options forwarded from [`Operation::options`]
pub type OperationOptions = HashMap<String, Value>;

/// Quota a plugin advertises for its remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub requests_per_hour: u32,
    pub burst: u32,
}

impl Default for RateLimitInfo {
    fn default() -> Self {
        Self {
            requests_per_hour: 300,
            burst: 10,
        }
    }
}

impl From<RateLimitInfo> for RateLimiterConfig {
    fn from(info: RateLimitInfo) -> Self {
        RateLimiterConfig::from_hourly(info.requests_per_hour, info.burst)
    }
}

/// Settings handed to [`IntegrationPlugin::initialize`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitInfo>,
    #[serde(default)]
    pub field_mapping: Option<FieldMappingConfig>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Plugin-specific keys (project key, repository, team id, ...)
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl PluginConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginHealth {
    pub healthy: bool,
    pub message: Option<String>,
    pub latency: Option<Duration>,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub details: HashMap<String, Value>,
}

impl PluginHealth {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
            latency: None,
            checked_at: Utc::now(),
            details: HashMap::new(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            ..Self::healthy()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// Undo action a plugin offers for one of its successful operations
#[derive(Clone)]
pub struct Compensation {
    pub action: CompensationFn,
    /// Passed to `action` when the saga rolls back
    pub data: Value,
}

impl std::fmt::Debug for Compensation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compensation")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// Adapter to one external task-tracking system
#[async_trait]
pub trait IntegrationPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str;

    async fn initialize(&self, config: &PluginConfig) -> PluginResult<()>;

    /// Check configuration and credentials without mutating remote state
    async fn validate(&self) -> PluginResult<()>;

    async fn health_check(&self) -> PluginResult<PluginHealth>;

    async fn shutdown(&self) -> PluginResult<()>;

    async fn fetch_task(&self, external_id: &str, options: &OperationOptions) -> PluginResult<Task>;

    /// Returns the created task with its assigned `external_id`
    async fn create_task(&self, task: &Task, options: &OperationOptions) -> PluginResult<Task>;

    async fn update_task(
        &self,
        external_id: &str,
        task: &Task,
        options: &OperationOptions,
    ) -> PluginResult<Task>;

    async fn delete_task(&self, external_id: &str, options: &OperationOptions) -> PluginResult<()>;

    async fn search_tasks(
        &self,
        query: &SearchQuery,
        options: &OperationOptions,
    ) -> PluginResult<Vec<Task>>;

    async fn sync_task(&self, task_id: &str, options: &OperationOptions) -> PluginResult<SyncResult>;

    async fn get_sync_metadata(&self, task_id: &str) -> PluginResult<Option<SyncMetadata>>;

    fn map_to_canonical(&self, external: &Value) -> PluginResult<Task>;

    fn map_to_external(&self, task: &Task) -> PluginResult<Value>;

    fn get_auth_config(&self) -> Option<AuthConfig>;

    fn get_rate_limit_info(&self) -> RateLimitInfo {
        RateLimitInfo::default()
    }

    fn supports_operation(&self, operation_type: OperationType) -> bool {
        let _ = operation_type;
        true
    }

    /// Undo action for `operation`, which just succeeded with `result` inside a transaction.
    ///
    /// Returning `None` leaves the operation without automatic compensation.
    fn compensation_for(&self, operation: &Operation, result: &OperationResult) -> Option<Compensation> {
        let _ = (operation, result);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate_limit_info() {
        let info = RateLimitInfo::default();
        assert_eq!(info.requests_per_hour, 300);
        assert_eq!(info.burst, 10);

        let config = RateLimiterConfig::from(info);
        assert_eq!(config.requests_per_minute, 5);
        assert_eq!(config.burst_size, 10);
    }

    #[test]
    fn test_plugin_config_deserializes() {
        let config: PluginConfig = serde_json::from_value(serde_json::json!({
            "name": "jira",
            "base_url": "https://example.atlassian.net",
            "auth": {"auth_type": "basic", "username": "me", "password": "token"},
            "rate_limit": {"requests_per_hour": 1200, "burst": 20},
            "timeout_secs": 15,
            "settings": {"project_key": "ZEN"}
        }))
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.rate_limit.unwrap().requests_per_hour, 1200);
        assert_eq!(config.settings["project_key"], "ZEN");
    }

    #[test]
    fn test_health_constructors() {
        assert!(PluginHealth::healthy().healthy);
        let down = PluginHealth::unhealthy("503 from API");
        assert!(!down.healthy);
        assert_eq!(down.message.as_deref(), Some("503 from API"));
    }
}
