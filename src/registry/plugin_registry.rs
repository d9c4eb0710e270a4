//! # Plugin Registry
//!
//! Thread-safe catalogue of integration plugins and their lifecycle state.
//!
//! ## Overview
//!
//! The PluginRegistry owns every configured adapter from registration to
//! shutdown. It tracks where each plugin is in its lifecycle and keeps the
//! last health report, while the orchestrator only needs the initialized ones.
//!
//! ## Key Features
//!
//! - **Lifecycle management** (register, initialize, shut down)
//! - **Thread-safe plugin management** using RwLock for concurrent access
//! - **Health checks** across every initialized plugin
//! - **Plugin metadata** tracking for diagnostics
//!
//! Plugin calls (initialize, health check, shutdown) run with the registry lock
//! released; state is written back once the call returns.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zen_core::plugin::PluginConfig;
//! use zen_core::registry::PluginRegistry;
//!
//! let registry = PluginRegistry::new();
//! registry.register_plugin(jira_plugin).await?;
//! registry.initialize_plugin("jira", &PluginConfig::new("jira")).await?;
//!
//! let health = registry.health_check_all().await;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{ZenError, ZenResult};
use crate::logging::{log_error, log_plugin_operation};
use crate::plugin::{IntegrationPlugin, PluginConfig, PluginHealth};

/// Plugin metadata tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub registered_at: DateTime<Utc>,
    pub initialized_at: Option<DateTime<Utc>>,
    pub last_health: Option<PluginHealth>,
    pub error_message: Option<String>,
}

/// Plugin state for runtime management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Registered,
    Initialized,
    Failed,
    ShutDown,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Initialized => write!(f, "initialized"),
            Self::Failed => write!(f, "failed"),
            Self::ShutDown => write!(f, "shut_down"),
        }
    }
}

/// Registry view of one plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub metadata: PluginMetadata,
    pub state: PluginState,
}

struct PluginEntry {
    plugin: Arc<dyn IntegrationPlugin>,
    info: PluginInfo,
}

/// Registry for managing plugins
pub struct PluginRegistry {
    plugins: Arc<RwLock<HashMap<String, PluginEntry>>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry").finish_non_exhaustive()
    }
}

fn not_found(name: &str) -> ZenError {
    ZenError::PluginNotFound(name.to_string())
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a plugin under its own name; names are unique
    pub async fn register_plugin(&self, plugin: Arc<dyn IntegrationPlugin>) -> ZenResult<()> {
        let name = plugin.name().to_string();
        let mut plugins = self.plugins.write().await;

        if plugins.contains_key(&name) {
            return Err(ZenError::ConfigurationError(format!(
                "plugin '{name}' is already registered"
            )));
        }

        let info = PluginInfo {
            metadata: PluginMetadata {
                name: name.clone(),
                version: plugin.version().to_string(),
                description: plugin.description().to_string(),
                registered_at: Utc::now(),
                initialized_at: None,
                last_health: None,
                error_message: None,
            },
            state: PluginState::Registered,
        };

        info!(plugin = %name, version = %info.metadata.version, "Registered plugin");
        plugins.insert(name, PluginEntry { plugin, info });
        Ok(())
    }

    /// Remove a plugin without shutting it down
    pub async fn unregister_plugin(&self, name: &str) -> ZenResult<Arc<dyn IntegrationPlugin>> {
        let mut plugins = self.plugins.write().await;
        let entry = plugins.remove(name).ok_or_else(|| not_found(name))?;
        info!(plugin = %name, "Unregistered plugin");
        Ok(entry.plugin)
    }

    async fn plugin_handle(&self, name: &str) -> ZenResult<Arc<dyn IntegrationPlugin>> {
        let plugins = self.plugins.read().await;
        plugins
            .get(name)
            .map(|entry| Arc::clone(&entry.plugin))
            .ok_or_else(|| not_found(name))
    }

    async fn update_info(&self, name: &str, update: impl FnOnce(&mut PluginInfo)) {
        let mut plugins = self.plugins.write().await;
        if let Some(entry) = plugins.get_mut(name) {
            update(&mut entry.info);
        }
    }

    /// Initialize then validate a plugin; failures leave it in `Failed`
    pub async fn initialize_plugin(&self, name: &str, config: &PluginConfig) -> ZenResult<()> {
        let plugin = self.plugin_handle(name).await?;

        let outcome = match plugin.initialize(config).await {
            Ok(()) => plugin.validate().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.update_info(name, |info| {
                    info.state = PluginState::Initialized;
                    info.metadata.initialized_at = Some(Utc::now());
                    info.metadata.error_message = None;
                })
                .await;
                log_plugin_operation("initialize", name, Some(plugin.version()), "initialized", None);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.update_info(name, |info| {
                    info.state = PluginState::Failed;
                    info.metadata.error_message = Some(message.clone());
                })
                .await;
                log_error("plugin_registry", "initialize", &message, Some(name));
                Err(e.into())
            }
        }
    }

    pub async fn get_plugin(&self, name: &str) -> Option<Arc<dyn IntegrationPlugin>> {
        self.plugin_handle(name).await.ok()
    }

    pub async fn plugin_info(&self, name: &str) -> Option<PluginInfo> {
        let plugins = self.plugins.read().await;
        plugins.get(name).map(|entry| entry.info.clone())
    }

    /// All plugins, sorted by name
    pub async fn list_plugins(&self) -> Vec<PluginInfo> {
        let plugins = self.plugins.read().await;
        let mut infos: Vec<_> = plugins.values().map(|entry| entry.info.clone()).collect();
        infos.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        infos
    }

    pub async fn is_plugin_initialized(&self, name: &str) -> bool {
        let plugins = self.plugins.read().await;
        plugins
            .get(name)
            .map(|entry| entry.info.state == PluginState::Initialized)
            .unwrap_or(false)
    }

    /// Plugins ready to serve operations
    pub async fn initialized_plugins(&self) -> Vec<Arc<dyn IntegrationPlugin>> {
        let plugins = self.plugins.read().await;
        plugins
            .values()
            .filter(|entry| entry.info.state == PluginState::Initialized)
            .map(|entry| Arc::clone(&entry.plugin))
            .collect()
    }

    /// Health-check every initialized plugin; a failing check reports unhealthy
    pub async fn health_check_all(&self) -> HashMap<String, PluginHealth> {
        let mut report = HashMap::new();

        for plugin in self.initialized_plugins().await {
            let name = plugin.name().to_string();
            let health = match plugin.health_check().await {
                Ok(health) => health,
                Err(e) => PluginHealth::unhealthy(e.to_string()),
            };

            if !health.healthy {
                warn!(plugin = %name, message = ?health.message, "Plugin unhealthy");
            }
            let recorded = health.clone();
            self.update_info(&name, |info| info.metadata.last_health = Some(recorded))
                .await;
            report.insert(name, health);
        }

        debug!(checked = report.len(), "Plugin health check complete");
        report
    }

    /// Shut down every plugin not already shut down; returns the failures by plugin
    pub async fn shutdown_all(&self) -> HashMap<String, ZenError> {
        let targets: Vec<(String, Arc<dyn IntegrationPlugin>)> = {
            let plugins = self.plugins.read().await;
            plugins
                .iter()
                .filter(|(_, entry)| entry.info.state != PluginState::ShutDown)
                .map(|(name, entry)| (name.clone(), Arc::clone(&entry.plugin)))
                .collect()
        };

        let mut failures = HashMap::new();
        for (name, plugin) in targets {
            match plugin.shutdown().await {
                Ok(()) => log_plugin_operation("shutdown", &name, None, "shut_down", None),
                Err(e) => {
                    error!(plugin = %name, error = %e, "Plugin shutdown failed");
                    failures.insert(name.clone(), ZenError::from(e));
                }
            }
            self.update_info(&name, |info| info.state = PluginState::ShutDown)
                .await;
        }

        info!(failures = failures.len(), "Plugins shut down");
        failures
    }

    /// Get plugin statistics
    pub async fn get_stats(&self) -> PluginStats {
        let plugins = self.plugins.read().await;
        let mut stats = PluginStats::default();

        for entry in plugins.values() {
            stats.total_plugins += 1;
            match entry.info.state {
                PluginState::Registered => stats.registered_plugins += 1,
                PluginState::Initialized => stats.initialized_plugins += 1,
                PluginState::Failed => stats.failed_plugins += 1,
                PluginState::ShutDown => stats.shut_down_plugins += 1,
            }
        }

        stats
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about registered plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginStats {
    pub total_plugins: usize,
    pub registered_plugins: usize,
    pub initialized_plugins: usize,
    pub failed_plugins: usize,
    pub shut_down_plugins: usize,
}
