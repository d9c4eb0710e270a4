//! # Registry Infrastructure
//!
//! Lifecycle tracking for integration plugins.
//!
//! ## Overview
//!
//! The orchestrator keeps its own per-plugin resilience tables; this module
//! owns the plugins themselves from registration to shutdown, so a host can
//! initialize adapters from configuration, health-check them and hand the
//! ready ones to the orchestrator.
//!
//! ```text
//! Registry Infrastructure
//! └── PluginRegistry   (register → initialize → health check → shut down)
//! ```

pub mod plugin_registry;

pub use plugin_registry::{PluginInfo, PluginMetadata, PluginRegistry, PluginState, PluginStats};
