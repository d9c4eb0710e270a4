//! # Orchestration Engine
//!
//! Resilient execution of plugin operations and multi-plugin sagas.
//!
//! ## Core Components
//!
//! - **OperationOrchestrator**: admission control, retries, cancellation and
//!   saga execution over the registered plugins
//! - **BackoffCalculator**: exponential, linear and fixed retry delays with
//!   optional jitter
//! - **OperationMetrics**: counters for every outcome, overall and per plugin
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use zen_core::models::Operation;
//! use zen_core::orchestration::OperationOrchestrator;
//! use zen_core::plugin::IntegrationPlugin;
//!
//! # async fn example(jira: Arc<dyn IntegrationPlugin>) -> zen_core::error::ZenResult<()> {
//! let orchestrator = OperationOrchestrator::new();
//! orchestrator.register_plugin("jira", jira)?;
//!
//! let result = orchestrator
//!     .execute_operation(&Operation::fetch("jira", "PROJ-123"), &CancellationToken::new())
//!     .await;
//! println!("success={} retries={}", result.success, result.retry_count);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod metrics;
pub mod orchestrator;

pub use backoff::{BackoffCalculator, MAX_JITTER};
pub use metrics::{OperationMetrics, PluginOperationMetrics};
pub use orchestrator::OperationOrchestrator;
