#![allow(clippy::doc_markdown)] // Allow technical terms like OAuth2, GitHub in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Zen Core
//!
//! Integration orchestration core for the Zen developer CLI.
//!
//! ## Overview
//!
//! Zen talks to external task trackers (Jira, GitHub, Linear, ...) through
//! plugins. This crate sits between the CLI and those plugins and makes the
//! calls safe to repeat, safe to batch and safe to undo:
//!
//! - **Resilience**: a circuit breaker and a token-bucket rate limiter per plugin
//! - **Retries**: exponential, linear or fixed backoff driven by error codes
//! - **Sagas**: ordered multi-operation transactions with reverse-order compensation
//! - **Mapping**: declarative field mapping, transforms and validation between
//!   vendor payloads and the canonical [`models::Task`]
//! - **Auth**: credential acquisition and refresh for basic, API key, bearer
//!   and OAuth2 client-credentials schemes
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Operation and transaction execution
//! - [`plugin`] - The contract every integration implements
//! - [`registry`] - Plugin lifecycle (initialize, health, shutdown)
//! - [`resilience`] - Circuit breakers and rate limiters
//! - [`transaction`] - Transaction ledger and compensation actions
//! - [`mapping`] - Field mapping engine
//! - [`auth`] - Authenticators and the per-plugin token store
//! - [`models`] - Canonical task, operation and sync types
//! - [`config`] - Layered configuration
//! - [`error`] - Error taxonomy
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use zen_core::config::ZenConfig;
//! use zen_core::models::{Operation, Task, Transaction};
//! use zen_core::orchestration::OperationOrchestrator;
//! use zen_core::plugin::IntegrationPlugin;
//!
//! # async fn example(jira: Arc<dyn IntegrationPlugin>, github: Arc<dyn IntegrationPlugin>) -> zen_core::error::ZenResult<()> {
//! zen_core::logging::init_structured_logging();
//!
//! let orchestrator = OperationOrchestrator::with_config(ZenConfig::load(None)?);
//! orchestrator.register_plugin("jira", jira)?;
//! orchestrator.register_plugin("github", github)?;
//!
//! let task = Task::new("zen-42", "Ship the release", "open");
//! let tx = Transaction::new(vec![
//!     Operation::create("jira", task.clone()),
//!     Operation::create("github", task),
//! ]);
//!
//! let result = orchestrator.execute_transaction(&tx, &CancellationToken::new()).await;
//! if !result.success {
//!     println!("rolled back: {:?}", result.error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod models;
pub mod orchestration;
pub mod plugin;
pub mod registry;
pub mod resilience;
pub mod transaction;

pub use config::ZenConfig;
pub use error::{ErrorCode, PluginError, PluginResult, ZenError, ZenResult};
pub use models::{Operation, OperationResult, OperationType, Task, Transaction, TransactionResult};
pub use orchestration::OperationOrchestrator;
pub use plugin::IntegrationPlugin;
pub use registry::PluginRegistry;
