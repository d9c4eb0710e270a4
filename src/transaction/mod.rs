//! # Transactions
//!
//! Saga bookkeeping for multi-operation work across plugins.
//!
//! - [`TransactionManager`]: ledger of transaction states (active, committed,
//!   rolled back, failed) and the operation ids each one accepted
//! - [`CompensationManager`]: undo actions keyed by operation id, each run at most once
//!
//! The orchestrator drives both; neither persists anything beyond process memory.

pub mod compensation;
pub mod manager;

pub use compensation::{compensation_fn, CompensationAction, CompensationFn, CompensationManager};
pub use manager::{TransactionManager, TransactionState, TransactionStatus};
