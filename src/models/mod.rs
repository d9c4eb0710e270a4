pub mod operation;
pub mod sync;
pub mod task;

// Re-export core models for easy access
pub use operation::{
    BackoffStrategy, Operation, OperationData, OperationResult, OperationType, RetryPolicy,
    SearchQuery, Transaction, TransactionResult,
};
pub use sync::{FieldChange, SyncConflict, SyncDirection, SyncMetadata, SyncResult};
pub use task::Task;
