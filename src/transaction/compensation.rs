//! # Compensation Manager
//!
//! Holds the undo actions for successful operations inside a saga.
//!
//! A compensation is registered once per operation id together with the data
//! it needs (typically the created task's external id). It runs at most once:
//! the executed flag is flipped under the entry's shard lock before the action
//! is awaited, so two concurrent rollback paths cannot both invoke it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{ZenError, ZenResult};

pub type CompensationFn = Arc<dyn Fn(Value) -> BoxFuture<'static, ZenResult<()>> + Send + Sync>;

/// Wrap an async closure as a [`CompensationFn`]
pub fn compensation_fn<F, Fut>(f: F) -> CompensationFn
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ZenResult<()>> + Send + 'static,
{
    Arc::new(move |data: Value| -> BoxFuture<'static, ZenResult<()>> { Box::pin(f(data)) })
}

#[derive(Clone)]
pub struct CompensationAction {
    pub operation_id: String,
    pub compensate: CompensationFn,
    /// Captured when registered; handed to `compensate` unchanged
    pub data: Value,
    pub registered_at: DateTime<Utc>,
    pub executed: bool,
    /// Set exactly when `executed` is
    pub executed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl fmt::Debug for CompensationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompensationAction")
            .field("operation_id", &self.operation_id)
            .field("data", &self.data)
            .field("registered_at", &self.registered_at)
            .field("executed", &self.executed)
            .field("executed_at", &self.executed_at)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CompensationManager {
    actions: DashMap<String, CompensationAction>,
}

impl CompensationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the undo action for `operation_id`; an id can be registered once
    pub fn register(&self, operation_id: &str, compensate: CompensationFn, data: Value) -> ZenResult<()> {
        match self.actions.entry(operation_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ZenError::CompensationError {
                operation_id: operation_id.to_string(),
                reason: "compensation already registered".to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(CompensationAction {
                    operation_id: operation_id.to_string(),
                    compensate,
                    data,
                    registered_at: Utc::now(),
                    executed: false,
                    executed_at: None,
                    last_error: None,
                });
                debug!(operation_id = %operation_id, "Compensation registered");
                Ok(())
            }
        }
    }

    /// Run the compensation for `operation_id`.
    ///
    /// Fails when none is registered or it already ran. A failing action stays
    /// marked executed and keeps its error in `last_error`.
    pub async fn execute(&self, operation_id: &str) -> ZenResult<()> {
        let (compensate, data) = {
            let mut action = self.actions.get_mut(operation_id).ok_or_else(|| {
                ZenError::CompensationError {
                    operation_id: operation_id.to_string(),
                    reason: "no compensation registered".to_string(),
                }
            })?;

            if action.executed {
                return Err(ZenError::CompensationError {
                    operation_id: operation_id.to_string(),
                    reason: "compensation already executed".to_string(),
                });
            }
            action.executed = true;
            action.executed_at = Some(Utc::now());
            (Arc::clone(&action.compensate), action.data.clone())
        };

        match compensate(data).await {
            Ok(()) => {
                info!(operation_id = %operation_id, "Compensation executed");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!(operation_id = %operation_id, error = %reason, "Compensation failed");
                if let Some(mut action) = self.actions.get_mut(operation_id) {
                    action.last_error = Some(reason.clone());
                }
                Err(ZenError::CompensationError {
                    operation_id: operation_id.to_string(),
                    reason,
                })
            }
        }
    }

    /// Forget the compensation for `operation_id`; clearing an unknown id is a no-op
    pub fn clear(&self, operation_id: &str) {
        if self.actions.remove(operation_id).is_some() {
            debug!(operation_id = %operation_id, "Compensation cleared");
        }
    }

    pub fn get(&self, operation_id: &str) -> Option<CompensationAction> {
        self.actions.get(operation_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.actions.contains_key(operation_id)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drop executed compensations that ran more than `max_age` ago; returns the count removed
    pub fn cleanup_executed(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let before = self.actions.len();
        self.actions
            .retain(|_, action| !action.executed_at.is_some_and(|at| at < cutoff));
        before.saturating_sub(self.actions.len())
    }
}
