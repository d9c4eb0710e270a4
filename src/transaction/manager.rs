//! # Transaction Manager
//!
//! In-memory ledger of saga transactions. Each transaction starts `Active`,
//! collects the ids of the operations it accepted, and ends in exactly one
//! terminal status. Terminal states are final; nothing re-opens a transaction.
//!
//! Entries stay in the ledger after they end so callers can inspect the
//! outcome, until [`TransactionManager::cleanup_completed`] ages them out.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ZenError, ZenResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled_back"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionState {
    pub id: String,
    pub status: TransactionStatus,
    /// Accepted operation ids, in submission order
    pub operations: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct TransactionManager {
    transactions: DashMap<String, TransactionState>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new active transaction; ids are unique for as long as the entry lives
    pub fn begin(&self, id: &str) -> ZenResult<()> {
        match self.transactions.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ZenError::TransactionError(
                format!("transaction {id} already exists"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(TransactionState {
                    id: id.to_string(),
                    status: TransactionStatus::Active,
                    operations: Vec::new(),
                    start_time: Utc::now(),
                    end_time: None,
                });
                debug!(transaction_id = %id, "Transaction started");
                Ok(())
            }
        }
    }

    /// Record an accepted operation; the transaction must be active
    pub fn add_operation(&self, id: &str, operation_id: &str) -> ZenResult<()> {
        let mut state = self.active_entry(id)?;
        state.operations.push(operation_id.to_string());
        Ok(())
    }

    pub fn commit(&self, id: &str) -> ZenResult<()> {
        self.finish(id, TransactionStatus::Committed)
    }

    pub fn rollback(&self, id: &str) -> ZenResult<()> {
        self.finish(id, TransactionStatus::RolledBack)
    }

    /// Terminal state for a saga that could neither commit nor roll back cleanly
    pub fn mark_failed(&self, id: &str) -> ZenResult<()> {
        self.finish(id, TransactionStatus::Failed)
    }

    fn active_entry(
        &self,
        id: &str,
    ) -> ZenResult<dashmap::mapref::one::RefMut<'_, String, TransactionState>> {
        let state = self
            .transactions
            .get_mut(id)
            .ok_or_else(|| ZenError::TransactionError(format!("transaction {id} not found")))?;

        if state.status != TransactionStatus::Active {
            return Err(ZenError::TransactionError(format!(
                "transaction {id} is {}, not active",
                state.status
            )));
        }
        Ok(state)
    }

    fn finish(&self, id: &str, status: TransactionStatus) -> ZenResult<()> {
        let mut state = self.active_entry(id)?;
        state.status = status;
        state.end_time = Some(Utc::now());

        match status {
            TransactionStatus::Committed => info!(
                transaction_id = %id,
                operations = state.operations.len(),
                "Transaction committed"
            ),
            _ => warn!(
                transaction_id = %id,
                status = %status,
                operations = state.operations.len(),
                "Transaction ended without commit"
            ),
        }
        Ok(())
    }

    /// Snapshot of a transaction's current state
    pub fn get_transaction(&self, id: &str) -> Option<TransactionState> {
        self.transactions.get(id).map(|entry| entry.value().clone())
    }

    pub fn active_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|entry| entry.value().status == TransactionStatus::Active)
            .count()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Drop finished transactions whose `end_time` is older than `max_age`.
    ///
    /// Returns the number removed. Active transactions are never removed.
    pub fn cleanup_completed(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let before = self.transactions.len();
        self.transactions
            .retain(|_, state| !state.end_time.is_some_and(|ended| ended < cutoff));
        let removed = before.saturating_sub(self.transactions.len());

        if removed > 0 {
            debug!(removed = removed, "Cleaned up completed transactions");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_rejects_duplicate_ids() {
        let manager = TransactionManager::new();
        manager.begin("tx-1").unwrap();
        assert!(manager.begin("tx-1").is_err());
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_operations_recorded_in_order() {
        let manager = TransactionManager::new();
        manager.begin("tx-1").unwrap();
        manager.add_operation("tx-1", "op-a").unwrap();
        manager.add_operation("tx-1", "op-b").unwrap();

        let state = manager.get_transaction("tx-1").unwrap();
        assert_eq!(state.operations, vec!["op-a", "op-b"]);
        assert_eq!(state.status, TransactionStatus::Active);
        assert!(state.end_time.is_none());

        assert!(manager.add_operation("missing", "op-c").is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let manager = TransactionManager::new();
        manager.begin("tx-1").unwrap();
        manager.commit("tx-1").unwrap();

        assert!(manager.add_operation("tx-1", "late").is_err());
        assert!(manager.rollback("tx-1").is_err());
        assert!(manager.commit("tx-1").is_err());
        assert!(manager.mark_failed("tx-1").is_err());

        let state = manager.get_transaction("tx-1").unwrap();
        assert_eq!(state.status, TransactionStatus::Committed);
        assert!(state.end_time.is_some());
    }

    #[test]
    fn test_rollback_and_failed() {
        let manager = TransactionManager::new();
        manager.begin("tx-1").unwrap();
        manager.begin("tx-2").unwrap();
        manager.rollback("tx-1").unwrap();
        manager.mark_failed("tx-2").unwrap();

        assert_eq!(
            manager.get_transaction("tx-1").unwrap().status,
            TransactionStatus::RolledBack
        );
        assert_eq!(
            manager.get_transaction("tx-2").unwrap().status,
            TransactionStatus::Failed
        );
        assert_eq!(manager.active_count(), 0);
        assert!(manager.rollback("missing").is_err());
    }

    #[tokio::test]
    async fn test_cleanup_completed_keeps_active_and_recent() {
        let manager = TransactionManager::new();
        manager.begin("old").unwrap();
        manager.commit("old").unwrap();
        manager.begin("running").unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.begin("recent").unwrap();
        manager.rollback("recent").unwrap();

        assert_eq!(manager.cleanup_completed(Duration::from_millis(15)), 1);
        assert!(manager.get_transaction("old").is_none());
        assert!(manager.get_transaction("running").is_some());
        assert!(manager.get_transaction("recent").is_some());

        assert_eq!(manager.cleanup_completed(Duration::from_secs(3600)), 0);
        assert_eq!(manager.len(), 2);
    }
}
