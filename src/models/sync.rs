//! Sync bookkeeping shared between plugins and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of data flow relative to the canonical model.
///
/// `Pull` is external → canonical, `Push` is canonical → external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Pull,
    Push,
    Bidirectional,
}

impl SyncDirection {
    /// Whether an item declared with `self` participates in a pass going `direction`
    pub fn applies_to(&self, direction: SyncDirection) -> bool {
        *self == SyncDirection::Bidirectional || *self == direction
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull => write!(f, "pull"),
            Self::Push => write!(f, "push"),
            Self::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            "bidirectional" => Ok(Self::Bidirectional),
            _ => Err(format!("Invalid sync direction: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub field: String,
    pub local_value: Option<serde_json::Value>,
    pub remote_value: Option<serde_json::Value>,
    pub resolution: Option<String>,
}

/// Outcome of a `sync` operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub task_id: String,
    pub external_id: Option<String>,
    pub direction: SyncDirection,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    #[serde(default)]
    pub conflicts: Vec<SyncConflict>,
    pub synced_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl SyncResult {
    pub fn succeeded(task_id: impl Into<String>, direction: SyncDirection) -> Self {
        Self {
            success: true,
            task_id: task_id.into(),
            external_id: None,
            direction,
            changes: Vec::new(),
            conflicts: Vec::new(),
            synced_at: Utc::now(),
            error: None,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Per-task sync state a plugin reports back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub task_id: String,
    pub external_id: Option<String>,
    pub plugin: String,
    pub last_synced: Option<DateTime<Utc>>,
    pub direction: SyncDirection,
    pub local_version: u64,
    pub remote_version: Option<u64>,
    pub checksum: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_compatibility() {
        assert!(SyncDirection::Bidirectional.applies_to(SyncDirection::Pull));
        assert!(SyncDirection::Bidirectional.applies_to(SyncDirection::Push));
        assert!(SyncDirection::Pull.applies_to(SyncDirection::Pull));
        assert!(!SyncDirection::Pull.applies_to(SyncDirection::Push));
        assert!(!SyncDirection::Push.applies_to(SyncDirection::Pull));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("push".parse::<SyncDirection>().unwrap(), SyncDirection::Push);
        assert!("sideways".parse::<SyncDirection>().is_err());
    }
}
