//! # Canonical Task Model
//!
//! The internal task representation shared by every integration plugin.
//!
//! ## Overview
//!
//! External trackers (Jira issues, GitHub issues, Linear tickets) are mapped into
//! this shape before they cross into the rest of Zen, and mapped back out of it
//! when a change is pushed. Only `id`, `title` and `status` are mandatory.
//!
//! ## Change Detection
//!
//! Each task carries a monotonically increasing `version` and a SHA-256
//! `checksum` over its user-visible fields. Sync code compares checksums to
//! decide whether a remote copy diverged, so the checksum deliberately
//! excludes timestamps, `raw_data` and `metadata`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{ZenError, ZenResult};

/// Canonical task, independent of any external system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(rename = "type", default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub raw_data: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl Task {
    /// Create a task with the required fields and empty optional ones
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            external_id: None,
            title: title.into(),
            description: None,
            status: status.into(),
            priority: None,
            task_type: None,
            owner: None,
            assignee: None,
            team: None,
            created: now,
            updated: now,
            due_date: None,
            labels: Vec::new(),
            tags: Vec::new(),
            components: Vec::new(),
            external_url: None,
            raw_data: None,
            metadata: HashMap::new(),
            version: 1,
            checksum: None,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Check the required fields are present
    pub fn validate(&self) -> ZenResult<()> {
        let missing: Vec<&str> = [
            ("id", self.id.trim().is_empty()),
            ("title", self.title.trim().is_empty()),
            ("status", self.status.trim().is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ZenError::ValidationError(format!(
                "Task is missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// SHA-256 over the fields a user can observe changing
    pub fn compute_checksum(&self) -> String {
        let fingerprint = serde_json::json!({
            "external_id": self.external_id,
            "title": self.title,
            "description": self.description,
            "status": self.status,
            "priority": self.priority,
            "type": self.task_type,
            "owner": self.owner,
            "assignee": self.assignee,
            "team": self.team,
            "due_date": self.due_date,
            "labels": self.labels,
            "tags": self.tags,
            "components": self.components,
        });

        let mut hasher = Sha256::new();
        hasher.update(fingerprint.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn refresh_checksum(&mut self) {
        self.checksum = Some(self.compute_checksum());
    }

    /// True when the stored checksum no longer matches the content
    pub fn has_changed(&self) -> bool {
        self.checksum.as_deref() != Some(self.compute_checksum().as_str())
    }

    /// Record a local modification
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.updated = Utc::now();
        self.refresh_checksum();
    }
}
