//! # Operation and Transaction Model
//!
//! The request/response shapes the orchestrator consumes and produces.
//!
//! An [`Operation`] is one intent against one plugin. A [`Transaction`] is an
//! ordered list of operations executed as a saga: all succeed, or every
//! completed operation is compensated. Both are built by the caller, handed to
//! the orchestrator by reference and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{SyncResult, Task};

/// Kind of task operation a plugin is asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Fetch,
    Create,
    Update,
    Delete,
    Search,
    Sync,
}

impl OperationType {
    pub const ALL: [OperationType; 6] = [
        OperationType::Fetch,
        OperationType::Create,
        OperationType::Update,
        OperationType::Delete,
        OperationType::Search,
        OperationType::Sync,
    ];

    /// Whether the operation changes remote state and therefore may need undoing
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Search => write!(f, "search"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch" => Ok(Self::Fetch),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "search" => Ok(Self::Search),
            "sync" => Ok(Self::Sync),
            _ => Err(format!("unsupported operation type: {s}")),
        }
    }
}

/// Backoff curve used between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
}

/// Per-operation retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Error codes retried in addition to the default retryable set
    #[serde(default)]
    pub retryable_errors: Vec<String>,
    /// Spread delays by up to ±10%
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
            retryable_errors: Vec::new(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn lists(&self, code: &str) -> bool {
        self.retryable_errors.iter().any(|e| e == code)
    }
}

/// Search parameters passed to `search_tasks`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: Option<String>,
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// A single intent against a plugin
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: String,
    pub plugin: String,
    pub operation_type: OperationType,
    /// Remote identifier; for `sync` this names the task to synchronise
    pub external_id: Option<String>,
    pub task: Option<Task>,
    pub query: Option<SearchQuery>,
    pub options: HashMap<String, serde_json::Value>,
    /// Bound on a single attempt, plugin I/O included
    pub timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Operation {
    pub fn new(plugin: impl Into<String>, operation_type: OperationType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            plugin: plugin.into(),
            operation_type,
            external_id: None,
            task: None,
            query: None,
            options: HashMap::new(),
            timeout: None,
            retry_policy: None,
            metadata: HashMap::new(),
        }
    }

    pub fn fetch(plugin: impl Into<String>, external_id: impl Into<String>) -> Self {
        let mut op = Self::new(plugin, OperationType::Fetch);
        op.external_id = Some(external_id.into());
        op
    }

    pub fn create(plugin: impl Into<String>, task: Task) -> Self {
        let mut op = Self::new(plugin, OperationType::Create);
        op.task = Some(task);
        op
    }

    pub fn update(plugin: impl Into<String>, external_id: impl Into<String>, task: Task) -> Self {
        let mut op = Self::new(plugin, OperationType::Update);
        op.external_id = Some(external_id.into());
        op.task = Some(task);
        op
    }

    pub fn delete(plugin: impl Into<String>, external_id: impl Into<String>) -> Self {
        let mut op = Self::new(plugin, OperationType::Delete);
        op.external_id = Some(external_id.into());
        op
    }

    pub fn search(plugin: impl Into<String>, query: SearchQuery) -> Self {
        let mut op = Self::new(plugin, OperationType::Search);
        op.query = Some(query);
        op
    }

    pub fn sync(plugin: impl Into<String>, task_id: impl Into<String>) -> Self {
        let mut op = Self::new(plugin, OperationType::Sync);
        op.external_id = Some(task_id.into());
        op
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Payload a successful operation hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperationData {
    Task(Task),
    Tasks(Vec<Task>),
    Sync(SyncResult),
}

impl OperationData {
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            OperationData::Task(task) => Some(task),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub operation_id: String,
    pub plugin: String,
    pub operation_type: OperationType,
    pub data: Option<OperationData>,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub retryable: bool,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OperationResult {
    /// Start a result for `op`, stamped now and not yet successful
    pub fn for_operation(op: &Operation) -> Self {
        Self {
            success: false,
            operation_id: op.id.clone(),
            plugin: op.plugin.clone(),
            operation_type: op.operation_type,
            data: None,
            error: None,
            error_code: None,
            retryable: false,
            duration: Duration::ZERO,
            timestamp: Utc::now(),
            retry_count: 0,
            metadata: op.metadata.clone(),
        }
    }

    pub(crate) fn fail(mut self, code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        self.success = false;
        self.error = Some(message.into());
        self.error_code = Some(code);
        self.retryable = retryable;
        self
    }
}

/// Ordered operations executed as a saga
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub operations: Vec<Operation>,
    /// Bound on the whole saga
    pub timeout: Option<Duration>,
    /// Informational only; no isolation is enforced across plugins
    pub isolation: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Transaction {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operations,
            timeout: None,
            isolation: "read_committed".to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub transaction_id: String,
    pub success: bool,
    pub results: Vec<OperationResult>,
    pub duration: Duration,
    pub rolled_back: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_builders() {
        let op = Operation::update("jira", "PROJ-1", Task::new("t1", "Title", "open"))
            .with_id("op-1")
            .with_timeout(Duration::from_secs(5))
            .with_option("notify", serde_json::json!(false));

        assert_eq!(op.id, "op-1");
        assert_eq!(op.operation_type, OperationType::Update);
        assert_eq!(op.external_id.as_deref(), Some("PROJ-1"));
        assert_eq!(op.timeout, Some(Duration::from_secs(5)));
        assert!(op.task.is_some());
        assert_eq!(op.options["notify"], serde_json::json!(false));
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let a = Operation::fetch("jira", "PROJ-1");
        let b = Operation::fetch("jira", "PROJ-1");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_operation_type_parse() {
        for kind in OperationType::ALL {
            assert_eq!(kind.to_string().parse::<OperationType>().unwrap(), kind);
        }
        let err = "archive".parse::<OperationType>().unwrap_err();
        assert!(err.contains("unsupported operation type"));
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.strategy, BackoffStrategy::Exponential);
    }
}
