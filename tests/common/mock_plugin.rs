use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use zen_core::auth::AuthConfig;
use zen_core::error::{PluginError, PluginResult, ZenError};
use zen_core::models::{
    Operation, OperationResult, OperationType, SearchQuery, SyncDirection, SyncMetadata,
    SyncResult, Task,
};
use zen_core::plugin::{
    Compensation, IntegrationPlugin, OperationOptions, PluginConfig, PluginHealth, RateLimitInfo,
};
use zen_core::transaction::compensation_fn;

/// Shared, ordered record of compensations run across plugins
pub type CompensationLog = Arc<Mutex<Vec<String>>>;

/// One call into a task method
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: OperationType,
    pub target: Option<String>,
}

/// Scriptable in-memory tracker for orchestrator tests.
///
/// Task methods succeed unless an error was queued with [`MockPlugin::fail_next`]
/// or set with [`MockPlugin::fail_always`]. Successful creates offer a
/// compensation that appends the operation id to the compensation log.
#[derive(Debug)]
pub struct MockPlugin {
    name: String,
    rate_limit: RateLimitInfo,
    unsupported: Vec<OperationType>,
    delay: Option<Duration>,
    failures: Mutex<VecDeque<PluginError>>,
    always: Mutex<Option<PluginError>>,
    calls: Mutex<Vec<MockCall>>,
    created: AtomicUsize,
    compensations: CompensationLog,
    fail_compensation: bool,
    fail_initialize: bool,
    initialized: AtomicBool,
    shut_down: AtomicBool,
}

impl MockPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rate_limit: RateLimitInfo {
                requests_per_hour: 36_000,
                burst: 100,
            },
            unsupported: Vec::new(),
            delay: None,
            failures: Mutex::new(VecDeque::new()),
            always: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            compensations: Arc::new(Mutex::new(Vec::new())),
            fail_compensation: false,
            fail_initialize: false,
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_rate_limit(mut self, requests_per_hour: u32, burst: u32) -> Self {
        self.rate_limit = RateLimitInfo {
            requests_per_hour,
            burst,
        };
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn without(mut self, operation: OperationType) -> Self {
        self.unsupported.push(operation);
        self
    }

    pub fn with_compensation_log(mut self, log: CompensationLog) -> Self {
        self.compensations = log;
        self
    }

    pub fn failing_compensation(mut self) -> Self {
        self.fail_compensation = true;
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Queue `count` failures returned by the next task calls
    pub fn fail_next(&self, count: usize, error: PluginError) {
        let mut failures = self.failures.lock();
        for _ in 0..count {
            failures.push_back(error.clone());
        }
    }

    pub fn fail_always(&self, error: PluginError) {
        *self.always.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.always.lock() = None;
        self.failures.lock().clear();
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn compensations(&self) -> Vec<String> {
        self.compensations.lock().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    async fn call(&self, operation: OperationType, target: Option<&str>) -> PluginResult<()> {
        self.calls.lock().push(MockCall {
            operation,
            target: target.map(str::to_string),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        match self.always.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IntegrationPlugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn description(&self) -> &str {
        "In-memory tracker for tests"
    }

    async fn initialize(&self, _config: &PluginConfig) -> PluginResult<()> {
        if self.fail_initialize {
            return Err(PluginError::from_http_status(401, "bad credentials"));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn validate(&self) -> PluginResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> PluginResult<PluginHealth> {
        match self.always.lock().clone() {
            Some(error) => Err(error),
            None => Ok(PluginHealth::healthy()),
        }
    }

    async fn shutdown(&self) -> PluginResult<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_task(&self, external_id: &str, _options: &OperationOptions) -> PluginResult<Task> {
        self.call(OperationType::Fetch, Some(external_id)).await?;
        Ok(Task::new(external_id, format!("Fetched {external_id}"), "open").with_external_id(external_id))
    }

    async fn create_task(&self, task: &Task, _options: &OperationOptions) -> PluginResult<Task> {
        self.call(OperationType::Create, Some(&task.id)).await?;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(task.clone().with_external_id(format!("{}-{n}", self.name.to_uppercase())))
    }

    async fn update_task(
        &self,
        external_id: &str,
        task: &Task,
        _options: &OperationOptions,
    ) -> PluginResult<Task> {
        self.call(OperationType::Update, Some(external_id)).await?;
        Ok(task.clone().with_external_id(external_id))
    }

    async fn delete_task(&self, external_id: &str, _options: &OperationOptions) -> PluginResult<()> {
        self.call(OperationType::Delete, Some(external_id)).await
    }

    async fn search_tasks(
        &self,
        query: &SearchQuery,
        _options: &OperationOptions,
    ) -> PluginResult<Vec<Task>> {
        self.call(OperationType::Search, query.text.as_deref()).await?;
        Ok(vec![
            Task::new("s-1", "First match", "open"),
            Task::new("s-2", "Second match", "closed"),
        ])
    }

    async fn sync_task(&self, task_id: &str, _options: &OperationOptions) -> PluginResult<SyncResult> {
        self.call(OperationType::Sync, Some(task_id)).await?;
        Ok(SyncResult::succeeded(task_id, SyncDirection::Pull))
    }

    async fn get_sync_metadata(&self, _task_id: &str) -> PluginResult<Option<SyncMetadata>> {
        Ok(None)
    }

    fn map_to_canonical(&self, external: &Value) -> PluginResult<Task> {
        serde_json::from_value(external.clone())
            .map_err(|e| PluginError::invalid_request(e.to_string()))
    }

    fn map_to_external(&self, task: &Task) -> PluginResult<Value> {
        serde_json::to_value(task).map_err(|e| PluginError::invalid_request(e.to_string()))
    }

    fn get_auth_config(&self) -> Option<AuthConfig> {
        None
    }

    fn get_rate_limit_info(&self) -> RateLimitInfo {
        self.rate_limit
    }

    fn supports_operation(&self, operation_type: OperationType) -> bool {
        !self.unsupported.contains(&operation_type)
    }

    fn compensation_for(&self, operation: &Operation, result: &OperationResult) -> Option<Compensation> {
        if operation.operation_type != OperationType::Create {
            return None;
        }

        let external_id = result
            .data
            .as_ref()
            .and_then(|data| data.as_task())
            .and_then(|task| task.external_id.clone());
        let log = Arc::clone(&self.compensations);
        let fail = self.fail_compensation;

        Some(Compensation {
            action: compensation_fn(move |data: Value| {
                let log = Arc::clone(&log);
                async move {
                    if fail {
                        return Err(ZenError::Internal("delete failed during rollback".to_string()));
                    }
                    let id = data["operation_id"].as_str().unwrap_or_default().to_string();
                    log.lock().push(id);
                    Ok(())
                }
            }),
            data: json!({"operation_id": operation.id, "external_id": external_id}),
        })
    }
}

/// Compensation for a caller-registered undo step that appends `label` to `log`
pub fn recording_compensation(log: &CompensationLog, label: &str) -> zen_core::transaction::CompensationFn {
    let log = Arc::clone(log);
    let label = label.to_string();
    compensation_fn(move |_data: Value| {
        let log = Arc::clone(&log);
        let label = label.clone();
        async move {
            log.lock().push(label);
            Ok(())
        }
    })
}

pub fn new_log() -> CompensationLog {
    Arc::new(Mutex::new(Vec::new()))
}
