//! # Operation Orchestrator
//!
//! Runs operations against registered plugins behind a per-plugin circuit
//! breaker and token bucket, retrying transient failures, and runs ordered
//! batches of operations as compensating sagas.
//!
//! ## Operation lifecycle
//!
//! 1. Look the plugin up and check it can serve the operation type
//! 2. Admission: circuit breaker, then rate limiter
//! 3. Attempts `0..=max_retries`, each bounded by the operation timeout and
//!    raced against cancellation, with backoff sleeps in between
//! 4. Exactly one breaker outcome and one metrics record per admitted call
//!
//! Admission failures are never retried here; the result's `retryable` flag
//! tells the caller whether trying again later makes sense.
//!
//! ## Transactions
//!
//! Operations run strictly in order. The first failure compensates every
//! completed operation in reverse order and rolls the transaction back.
//! Compensations ignore cancellation so a cancelled saga still unwinds.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffCalculator;
use super::metrics::{MetricsCollector, OperationMetrics, Outcome};
use crate::config::ZenConfig;
use crate::error::{ErrorCode, ZenError, ZenResult};
use crate::logging::{log_operation, log_plugin_operation, log_transaction};
use crate::models::{
    Operation, OperationData, OperationResult, OperationType, RetryPolicy, Task, Transaction,
    TransactionResult,
};
use crate::plugin::IntegrationPlugin;
use crate::registry::PluginRegistry;
use crate::resilience::{CircuitBreaker, CircuitState, RateLimiter};
use crate::transaction::{CompensationManager, TransactionManager};

#[derive(Clone)]
struct PluginEntry {
    plugin: Arc<dyn IntegrationPlugin>,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
}

pub struct OperationOrchestrator {
    config: ZenConfig,
    plugins: RwLock<HashMap<String, PluginEntry>>,
    transactions: TransactionManager,
    compensations: CompensationManager,
    backoff: BackoffCalculator,
    metrics: MetricsCollector,
}

impl fmt::Debug for OperationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationOrchestrator")
            .field("plugins", &self.plugin_names())
            .field("transactions", &self.transactions)
            .field("compensations", &self.compensations.len())
            .finish_non_exhaustive()
    }
}

impl Default for OperationOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationOrchestrator {
    pub fn new() -> Self {
        Self::with_config(ZenConfig::default())
    }

    pub fn with_config(config: ZenConfig) -> Self {
        Self {
            config,
            plugins: RwLock::new(HashMap::new()),
            transactions: TransactionManager::new(),
            compensations: CompensationManager::new(),
            backoff: BackoffCalculator::new(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Replace the backoff source, e.g. with a seeded one for reproducible jitter
    pub fn with_backoff(mut self, backoff: BackoffCalculator) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn config(&self) -> &ZenConfig {
        &self.config
    }

    /// Register `plugin` under `name` with a fresh circuit breaker and a token
    /// bucket sized from its advertised quota (or the configured override)
    pub fn register_plugin(&self, name: &str, plugin: Arc<dyn IntegrationPlugin>) -> ZenResult<()> {
        if name.trim().is_empty() {
            return Err(ZenError::ConfigurationError(
                "plugin name must not be empty".to_string(),
            ));
        }

        let breaker_config = self.config.circuit_breaker.to_config();
        breaker_config
            .validate()
            .map_err(|e| ZenError::ConfigurationError(format!("circuit breaker for {name}: {e}")))?;

        let limiter_config = self
            .config
            .rate_limit
            .for_plugin(name, plugin.get_rate_limit_info());
        limiter_config
            .validate()
            .map_err(|e| ZenError::ConfigurationError(format!("rate limit for {name}: {e}")))?;

        let mut plugins = self.plugins.write();
        if plugins.contains_key(name) {
            return Err(ZenError::ConfigurationError(format!(
                "plugin {name} is already registered"
            )));
        }

        info!(
            plugin = %name,
            version = %plugin.version(),
            requests_per_minute = limiter_config.requests_per_minute,
            burst_size = limiter_config.burst_size,
            "Plugin registered with orchestrator"
        );
        log_plugin_operation("register", name, Some(plugin.version()), "registered", None);

        plugins.insert(
            name.to_string(),
            PluginEntry {
                breaker: Arc::new(CircuitBreaker::new(name, breaker_config)),
                limiter: Arc::new(RateLimiter::new(name, limiter_config)),
                plugin,
            },
        );
        Ok(())
    }

    /// Drop the plugin together with its breaker and limiter
    pub fn unregister_plugin(&self, name: &str) -> ZenResult<()> {
        match self.plugins.write().remove(name) {
            Some(_) => {
                log_plugin_operation("unregister", name, None, "unregistered", None);
                Ok(())
            }
            None => Err(ZenError::PluginNotFound(name.to_string())),
        }
    }

    /// Register every initialized plugin of `registry` not yet known here.
    ///
    /// Returns how many were added.
    pub async fn register_from_registry(&self, registry: &PluginRegistry) -> ZenResult<usize> {
        let mut added = 0;
        for plugin in registry.initialized_plugins().await {
            let name = plugin.name().to_string();
            if self.is_registered(&name) {
                continue;
            }
            self.register_plugin(&name, plugin)?;
            added += 1;
        }
        Ok(added)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.plugins.read().contains_key(name)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn circuit_breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.plugins.read().get(name).map(|e| Arc::clone(&e.breaker))
    }

    pub fn circuit_state(&self, name: &str) -> Option<CircuitState> {
        self.circuit_breaker(name).map(|breaker| breaker.state())
    }

    pub fn rate_limiter(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.plugins.read().get(name).map(|e| Arc::clone(&e.limiter))
    }

    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn compensation_manager(&self) -> &CompensationManager {
        &self.compensations
    }

    pub fn get_operation_metrics(&self) -> OperationMetrics {
        self.metrics.snapshot()
    }

    fn plugin_entry(&self, name: &str) -> Option<PluginEntry> {
        self.plugins.read().get(name).cloned()
    }

    /// Whether a failed attempt is worth repeating under `policy`.
    ///
    /// True when the code is listed by the policy or in the default retryable
    /// set, or when the error itself is flagged retryable. Cancellation never
    /// is.
    pub fn is_retryable(error: &ZenError, policy: &RetryPolicy) -> bool {
        let code = error.code();
        if code == ErrorCode::ContextCancelled {
            return false;
        }
        policy.lists(code.as_str()) || code.is_default_retryable() || error.is_flagged_retryable()
    }

    /// Execute one operation with admission control, retries and cancellation.
    ///
    /// Never returns an error; failures are described by the result.
    pub async fn execute_operation(&self, op: &Operation, cancel: &CancellationToken) -> OperationResult {
        let started = Instant::now();
        let result = OperationResult::for_operation(op);
        let policy = op
            .retry_policy
            .clone()
            .unwrap_or_else(|| self.config.orchestrator.retry_policy());

        let Some(entry) = self.plugin_entry(&op.plugin) else {
            let err = ZenError::PluginNotFound(op.plugin.clone());
            return self.reject(result, started, Outcome::Failed, &err, &policy);
        };

        if let Err(err) = check_operation(entry.plugin.as_ref(), op) {
            return self.reject(result, started, Outcome::Failed, &err, &policy);
        }

        if let Err(err) = entry.breaker.try_acquire() {
            warn!(
                operation_id = %op.id,
                plugin = %op.plugin,
                "Operation rejected: circuit breaker open"
            );
            return self.reject(result, started, Outcome::CircuitRejected, &err, &policy);
        }

        if let Err(err) = self.acquire_token(&entry, cancel).await {
            entry.breaker.release();
            let outcome = match err {
                ZenError::Cancelled(_) => Outcome::Cancelled,
                _ => Outcome::RateLimited,
            };
            warn!(
                operation_id = %op.id,
                plugin = %op.plugin,
                error = %err,
                "Operation rejected by rate limiter"
            );
            return self.reject(result, started, outcome, &err, &policy);
        }

        let attempt_timeout = op
            .timeout
            .or_else(|| self.config.orchestrator.operation_timeout());
        let mut attempt: u32 = 0;

        let last_error = loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = run_attempt(entry.plugin.as_ref(), op, attempt_timeout) => Some(outcome),
            };

            let Some(outcome) = outcome else {
                return self.cancelled(&entry, result, started, attempt);
            };

            match outcome {
                Ok(data) => return self.succeed(&entry, result, started, attempt, data),
                Err(err) => {
                    let retryable = Self::is_retryable(&err, &policy);
                    if !retryable || attempt >= policy.max_retries {
                        break err;
                    }

                    let delay = self.backoff.delay(&policy, attempt);
                    warn!(
                        operation_id = %op.id,
                        plugin = %op.plugin,
                        attempt = attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Operation attempt failed, retrying"
                    );

                    let interrupted = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => true,
                        _ = tokio::time::sleep(delay) => false,
                    };
                    if interrupted {
                        return self.cancelled(&entry, result, started, attempt);
                    }
                    attempt += 1;
                }
            }
        };

        let duration = started.elapsed();
        entry.breaker.record_failure(duration);
        self.metrics
            .record(&op.plugin, Outcome::Failed, duration, attempt > 0);

        let retryable = Self::is_retryable(&last_error, &policy);
        let mut result = result.fail(last_error.code(), last_error.to_string(), retryable);
        result.duration = duration;
        result.retry_count = attempt;

        error!(
            operation_id = %op.id,
            plugin = %op.plugin,
            operation_type = %op.operation_type,
            error_code = %last_error.code(),
            retries = attempt,
            error = %last_error,
            "Operation failed"
        );
        log_operation(
            &op.id,
            &op.plugin,
            &op.operation_type.to_string(),
            "failed",
            Some(duration.as_millis() as u64),
            result.error.as_deref(),
        );
        result
    }

    async fn acquire_token(&self, entry: &PluginEntry, cancel: &CancellationToken) -> ZenResult<()> {
        if self.config.orchestrator.wait_for_rate_limit {
            entry.limiter.wait_for_token(cancel).await
        } else if entry.limiter.allow() {
            Ok(())
        } else {
            Err(ZenError::RateLimited {
                component: entry.limiter.name().to_string(),
            })
        }
    }

    fn succeed(
        &self,
        entry: &PluginEntry,
        mut result: OperationResult,
        started: Instant,
        attempt: u32,
        data: Option<OperationData>,
    ) -> OperationResult {
        let duration = started.elapsed();
        entry.breaker.record_success(duration);
        self.metrics
            .record(&result.plugin, Outcome::Succeeded, duration, attempt > 0);

        result.success = true;
        result.data = data;
        result.duration = duration;
        result.retry_count = attempt;

        log_operation(
            &result.operation_id,
            &result.plugin,
            &result.operation_type.to_string(),
            "success",
            Some(duration.as_millis() as u64),
            None,
        );
        result
    }

    fn cancelled(
        &self,
        entry: &PluginEntry,
        result: OperationResult,
        started: Instant,
        attempt: u32,
    ) -> OperationResult {
        entry.breaker.release();
        let duration = started.elapsed();
        self.metrics
            .record(&result.plugin, Outcome::Cancelled, duration, attempt > 0);

        info!(
            operation_id = %result.operation_id,
            plugin = %result.plugin,
            attempt = attempt,
            "Operation cancelled"
        );

        let mut result = result.fail(ErrorCode::ContextCancelled, "operation cancelled", false);
        result.duration = duration;
        result.retry_count = attempt;
        result
    }

    fn reject(
        &self,
        result: OperationResult,
        started: Instant,
        outcome: Outcome,
        err: &ZenError,
        policy: &RetryPolicy,
    ) -> OperationResult {
        let duration = started.elapsed();
        self.metrics.record(&result.plugin, outcome, duration, false);

        let retryable = Self::is_retryable(err, policy);
        let mut result = result.fail(err.code(), err.to_string(), retryable);
        result.duration = duration;

        log_operation(
            &result.operation_id,
            &result.plugin,
            &result.operation_type.to_string(),
            "rejected",
            Some(duration.as_millis() as u64),
            result.error.as_deref(),
        );
        result
    }

    /// Execute `tx` as a saga: all operations succeed and the transaction
    /// commits, or every completed operation is compensated in reverse order.
    pub async fn execute_transaction(
        &self,
        tx: &Transaction,
        cancel: &CancellationToken,
    ) -> TransactionResult {
        let started = Instant::now();
        let mut outcome = TransactionResult {
            transaction_id: tx.id.clone(),
            success: false,
            results: Vec::with_capacity(tx.operations.len()),
            duration: Duration::ZERO,
            rolled_back: false,
            error: None,
        };

        if let Err(err) = self.transactions.begin(&tx.id) {
            outcome.error = Some(err.to_string());
            outcome.duration = started.elapsed();
            return outcome;
        }

        info!(
            transaction_id = %tx.id,
            operations = tx.operations.len(),
            timeout_ms = tx.timeout.map(|t| t.as_millis() as u64),
            "Transaction started"
        );

        let tx_cancel = cancel.child_token();
        let deadline = tx.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut completed: Vec<&Operation> = Vec::new();

        for op in &tx.operations {
            let failure = match self.transactions.add_operation(&tx.id, &op.id) {
                Err(err) => Some(err.to_string()),
                Ok(()) => {
                    let result = self
                        .execute_with_deadline(op, &tx_cancel, deadline, tx.timeout)
                        .await;
                    let failure = if result.success {
                        self.register_compensation(op, &result);
                        completed.push(op);
                        None
                    } else {
                        Some(format!(
                            "operation {} failed: {}",
                            op.id,
                            result.error.as_deref().unwrap_or("unknown error")
                        ))
                    };
                    outcome.results.push(result);
                    failure
                }
            };

            if let Some(reason) = failure {
                return self.roll_back(tx, outcome, &completed, reason, started).await;
            }
        }

        match self.transactions.commit(&tx.id) {
            Ok(()) => outcome.success = true,
            Err(err) => outcome.error = Some(err.to_string()),
        }
        for op in &completed {
            self.compensations.clear(&op.id);
        }

        outcome.duration = started.elapsed();
        log_transaction(
            &tx.id,
            tx.operations.len(),
            if outcome.success { "committed" } else { "commit_failed" },
            Some(outcome.duration.as_millis() as u64),
            outcome.error.as_deref(),
        );
        outcome
    }

    async fn execute_with_deadline(
        &self,
        op: &Operation,
        cancel: &CancellationToken,
        deadline: Option<tokio::time::Instant>,
        timeout: Option<Duration>,
    ) -> OperationResult {
        let Some(deadline) = deadline else {
            return self.execute_operation(op, cancel).await;
        };

        let operation = self.execute_operation(op, cancel);
        tokio::pin!(operation);

        let finished = tokio::select! {
            biased;
            result = &mut operation => Some(result),
            _ = tokio::time::sleep_until(deadline) => None,
        };
        if let Some(result) = finished {
            return result;
        }

        // Let the operation observe cancellation and settle its breaker
        cancel.cancel();
        let mut result = operation.await;
        if !result.success {
            result.error_code = Some(ErrorCode::TimeoutError);
            result.error = Some(format!(
                "transaction timeout of {:?} exceeded",
                timeout.unwrap_or_default()
            ));
            result.retryable = false;
        }
        result
    }

    fn register_compensation(&self, op: &Operation, result: &OperationResult) {
        if self.compensations.contains(&op.id) {
            return;
        }
        let Some(entry) = self.plugin_entry(&op.plugin) else {
            return;
        };
        if let Some(compensation) = entry.plugin.compensation_for(op, result) {
            if let Err(err) = self
                .compensations
                .register(&op.id, compensation.action, compensation.data)
            {
                warn!(operation_id = %op.id, error = %err, "Could not register compensation");
            }
        }
    }

    async fn roll_back(
        &self,
        tx: &Transaction,
        mut outcome: TransactionResult,
        completed: &[&Operation],
        reason: String,
        started: Instant,
    ) -> TransactionResult {
        warn!(
            transaction_id = %tx.id,
            completed = completed.len(),
            reason = %reason,
            "Transaction failed, compensating completed operations"
        );

        let failed_compensations = self.compensate(completed).await;
        outcome.rolled_back = true;

        // Compensations for the failed operation and anything after it never run
        for op in &tx.operations {
            if !completed.iter().any(|done| done.id == op.id) {
                self.compensations.clear(&op.id);
            }
        }

        let ledger = if failed_compensations == 0 {
            self.transactions.rollback(&tx.id)
        } else {
            self.transactions.mark_failed(&tx.id)
        };
        if let Err(err) = ledger {
            error!(transaction_id = %tx.id, error = %err, "Could not close transaction");
        }

        outcome.error = Some(if failed_compensations == 0 {
            reason
        } else {
            format!("{reason}; {failed_compensations} compensation(s) failed")
        });
        outcome.duration = started.elapsed();

        log_transaction(
            &tx.id,
            tx.operations.len(),
            "rolled_back",
            Some(outcome.duration.as_millis() as u64),
            outcome.error.as_deref(),
        );
        outcome
    }

    /// Run compensations for `completed` newest first; returns how many failed
    async fn compensate(&self, completed: &[&Operation]) -> usize {
        let mut failures = 0;
        for op in completed.iter().rev() {
            if !self.compensations.contains(&op.id) {
                debug!(operation_id = %op.id, "No compensation registered, skipping");
                continue;
            }
            if let Err(err) = self.compensations.execute(&op.id).await {
                failures += 1;
                error!(
                    operation_id = %op.id,
                    plugin = %op.plugin,
                    error = %err,
                    "Compensation failed, continuing rollback"
                );
            }
        }
        failures
    }
}

/// Reject operations the plugin cannot serve or that lack their inputs
fn check_operation(plugin: &dyn IntegrationPlugin, op: &Operation) -> ZenResult<()> {
    if !plugin.supports_operation(op.operation_type) {
        return Err(ZenError::UnsupportedOperation(format!(
            "{} is not supported by plugin {}",
            op.operation_type, op.plugin
        )));
    }

    match op.operation_type {
        OperationType::Fetch | OperationType::Delete | OperationType::Sync => {
            required_external_id(op).map(|_| ())
        }
        OperationType::Create => required_task(op).map(|_| ()),
        OperationType::Update => required_external_id(op).and(required_task(op).map(|_| ())),
        OperationType::Search => Ok(()),
    }
}

fn required_external_id(op: &Operation) -> ZenResult<&str> {
    op.external_id.as_deref().ok_or_else(|| {
        ZenError::InvalidRequest(format!("{} operation requires an external_id", op.operation_type))
    })
}

fn required_task(op: &Operation) -> ZenResult<&Task> {
    op.task.as_ref().ok_or_else(|| {
        ZenError::InvalidRequest(format!("{} operation requires a task", op.operation_type))
    })
}

async fn run_attempt(
    plugin: &dyn IntegrationPlugin,
    op: &Operation,
    timeout: Option<Duration>,
) -> ZenResult<Option<OperationData>> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, dispatch(plugin, op)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ZenError::Timeout(format!(
                "{} on {} exceeded {:?}",
                op.operation_type, op.plugin, limit
            ))),
        },
        None => dispatch(plugin, op).await,
    }
}

async fn dispatch(plugin: &dyn IntegrationPlugin, op: &Operation) -> ZenResult<Option<OperationData>> {
    let options = &op.options;
    let data = match op.operation_type {
        OperationType::Fetch => {
            OperationData::Task(plugin.fetch_task(required_external_id(op)?, options).await?)
        }
        OperationType::Create => {
            OperationData::Task(plugin.create_task(required_task(op)?, options).await?)
        }
        OperationType::Update => OperationData::Task(
            plugin
                .update_task(required_external_id(op)?, required_task(op)?, options)
                .await?,
        ),
        OperationType::Delete => {
            plugin.delete_task(required_external_id(op)?, options).await?;
            return Ok(None);
        }
        OperationType::Search => {
            let query = op.query.clone().unwrap_or_default();
            OperationData::Tasks(plugin.search_tasks(&query, options).await?)
        }
        OperationType::Sync => {
            OperationData::Sync(plugin.sync_task(required_external_id(op)?, options).await?)
        }
    };
    Ok(Some(data))
}
