//! Integration tests for saga execution and compensation

mod common;

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{fast_retry, new_log, recording_compensation, test_config, MockPlugin};
use zen_core::error::{ErrorCode, PluginError};
use zen_core::models::{Operation, Task, Transaction};
use zen_core::orchestration::OperationOrchestrator;
use zen_core::plugin::IntegrationPlugin;
use zen_core::transaction::TransactionStatus;

fn task(id: &str) -> Task {
    Task::new(id, format!("Task {id}"), "open")
}

fn orchestrator_with(plugins: &[&Arc<MockPlugin>]) -> OperationOrchestrator {
    let orchestrator = OperationOrchestrator::with_config(test_config());
    for plugin in plugins {
        let plugin: Arc<dyn IntegrationPlugin> = (*plugin).clone();
        orchestrator
            .register_plugin(&plugin.name().to_string(), plugin)
            .unwrap();
    }
    orchestrator
}

#[tokio::test]
async fn test_saga_rollback_compensates_in_reverse() {
    let jira = MockPlugin::new("jira").into_arc();
    let github = MockPlugin::new("github").into_arc();
    github.fail_always(PluginError::from_http_status(500, "internal error"));
    let orchestrator = orchestrator_with(&[&jira, &github]);

    let a = Operation::fetch("jira", "JIRA-1").with_id("A");
    let b = Operation::create("jira", task("zen-2")).with_id("B");
    let c = Operation::update("github", "77", task("zen-3"))
        .with_id("C")
        .with_retry_policy(fast_retry(2));

    let log = new_log();
    let compensations = orchestrator.compensation_manager();
    compensations
        .register("A", recording_compensation(&log, "A"), Value::Null)
        .unwrap();
    compensations
        .register("B", recording_compensation(&log, "B"), Value::Null)
        .unwrap();

    let tx = Transaction::new(vec![a, b, c]).with_id("tx-rollback");
    let result = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(result.rolled_back);
    assert_eq!(result.results.len(), 3);
    assert!(result.results[0].success && result.results[1].success);
    assert_eq!(result.results[2].error_code, Some(ErrorCode::InternalError));
    assert_eq!(result.results[2].retry_count, 2);
    assert!(result.error.unwrap().contains("operation C failed"));

    assert_eq!(*log.lock(), vec!["B".to_string(), "A".to_string()]);
    // The caller's compensation for B took precedence over the plugin's
    assert!(jira.compensations().is_empty());

    let state = orchestrator
        .transaction_manager()
        .get_transaction("tx-rollback")
        .unwrap();
    assert_eq!(state.status, TransactionStatus::RolledBack);
    assert_eq!(state.operations, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_rollback_drops_compensations_of_operations_that_never_completed() {
    let jira = MockPlugin::new("jira").into_arc();
    let github = MockPlugin::new("github").into_arc();
    github.fail_always(PluginError::from_http_status(400, "rejected"));
    let orchestrator = orchestrator_with(&[&jira, &github]);

    let log = new_log();
    let compensations = orchestrator.compensation_manager();
    for id in ["first", "second", "third"] {
        compensations
            .register(id, recording_compensation(&log, id), Value::Null)
            .unwrap();
    }

    let tx = Transaction::new(vec![
        Operation::fetch("jira", "JIRA-1").with_id("first"),
        Operation::fetch("github", "9").with_id("second"),
        Operation::fetch("jira", "JIRA-2").with_id("third"),
    ]);
    let result = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;

    assert!(result.rolled_back);
    assert_eq!(result.results.len(), 2);
    assert_eq!(*log.lock(), vec!["first".to_string()]);
    assert_eq!(compensations.len(), 1);
    assert!(compensations.get("first").unwrap().executed);
    assert!(!compensations.contains("second"));
    assert!(!compensations.contains("third"));
}

#[tokio::test]
async fn test_commit_clears_compensations() {
    let jira = MockPlugin::new("jira").into_arc();
    let github = MockPlugin::new("github").into_arc();
    let orchestrator = orchestrator_with(&[&jira, &github]);

    let tx = Transaction::new(vec![
        Operation::create("jira", task("zen-1")),
        Operation::create("github", task("zen-1")),
    ])
    .with_id("tx-commit");

    let result = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;

    assert!(result.success);
    assert!(!result.rolled_back);
    assert!(result.error.is_none());
    assert_eq!(result.results.len(), 2);
    assert!(orchestrator.compensation_manager().is_empty());
    assert!(jira.compensations().is_empty());
    assert_eq!(
        orchestrator
            .transaction_manager()
            .get_transaction("tx-commit")
            .unwrap()
            .status,
        TransactionStatus::Committed
    );
}

#[tokio::test]
async fn test_plugin_provided_compensation_runs_on_rollback() {
    let log = new_log();
    let jira = MockPlugin::new("jira")
        .with_compensation_log(Arc::clone(&log))
        .into_arc();
    let github = MockPlugin::new("github")
        .with_compensation_log(Arc::clone(&log))
        .into_arc();
    let linear = MockPlugin::new("linear").into_arc();
    linear.fail_always(PluginError::from_http_status(400, "bad payload"));
    let orchestrator = orchestrator_with(&[&jira, &github, &linear]);

    let first = Operation::create("jira", task("zen-1")).with_id("create-jira");
    let second = Operation::create("github", task("zen-1")).with_id("create-github");
    let third = Operation::create("linear", task("zen-1")).with_id("create-linear");
    let tx = Transaction::new(vec![first, second, third]);

    let result = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;

    assert!(result.rolled_back);
    assert_eq!(result.results[2].error_code, Some(ErrorCode::InvalidRequest));
    assert_eq!(
        *log.lock(),
        vec!["create-github".to_string(), "create-jira".to_string()]
    );
    assert!(orchestrator
        .compensation_manager()
        .get("create-jira")
        .unwrap()
        .executed);
}

#[tokio::test]
async fn test_failed_compensation_does_not_stop_rollback() {
    let log = new_log();
    let good = MockPlugin::new("good")
        .with_compensation_log(Arc::clone(&log))
        .into_arc();
    let bad = MockPlugin::new("bad").failing_compensation().into_arc();
    let broken = MockPlugin::new("broken").into_arc();
    broken.fail_always(PluginError::from_http_status(404, "gone"));
    let orchestrator = orchestrator_with(&[&good, &bad, &broken]);

    let tx = Transaction::new(vec![
        Operation::create("good", task("zen-1")).with_id("op-good"),
        Operation::create("bad", task("zen-1")).with_id("op-bad"),
        Operation::delete("broken", "X-1").with_id("op-broken"),
    ])
    .with_id("tx-partial");

    let result = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(result.rolled_back);
    assert!(result.error.unwrap().contains("1 compensation(s) failed"));
    assert_eq!(*log.lock(), vec!["op-good".to_string()]);

    let failed = orchestrator.compensation_manager().get("op-bad").unwrap();
    assert!(failed.executed);
    assert!(failed.last_error.is_some());
    assert_eq!(
        orchestrator
            .transaction_manager()
            .get_transaction("tx-partial")
            .unwrap()
            .status,
        TransactionStatus::Failed
    );
}

#[tokio::test]
async fn test_duplicate_transaction_id_is_rejected() {
    let jira = MockPlugin::new("jira").into_arc();
    let orchestrator = orchestrator_with(&[&jira]);
    let tx = Transaction::new(vec![Operation::fetch("jira", "JIRA-1")]).with_id("tx-1");

    assert!(orchestrator.execute_transaction(&tx, &CancellationToken::new()).await.success);

    let again = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;
    assert!(!again.success);
    assert!(!again.rolled_back);
    assert!(again.results.is_empty());
    assert!(again.error.unwrap().contains("already exists"));
    assert_eq!(jira.call_count(), 1);
}

#[tokio::test]
async fn test_transaction_timeout_rolls_back() {
    let log = new_log();
    let jira = MockPlugin::new("jira")
        .with_compensation_log(Arc::clone(&log))
        .into_arc();
    let slow = MockPlugin::new("slow")
        .with_delay(Duration::from_millis(500))
        .into_arc();
    let orchestrator = orchestrator_with(&[&jira, &slow]);

    let tx = Transaction::new(vec![
        Operation::create("jira", task("zen-1")).with_id("fast"),
        Operation::create("slow", task("zen-1")).with_id("stuck"),
    ])
    .with_timeout(Duration::from_millis(100));

    let started = std::time::Instant::now();
    let result = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;

    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(result.rolled_back);
    assert_eq!(result.results[1].error_code, Some(ErrorCode::TimeoutError));
    assert_eq!(*log.lock(), vec!["fast".to_string()]);
    // Cancelled rather than failed: the slow plugin's breaker saw no failure
    assert_eq!(
        orchestrator.circuit_breaker("slow").unwrap().metrics().failure_count,
        0
    );
}

#[tokio::test]
async fn test_cancelled_transaction_still_compensates() {
    let log = new_log();
    let jira = MockPlugin::new("jira")
        .with_compensation_log(Arc::clone(&log))
        .into_arc();
    let slow = MockPlugin::new("slow")
        .with_delay(Duration::from_millis(500))
        .into_arc();
    let orchestrator = orchestrator_with(&[&jira, &slow]);

    let tx = Transaction::new(vec![
        Operation::create("jira", task("zen-1")).with_id("done"),
        Operation::fetch("slow", "S-1").with_id("interrupted"),
    ]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = orchestrator.execute_transaction(&tx, &cancel).await;

    assert!(result.rolled_back);
    assert_eq!(result.results[1].error_code, Some(ErrorCode::ContextCancelled));
    assert_eq!(*log.lock(), vec!["done".to_string()]);
}

#[tokio::test]
async fn test_empty_transaction_commits() {
    let orchestrator = OperationOrchestrator::new();
    let tx = Transaction::new(Vec::new());

    let result = orchestrator
        .execute_transaction(&tx, &CancellationToken::new())
        .await;

    assert!(result.success);
    assert!(result.results.is_empty());
    assert_eq!(orchestrator.transaction_manager().active_count(), 0);
}
