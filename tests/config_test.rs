//! File-driven configuration flowing into orchestrator behavior

mod common;

use std::io::Write;
use tokio_util::sync::CancellationToken;

use common::MockPlugin;
use zen_core::config::ZenConfig;
use zen_core::error::{ErrorCode, PluginError};
use zen_core::models::Operation;
use zen_core::orchestration::OperationOrchestrator;
use zen_core::resilience::CircuitState;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_file_settings_shape_the_orchestrator() {
    let file = write_config(
        "orchestrator:
  max_retries: 0
  base_delay_ms: 1
  max_delay_ms: 2
circuit_breaker:
  failure_threshold: 1
  reset_timeout_ms: 60000
rate_limit:
  overrides:
    jira:
      requests_per_hour: 3600
      burst: 2
",
    );
    let config = ZenConfig::load_with_prefix(Some(file.path()), "ZEN_IT_SHAPE").unwrap();

    let orchestrator = OperationOrchestrator::with_config(config);
    let jira = MockPlugin::new("jira").into_arc();
    let github = MockPlugin::new("github").into_arc();
    orchestrator.register_plugin("jira", jira.clone() as _).unwrap();
    orchestrator.register_plugin("github", github.clone() as _).unwrap();

    // Override wins over the advertised quota; others keep what they advertise
    let limiter = orchestrator.rate_limiter("jira").unwrap();
    assert_eq!(limiter.config().burst_size, 2);
    assert_eq!(limiter.config().requests_per_minute, 60);
    assert_eq!(orchestrator.rate_limiter("github").unwrap().config().burst_size, 100);

    github.fail_always(PluginError::from_http_status(503, "down"));
    let cancel = CancellationToken::new();
    let failed = orchestrator
        .execute_operation(&Operation::fetch("github", "1"), &cancel)
        .await;
    assert_eq!(failed.error_code, Some(ErrorCode::InternalError));
    assert_eq!(failed.retry_count, 0);
    assert_eq!(github.call_count(), 1);
    assert_eq!(orchestrator.circuit_state("github"), Some(CircuitState::Open));
    assert_eq!(orchestrator.circuit_state("jira"), Some(CircuitState::Closed));
}

#[tokio::test]
async fn test_wait_for_rate_limit_from_environment() {
    let file = write_config("rate_limit:\n  overrides:\n    jira:\n      requests_per_hour: 36000\n      burst: 1\n");

    std::env::set_var("ZEN_IT_WAIT__ORCHESTRATOR__WAIT_FOR_RATE_LIMIT", "true");
    let config = ZenConfig::load_with_prefix(Some(file.path()), "ZEN_IT_WAIT");
    std::env::remove_var("ZEN_IT_WAIT__ORCHESTRATOR__WAIT_FOR_RATE_LIMIT");
    let config = config.unwrap();
    assert!(config.orchestrator.wait_for_rate_limit);

    let orchestrator = OperationOrchestrator::with_config(config);
    orchestrator
        .register_plugin("jira", MockPlugin::new("jira").into_arc() as _)
        .unwrap();

    // Ten tokens per second: the second call waits instead of failing
    let cancel = CancellationToken::new();
    let first = orchestrator
        .execute_operation(&Operation::fetch("jira", "A"), &cancel)
        .await;
    let second = orchestrator
        .execute_operation(&Operation::fetch("jira", "B"), &cancel)
        .await;
    assert!(first.success);
    assert!(second.success);
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = write_config("orchestrator:\n  base_delay_ms: 5000\n  max_delay_ms: 10\n");
    let err = ZenConfig::load_with_prefix(Some(file.path()), "ZEN_IT_INVALID").unwrap_err();
    assert!(err.to_string().contains("base_delay_ms"));
}
