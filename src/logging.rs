//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestration core. Console
//! output is always on; a JSON file layer can be added for post-mortem
//! debugging of long-running sagas.
//!
//! The filter comes from `ZEN_LOG` when set, then from
//! [`LoggingConfig::level`], then from the environment (`ZEN_ENV`).

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

pub const LOG_FILTER_ENV: &str = "ZEN_LOG";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging with environment defaults
pub fn init_structured_logging() {
    init_with_config(&LoggingConfig::default());
}

/// Initialize logging once per process; later calls are no-ops
pub fn init_with_config(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let directive = std::env::var(LOG_FILTER_ENV)
            .ok()
            .or_else(|| config.level.clone())
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(&directive));

        let (file_layer, log_path) = match file_writer(config, &environment) {
            Some((writer, path)) => (
                Some(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(EnvFilter::new(&directive)),
                ),
                Some(path),
            ),
            None => (None, None),
        };

        // Embedding applications may already own the global subscriber
        if tracing_subscriber::registry()
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            filter = %directive,
            log_file = ?log_path.map(|p| p.display().to_string()),
            "Structured logging initialized"
        );
    });
}

fn file_writer(
    config: &LoggingConfig,
    environment: &str,
) -> Option<(tracing_appender::non_blocking::NonBlocking, PathBuf)> {
    if !config.file_output {
        return None;
    }

    let log_dir = PathBuf::from(&config.directory);
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("zen: cannot create log directory {}: {e}", log_dir.display());
        return None;
    }

    let file_name = format!(
        "{}.{}.{}.log",
        environment,
        process::id(),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // The writer must outlive every log call in the process
    std::mem::forget(guard);
    Some((writer, log_dir.join(file_name)))
}

fn get_environment() -> String {
    std::env::var("ZEN_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log the outcome of a single orchestrated operation
pub fn log_operation(
    operation_id: &str,
    plugin: &str,
    operation_type: &str,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation_id = %operation_id,
        plugin = %plugin,
        operation_type = %operation_type,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "OPERATION"
    );
}

pub fn log_transaction(
    transaction_id: &str,
    operation_count: usize,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        transaction_id = %transaction_id,
        operation_count = operation_count,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "TRANSACTION"
    );
}

/// Log plugin lifecycle events (register, initialize, shutdown)
pub fn log_plugin_operation(
    operation: &str,
    plugin: &str,
    version: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        plugin = %plugin,
        version = version,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "PLUGIN_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("ZEN_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("ZEN_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
    }

    #[test]
    fn test_file_output_disabled_by_default() {
        assert!(file_writer(&LoggingConfig::default(), "test").is_none());
    }

    #[test]
    fn test_file_output_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: Some("info".to_string()),
            file_output: true,
            directory: dir.path().join("nested").display().to_string(),
        };

        let (_writer, path) = file_writer(&config, "test").unwrap();
        assert!(path.starts_with(dir.path().join("nested")));
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_operation("op-1", "jira", "fetch", "success", Some(3), None);
        log_error("orchestrator", "fetch", "boom", Some("test"));
    }
}
