//! Operation metrics collected by the orchestrator.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-plugin operation counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOperationMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub rate_limited: u64,
    pub circuit_rejected: u64,
}

/// Snapshot of everything the orchestrator has executed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    /// Operations that needed more than one attempt
    pub retried_operations: u64,
    pub rate_limit_hits: u64,
    pub circuit_breaker_rejections: u64,
    pub cancelled_operations: u64,
    /// Operations that reached a plugin, whatever the result
    pub executed_operations: u64,
    /// Summed over `executed_operations`
    pub total_duration: Duration,
    pub per_plugin: HashMap<String, PluginOperationMetrics>,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn average_duration(&self) -> Duration {
        if self.executed_operations == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.executed_operations.min(u64::from(u32::MAX)) as u32
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }
        self.successful_operations as f64 / self.total_operations as f64
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Operations: {} total, {} ok, {} failed, {} retried, {} rate limited, {} circuit rejected, {} cancelled ({:.1}% success, avg {:?})",
            self.total_operations,
            self.successful_operations,
            self.failed_operations,
            self.retried_operations,
            self.rate_limit_hits,
            self.circuit_breaker_rejections,
            self.cancelled_operations,
            self.success_rate() * 100.0,
            self.average_duration(),
        )
    }
}

/// Thread-safe accumulator behind [`OperationMetrics`]
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    inner: Mutex<OperationMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Succeeded,
    Failed,
    RateLimited,
    CircuitRejected,
    Cancelled,
}

impl MetricsCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, plugin: &str, outcome: Outcome, duration: Duration, retried: bool) {
        let mut metrics = self.inner.lock();
        metrics.total_operations += 1;
        if retried {
            metrics.retried_operations += 1;
        }

        match outcome {
            Outcome::Succeeded => {
                metrics.successful_operations += 1;
                metrics.executed_operations += 1;
                metrics.total_duration += duration;
            }
            Outcome::Failed => {
                metrics.failed_operations += 1;
                metrics.executed_operations += 1;
                metrics.total_duration += duration;
            }
            Outcome::RateLimited => {
                metrics.failed_operations += 1;
                metrics.rate_limit_hits += 1;
            }
            Outcome::CircuitRejected => {
                metrics.failed_operations += 1;
                metrics.circuit_breaker_rejections += 1;
            }
            Outcome::Cancelled => {
                metrics.failed_operations += 1;
                metrics.cancelled_operations += 1;
            }
        }

        let per_plugin = metrics.per_plugin.entry(plugin.to_string()).or_default();
        per_plugin.total += 1;
        match outcome {
            Outcome::Succeeded => per_plugin.successful += 1,
            Outcome::RateLimited => {
                per_plugin.failed += 1;
                per_plugin.rate_limited += 1;
            }
            Outcome::CircuitRejected => {
                per_plugin.failed += 1;
                per_plugin.circuit_rejected += 1;
            }
            Outcome::Failed | Outcome::Cancelled => per_plugin.failed += 1,
        }
    }

    pub(crate) fn snapshot(&self) -> OperationMetrics {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let metrics = OperationMetrics::new();
        assert_eq!(metrics.average_duration(), Duration::ZERO);
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn test_collector_counts_outcomes() {
        let collector = MetricsCollector::new();
        collector.record("jira", Outcome::Succeeded, Duration::from_millis(100), false);
        collector.record("jira", Outcome::Failed, Duration::from_millis(300), true);
        collector.record("jira", Outcome::RateLimited, Duration::ZERO, false);
        collector.record("github", Outcome::CircuitRejected, Duration::ZERO, false);
        collector.record("github", Outcome::Cancelled, Duration::ZERO, false);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_operations, 5);
        assert_eq!(snapshot.successful_operations, 1);
        assert_eq!(snapshot.failed_operations, 4);
        assert_eq!(snapshot.retried_operations, 1);
        assert_eq!(snapshot.rate_limit_hits, 1);
        assert_eq!(snapshot.circuit_breaker_rejections, 1);
        assert_eq!(snapshot.cancelled_operations, 1);
        assert_eq!(snapshot.executed_operations, 2);
        assert_eq!(snapshot.average_duration(), Duration::from_millis(200));

        let jira = &snapshot.per_plugin["jira"];
        assert_eq!(jira.total, 3);
        assert_eq!(jira.successful, 1);
        assert_eq!(jira.rate_limited, 1);
        assert_eq!(snapshot.per_plugin["github"].circuit_rejected, 1);
    }

    #[test]
    fn test_average_ignores_operations_that_never_ran() {
        let collector = MetricsCollector::new();
        collector.record("jira", Outcome::Failed, Duration::from_millis(90), false);
        for _ in 0..5 {
            collector.record("jira", Outcome::RateLimited, Duration::ZERO, false);
        }
        assert_eq!(collector.snapshot().average_duration(), Duration::from_millis(90));

        let rejected_only = MetricsCollector::new();
        rejected_only.record("github", Outcome::CircuitRejected, Duration::ZERO, false);
        assert_eq!(rejected_only.snapshot().average_duration(), Duration::ZERO);
    }

    #[test]
    fn test_format_summary() {
        let collector = MetricsCollector::new();
        collector.record("jira", Outcome::Succeeded, Duration::from_millis(10), false);
        let summary = collector.snapshot().format_summary();
        assert!(summary.contains("1 total"));
        assert!(summary.contains("100.0% success"));
    }
}
