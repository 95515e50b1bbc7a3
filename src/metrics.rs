/// Prometheus metrics for the journey engine
///
/// Operation counters and latencies per service operation, plus domain
/// counters for journeys, resources and the coaching chat.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics registry instance
pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    /// Service operation (e.g. "start_journey", "send_chat")
    pub operation: String,
    /// "success" or "error"
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub operation: String,
    /// Error category from `ErrorCode::category`
    pub category: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DurationLabels {
    pub operation: String,
}

pub struct MetricsCollector {
    registry: RwLock<Registry>,

    pub operations_total: Family<OperationLabels, Counter>,
    pub operation_duration_seconds: Family<DurationLabels, Histogram>,
    pub errors_total: Family<ErrorLabels, Counter>,

    pub journeys_started_total: Counter,
    pub journeys_completed_total: Counter,
    pub resources_completed_total: Counter,
    pub chat_turns_total: Counter,
    pub crisis_detections_total: Counter,
    pub completion_fallbacks_total: Counter,
    pub store_conflicts_total: Counter,
}

impl MetricsCollector {
    /// Create a new metrics collector with all metrics registered
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let operations_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "journey_operations_total",
            "Total number of service operations by outcome",
            operations_total.clone(),
        );

        let operation_duration_seconds =
            Family::<DurationLabels, Histogram>::new_with_constructor(|| {
                // 1ms .. ~16s
                Histogram::new(exponential_buckets(0.001, 2.5, 12))
            });
        registry.register(
            "journey_operation_duration_seconds",
            "Service operation latency in seconds",
            operation_duration_seconds.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "journey_errors_total",
            "Total number of errors by operation and category",
            errors_total.clone(),
        );

        let counter = |registry: &mut Registry, name: &str, help: &str| {
            let counter = Counter::default();
            registry.register(name, help, counter.clone());
            counter
        };

        let journeys_started_total = counter(
            &mut registry,
            "journey_journeys_started_total",
            "Journeys started",
        );
        let journeys_completed_total = counter(
            &mut registry,
            "journey_journeys_completed_total",
            "Journeys that reached the seventh step",
        );
        let resources_completed_total = counter(
            &mut registry,
            "journey_resources_completed_total",
            "Resource completions, including repeats",
        );
        let chat_turns_total = counter(
            &mut registry,
            "journey_chat_turns_total",
            "Chat messages handled",
        );
        let crisis_detections_total = counter(
            &mut registry,
            "journey_crisis_detections_total",
            "Chat messages that matched a crisis phrase",
        );
        let completion_fallbacks_total = counter(
            &mut registry,
            "journey_completion_fallbacks_total",
            "Chat replies served from the fallback message",
        );
        let store_conflicts_total = counter(
            &mut registry,
            "journey_store_conflicts_total",
            "Saves rejected because the user document was stale",
        );

        Self {
            registry: RwLock::new(registry),
            operations_total,
            operation_duration_seconds,
            errors_total,
            journeys_started_total,
            journeys_completed_total,
            resources_completed_total,
            chat_turns_total,
            crisis_detections_total,
            completion_fallbacks_total,
            store_conflicts_total,
        }
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        let registry = self.registry.read();
        if let Err(e) = encode(&mut buffer, &registry) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        buffer
    }

    pub fn record_operation_success(&self, operation: &str, duration: Duration) {
        self.record_outcome(operation, "success", duration);
    }

    pub fn record_operation_error(&self, operation: &str, duration: Duration, category: &str) {
        self.record_outcome(operation, "error", duration);
        self.errors_total
            .get_or_create(&ErrorLabels {
                operation: operation.to_string(),
                category: category.to_string(),
            })
            .inc();
    }

    fn record_outcome(&self, operation: &str, status: &str, duration: Duration) {
        self.operations_total
            .get_or_create(&OperationLabels {
                operation: operation.to_string(),
                status: status.to_string(),
            })
            .inc();
        self.operation_duration_seconds
            .get_or_create(&DurationLabels {
                operation: operation.to_string(),
            })
            .observe(duration.as_secs_f64());
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Times one service operation and records its outcome on the global collector.
///
/// A guard dropped without `success` or `error` counts as an error in
/// category "unknown".
pub struct OperationMetrics {
    operation: &'static str,
    start: Instant,
    completed: bool,
}

impl OperationMetrics {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
            completed: false,
        }
    }

    pub fn success(mut self) {
        METRICS.record_operation_success(self.operation, self.start.elapsed());
        self.completed = true;
    }

    pub fn error(mut self, category: &str) {
        METRICS.record_operation_error(self.operation, self.start.elapsed(), category);
        self.completed = true;
    }
}

impl Drop for OperationMetrics {
    fn drop(&mut self) {
        if !self.completed {
            METRICS.record_operation_error(self.operation, self.start.elapsed(), "unknown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let output = MetricsCollector::new().encode();
        assert!(output.contains("journey_operations_total"));
        assert!(output.contains("journey_operation_duration_seconds"));
        assert!(output.contains("journey_errors_total"));
        assert!(output.contains("journey_journeys_started_total"));
        assert!(output.contains("journey_crisis_detections_total"));
        assert!(output.contains("journey_store_conflicts_total"));
    }

    #[test]
    fn test_record_operation_outcomes() {
        let collector = MetricsCollector::new();
        collector.record_operation_success("start_journey", Duration::from_millis(3));
        collector.record_operation_error("pause_journey", Duration::from_millis(1), "not_found");

        let output = collector.encode();
        assert!(output.contains("start_journey"));
        assert!(output.contains("success"));
        assert!(output.contains("pause_journey"));
        assert!(output.contains("not_found"));
    }

    #[test]
    fn test_domain_counters() {
        let collector = MetricsCollector::new();
        collector.journeys_started_total.inc();
        collector.crisis_detections_total.inc();
        collector.crisis_detections_total.inc();
        assert_eq!(collector.crisis_detections_total.get(), 2);
        assert_eq!(collector.journeys_started_total.get(), 1);
    }

    #[test]
    fn test_guard_records_on_global_collector() {
        OperationMetrics::new("metrics_guard_test").success();
        OperationMetrics::new("metrics_guard_test").error("validation_error");
        drop(OperationMetrics::new("metrics_guard_test"));

        let output = METRICS.encode();
        assert!(output.contains("metrics_guard_test"));
        assert!(output.contains("validation_error"));
        assert!(output.contains("unknown"));
    }
}
