//! Metrics collection for PredictLoop
//!
//! This module provides Prometheus metrics for observability.
//! Handlers only ever increment counters, so sharing a registry across
//! connections introduces no ordering between them.

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics registry for PredictLoop
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub connections: ConnectionMetrics,
    pub requests: RequestMetrics,
}

/// Connection lifecycle metrics
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    /// Total number of accepted connections
    pub opened_total: IntCounter,

    /// Connections that ended on a transport error
    pub failed_total: IntCounter,

    /// Currently open connections
    pub active: IntGauge,
}

/// Prediction request metrics
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    /// Total number of prediction requests
    pub requests_total: IntCounter,

    /// Total number of successful requests
    pub requests_success: IntCounter,

    /// Total number of failed requests
    pub requests_failed: IntCounter,

    /// Requests rejected by the decoder
    pub decode_errors: IntCounter,

    /// Requests whose arity did not match the model
    pub shape_mismatches: IntCounter,

    /// Model predict duration
    pub predict_duration: Histogram,
}

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let metric = IntCounter::new(name, help).expect("valid counter definition");
    registry
        .register(Box::new(metric.clone()))
        .expect("counter registered once");
    metric
}

fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let metric = IntGauge::new(name, help).expect("valid gauge definition");
    registry
        .register(Box::new(metric.clone()))
        .expect("gauge registered once");
    metric
}

fn histogram(registry: &Registry, name: &str, help: &str, buckets: Vec<f64>) -> Histogram {
    let metric = Histogram::with_opts(HistogramOpts::new(name, help).buckets(buckets))
        .expect("valid histogram definition");
    registry
        .register(Box::new(metric.clone()))
        .expect("histogram registered once");
    metric
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let connections = ConnectionMetrics {
            opened_total: counter(
                &registry,
                "predictloop_connections_opened_total",
                "Total number of accepted connections",
            ),
            failed_total: counter(
                &registry,
                "predictloop_connections_failed_total",
                "Connections terminated by a transport error",
            ),
            active: gauge(
                &registry,
                "predictloop_connections_active",
                "Current number of open connections",
            ),
        };

        let requests = RequestMetrics {
            requests_total: counter(
                &registry,
                "predictloop_requests_total",
                "Total number of prediction requests",
            ),
            requests_success: counter(
                &registry,
                "predictloop_requests_success_total",
                "Total number of successful prediction requests",
            ),
            requests_failed: counter(
                &registry,
                "predictloop_requests_failed_total",
                "Total number of failed prediction requests",
            ),
            decode_errors: counter(
                &registry,
                "predictloop_decode_errors_total",
                "Requests rejected because the feature list was malformed",
            ),
            shape_mismatches: counter(
                &registry,
                "predictloop_shape_mismatches_total",
                "Requests whose feature count did not match the model",
            ),
            predict_duration: histogram(
                &registry,
                "predictloop_predict_duration_seconds",
                "Model predict duration in seconds",
                vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05],
            ),
        };

        MetricsRegistry {
            registry,
            connections,
            requests,
        }
    }

    /// Gather all metrics as text
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# failed to encode metrics: {}\n", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper trait for measuring latency
pub trait LatencyTimer {
    /// Observe the duration of a closure
    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R;
}

impl LatencyTimer for Histogram {
    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = std::time::Instant::now();
        let result = f();
        self.observe(start.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry() {
        let metrics = MetricsRegistry::new();

        metrics.requests.requests_total.inc();
        metrics.connections.active.inc();
        metrics.requests.shape_mismatches.inc_by(2);

        let output = metrics.gather();
        assert!(output.contains("predictloop_requests_total 1"));
        assert!(output.contains("predictloop_connections_active 1"));
        assert!(output.contains("predictloop_shape_mismatches_total 2"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = MetricsRegistry::new();
        let second = MetricsRegistry::new();

        first.requests.decode_errors.inc();

        assert_eq!(first.requests.decode_errors.get(), 1);
        assert_eq!(second.requests.decode_errors.get(), 0);
    }

    #[test]
    fn test_latency_timer() {
        let metrics = MetricsRegistry::new();

        let value = metrics.requests.predict_duration.time(|| 40 + 2);

        assert_eq!(value, 42);
        assert_eq!(metrics.requests.predict_duration.get_sample_count(), 1);
    }
}
