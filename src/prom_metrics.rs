//! # Prometheus Metrics
//!
//! Service metrics in the Prometheus text exposition format, served at
//! `GET /metrics`.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `stockcount_http_request_duration_seconds` | Histogram | `method`, `path` | Request latency |
//! | `stockcount_counts_recorded_total` | Counter | `warehouse` | Accepted count submissions |
//! | `stockcount_sessions_started_total` | Counter | | Counting sessions opened |
//! | `stockcount_sessions_completed_total` | Counter | | Counting sessions ended |
//! | `stockcount_audit_write_failures_total` | Counter | | Audit appends that failed and were dropped |
//!
//! `path` is normalised by the HTTP layer so ids do not explode cardinality.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WarehouseLabel {
    pub warehouse: String,
}

/// Metrics registry shared by all handlers. Every metric is atomic.
pub struct Metrics {
    pub registry: Registry,
    pub http_request_duration: Family<HttpLabel, Histogram>,
    pub counts_recorded: Family<WarehouseLabel, Counter>,
    pub sessions_started: Counter,
    pub sessions_completed: Counter,
    pub audit_write_failures: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        // 5ms .. ~10s
        let http_request_duration =
            Family::<HttpLabel, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.005, 2.0, 12))
            });
        registry.register(
            "stockcount_http_request_duration_seconds",
            "HTTP request latency by method and normalised path",
            http_request_duration.clone(),
        );

        let counts_recorded = Family::<WarehouseLabel, Counter>::default();
        registry.register(
            "stockcount_counts_recorded",
            "Count submissions accepted, by warehouse",
            counts_recorded.clone(),
        );

        let sessions_started = Counter::default();
        registry.register(
            "stockcount_sessions_started",
            "Counting sessions opened",
            sessions_started.clone(),
        );

        let sessions_completed = Counter::default();
        registry.register(
            "stockcount_sessions_completed",
            "Counting sessions ended",
            sessions_completed.clone(),
        );

        let audit_write_failures = Counter::default();
        registry.register(
            "stockcount_audit_write_failures",
            "Audit log appends that failed and were dropped",
            audit_write_failures.clone(),
        );

        Self {
            registry,
            http_request_duration,
            counts_recorded,
            sessions_started,
            sessions_completed,
            audit_write_failures,
        }
    }

    pub fn record_count(&self, warehouse: &str) {
        self.counts_recorded
            .get_or_create(&WarehouseLabel {
                warehouse: warehouse.to_string(),
            })
            .inc();
    }

    pub fn observe_request(&self, method: &str, path: &str, seconds: f64) {
        self.http_request_duration
            .get_or_create(&HttpLabel {
                method: method.to_string(),
                path: path.to_string(),
            })
            .observe(seconds);
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).expect("encoding metrics into a String cannot fail");
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_contains_every_metric() {
        let m = Metrics::new();
        let output = m.encode();
        assert!(output.contains("stockcount_http_request_duration_seconds"));
        assert!(output.contains("# TYPE stockcount_counts_recorded counter"));
        assert!(output.contains("stockcount_sessions_started_total"));
        assert!(output.contains("stockcount_sessions_completed_total"));
        assert!(output.contains("stockcount_audit_write_failures_total"));
    }

    #[test]
    fn counts_are_labelled_per_warehouse() {
        let m = Metrics::new();
        m.record_count("A");
        m.record_count("A");
        m.record_count("B");

        let output = m.encode();
        assert!(output.contains(r#"stockcount_counts_recorded_total{warehouse="A"} 2"#));
        assert!(output.contains(r#"stockcount_counts_recorded_total{warehouse="B"} 1"#));
    }

    #[test]
    fn request_latency_lands_in_histogram() {
        let m = Metrics::new();
        m.observe_request("GET", "/api/bin-master", 0.012);

        let output = m.encode();
        assert!(output.contains(
            r#"stockcount_http_request_duration_seconds_count{method="GET",path="/api/bin-master"} 1"#
        ));
    }

    #[test]
    fn session_counters_start_at_zero() {
        let m = Metrics::new();
        m.sessions_started.inc();
        let output = m.encode();
        assert!(output.contains("stockcount_sessions_started_total 1"));
        assert!(output.contains("stockcount_sessions_completed_total 0"));
    }
}
