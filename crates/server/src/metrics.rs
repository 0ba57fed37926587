use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder};

/// Metrics collects and exposes HTTP server and order-transition metrics.
pub(crate) struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
    transitions_total: CounterVec,
    tolerated_failures: IntGauge,
}

impl Metrics {
    pub(crate) fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration in seconds"),
            &["method", "endpoint"],
        )?;
        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )?;
        let transitions_total = CounterVec::new(
            Opts::new("order_transitions_total", "Order and assignment transitions by outcome"),
            &["operation", "outcome"],
        )?;
        let tolerated_failures = IntGauge::new(
            "tolerated_side_effect_failures",
            "Notification, audit, history, POS, and reservation failures swallowed since start",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(tolerated_failures.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
            transitions_total,
            tolerated_failures,
        })
    }

    pub(crate) fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    pub(crate) fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total.with_label_values(&[source, endpoint]).inc();
    }

    pub(crate) fn record_transition(&self, operation: &str, outcome: &str) {
        self.transitions_total.with_label_values(&[operation, outcome]).inc();
    }

    pub(crate) fn set_tolerated_failures(&self, count: u64) {
        self.tolerated_failures.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Text exposition format of every registered metric.
    pub(crate) fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics are not valid UTF-8")
    }
}
