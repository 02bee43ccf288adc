//! Prometheus Metrics Definitions
//!
//! Defines all Canto metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use canto_storage::{PassKind, PassObserver};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Store operation latency buckets (seconds)
const STORE_LATENCY_BUCKETS: &[f64] =
    &[0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0];

/// Response body size buckets (bytes)
const RESPONSE_SIZE_BUCKETS: &[f64] = &[
    16.0, 64.0, 256.0, 1024.0, 4096.0, 16384.0, 65536.0, 262144.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<CantoMetrics>> = Lazy::new(CantoMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static CantoMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all Canto metrics.
#[derive(Clone)]
pub struct CantoMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Serialized response body size - labels: route, status
    pub http_response_size_bytes: HistogramVec,

    /// Histogram reads - labels: outcome (hit, miss, error)
    pub cache_lookups_total: CounterVec,

    /// Completed and failed passes - labels: kind (populate, ingest), outcome
    pub cache_passes_total: CounterVec,

    /// Store operation duration - labels: operation, status
    pub store_operation_duration_seconds: HistogramVec,

    /// Upstream document fetches - labels: outcome
    pub upstream_fetches_total: CounterVec,
}

impl CantoMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "canto_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "canto_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            http_response_size_bytes: register_histogram_vec!(
                "canto_http_response_size_bytes",
                "Serialized JSON response body size in bytes",
                &["route", "status"],
                RESPONSE_SIZE_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_response_size_bytes", e))?,

            cache_lookups_total: register_counter_vec!(
                "canto_cache_lookups_total",
                "Histogram reads by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("cache_lookups_total", e))?,

            cache_passes_total: register_counter_vec!(
                "canto_cache_passes_total",
                "Populate and ingest passes by outcome",
                &["kind", "outcome"]
            )
            .map_err(|e| registration_error("cache_passes_total", e))?,

            store_operation_duration_seconds: register_histogram_vec!(
                "canto_store_operation_duration_seconds",
                "Histogram store operation duration in seconds",
                &["operation", "status"],
                STORE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("store_operation_duration_seconds", e))?,

            upstream_fetches_total: register_counter_vec!(
                "canto_upstream_fetches_total",
                "Document store fetches by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("upstream_fetches_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record the size of a serialized response body.
    pub fn record_response_size(&self, route: &str, status: u16, bytes: usize) {
        let status_str = status.to_string();
        self.http_response_size_bytes
            .with_label_values(&[route, status_str.as_str()])
            .observe(bytes as f64);
    }

    /// Record a histogram read.
    pub fn record_lookup(&self, outcome: &str) {
        self.cache_lookups_total.with_label_values(&[outcome]).inc();
    }

    /// Record a populate or ingest pass.
    pub fn record_pass(&self, kind: &str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.cache_passes_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Record a histogram store operation.
    pub fn record_store_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.store_operation_duration_seconds
            .with_label_values(&[operation, status])
            .observe(duration_secs);
    }

    /// Record an upstream document fetch.
    pub fn record_upstream_fetch(&self, outcome: &str) {
        self.upstream_fetches_total
            .with_label_values(&[outcome])
            .inc();
    }
}

/// Feeds settled cache passes into `canto_cache_passes_total`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassMetrics;

impl PassObserver for PassMetrics {
    fn pass_finished(&self, kind: PassKind, success: bool) {
        if let Some(metrics) = metrics() {
            metrics.record_pass(kind.as_str(), success);
        }
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Registers on first scrape if nothing has recorded yet.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_lookup_and_pass() -> Result<(), String> {
        let metrics = metrics().ok_or("Metrics init failed")?;
        let before = metrics.cache_lookups_total.with_label_values(&["hit"]).get();
        metrics.record_lookup("hit");
        assert!(metrics.cache_lookups_total.with_label_values(&["hit"]).get() >= before + 1.0);

        metrics.record_pass("populate", true);
        assert!(
            metrics
                .cache_passes_total
                .with_label_values(&["populate", "success"])
                .get()
                >= 1.0
        );
        Ok(())
    }

    #[test]
    fn test_pass_metrics_observer() -> Result<(), String> {
        let metrics = metrics().ok_or("Metrics init failed")?;
        let failed = || {
            metrics
                .cache_passes_total
                .with_label_values(&["ingest", "error"])
                .get()
        };
        let before = failed();
        PassMetrics.pass_finished(PassKind::Ingest, false);
        assert!(failed() >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = metrics().ok_or("Metrics init failed")?;
        metrics.record_http_request("GET", "/api/v1/keyvalue/:book/:canto/:verse", 200, 0.012);
        metrics.record_response_size("/api/v1/keyvalue/:book/:canto/:verse", 200, 42);
        metrics.record_store_operation("HGETALL", true, 0.001);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| e.to_string())?;
        let text = String::from_utf8(buffer).map_err(|e| e.to_string())?;
        assert!(text.contains("canto_http_requests_total"));
        assert!(text.contains("canto_store_operation_duration_seconds"));
        Ok(())
    }
}
