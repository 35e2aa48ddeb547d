//! Prometheus Metrics Definitions
//!
//! Defines all APOGEE metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
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

/// Upstream latency buckets (seconds). Rate-limit waits push the tail out to minutes.
const UPSTREAM_LATENCY_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 180.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<ApogeeMetrics>> = Lazy::new(ApogeeMetrics::new);

/// Container for all APOGEE metrics.
#[derive(Clone)]
pub struct ApogeeMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Upstream request counter - labels: endpoint, outcome
    pub upstream_requests_total: CounterVec,

    /// Upstream call duration including retry waits - labels: endpoint
    pub upstream_request_duration_seconds: HistogramVec,

    /// 429 responses that were retried - labels: endpoint
    pub upstream_retries_total: CounterVec,

    /// Freshness checks - labels: resource, result (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Manifest sync period writes - labels: rover, action (inserted/deleted/failed)
    pub sync_periods_total: CounterVec,

    /// Manifest sync runs - labels: rover, outcome (synced/skipped/failed)
    pub sync_runs_total: CounterVec,
}

impl ApogeeMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "apogee_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "apogee_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            upstream_requests_total: register_counter_vec!(
                "apogee_upstream_requests_total",
                "Total number of NASA API calls",
                &["endpoint", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register upstream_requests_total: {}", e)))?,

            upstream_request_duration_seconds: register_histogram_vec!(
                "apogee_upstream_request_duration_seconds",
                "NASA API call duration in seconds, including rate-limit waits",
                &["endpoint"],
                UPSTREAM_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register upstream_request_duration_seconds: {}", e)))?,

            upstream_retries_total: register_counter_vec!(
                "apogee_upstream_retries_total",
                "Total number of rate-limited NASA API calls that were retried",
                &["endpoint"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register upstream_retries_total: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "apogee_cache_lookups_total",
                "Freshness cache lookups",
                &["resource", "result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            sync_periods_total: register_counter_vec!(
                "apogee_sync_periods_total",
                "Manifest periods written during sync",
                &["rover", "action"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register sync_periods_total: {}", e)))?,

            sync_runs_total: register_counter_vec!(
                "apogee_sync_runs_total",
                "Manifest sync runs per rover",
                &["rover", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register sync_runs_total: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a finished upstream call. `outcome` is one of
    /// `success`, `rate_limited`, `failed`, `transport`, `invalid`.
    pub fn record_upstream_request(&self, endpoint: &str, outcome: &str, duration_secs: f64) {
        self.upstream_requests_total
            .with_label_values(&[endpoint, outcome])
            .inc();
        self.upstream_request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    pub fn record_upstream_retry(&self, endpoint: &str) {
        self.upstream_retries_total.with_label_values(&[endpoint]).inc();
    }

    /// Record a freshness check.
    pub fn record_cache_lookup(&self, resource: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total
            .with_label_values(&[resource, result])
            .inc();
    }

    /// Record period writes of one sync run.
    pub fn record_sync_periods(&self, rover: &str, inserted: u64, deleted: u64, failed: u64) {
        for (action, count) in [("inserted", inserted), ("deleted", deleted), ("failed", failed)] {
            if count > 0 {
                self.sync_periods_total
                    .with_label_values(&[rover, action])
                    .inc_by(count as f64);
            }
        }
    }

    pub fn record_sync_run(&self, rover: &str, outcome: &str) {
        self.sync_runs_total.with_label_values(&[rover, outcome]).inc();
    }
}

/// Run `f` against the global metrics, if they registered.
pub fn with_metrics(f: impl FnOnce(&ApogeeMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so an idle process still exports every family.
    let _ = Lazy::force(&METRICS);

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
    fn test_record_upstream_request() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        let before = metrics
            .upstream_requests_total
            .with_label_values(&["manifest", "success"])
            .get();
        metrics.record_upstream_request("manifest", "success", 0.2);
        metrics.record_upstream_retry("manifest");
        let after = metrics
            .upstream_requests_total
            .with_label_values(&["manifest", "success"])
            .get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_record_sync_periods_skips_zero() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_sync_periods("spirit", 3, 0, 1);
        assert!(
            metrics
                .sync_periods_total
                .with_label_values(&["spirit", "inserted"])
                .get()
                >= 3.0
        );
        metrics.record_sync_run("spirit", "synced");
        metrics.record_cache_lookup("apod", true);
        Ok(())
    }
}
