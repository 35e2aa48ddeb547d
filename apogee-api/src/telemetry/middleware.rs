//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in a tracing span, records Prometheus metrics and
//! logs completion.

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::with_metrics;

static DATE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d{4}-\d{2}-\d{2}(/|$)").expect("Invalid date regex"));

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("Invalid ID regex"));

/// Normalize path for metrics/spans (replace dates and numeric IDs with placeholders).
///
/// This prevents high-cardinality label explosion in Prometheus. Rover names
/// are a closed set and stay as-is.
fn normalize_path(path: &str) -> String {
    let result = DATE_SEGMENT.replace_all(path, "/{date}$1");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}

/// Observability middleware for Axum.
///
/// This middleware wraps every request with:
/// 1. A tracing span carrying method and normalized route
/// 2. Prometheus metrics recording
/// 3. Request/response logging
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    with_metrics(|m| {
        m.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        )
    });

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_date() {
        let normalized = normalize_path("/api/v1/apod/2024-03-15");
        assert_eq!(normalized, "/api/v1/apod/{date}");
    }

    #[test]
    fn test_normalize_path_numeric_id() {
        let normalized = normalize_path("/api/v1/items/12345");
        assert_eq!(normalized, "/api/v1/items/{id}");
    }

    #[test]
    fn test_normalize_path_rover_kept() {
        let normalized = normalize_path("/api/v1/rovers/curiosity/photos");
        assert_eq!(normalized, "/api/v1/rovers/curiosity/photos");
    }

    #[test]
    fn test_normalize_path_health() {
        let normalized = normalize_path("/health/ready");
        assert_eq!(normalized, "/health/ready");
    }
}
