//! Prometheus Metrics Definitions
//!
//! Registers the relay metrics with the default Prometheus registry and
//! exposes them at `/actuator/prometheus`.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<RelayMetrics>> = Lazy::new(RelayMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static RelayMetrics> {
    METRICS.as_ref().ok()
}

#[derive(Clone)]
pub struct RelayMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// labels: kind, outcome
    pub messages_relayed_total: CounterVec,

    /// labels: kind, outcome
    pub notifications_total: CounterVec,
}

impl RelayMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "relay_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register http_requests_total: {}", e))
            })?,

            http_request_duration_seconds: register_histogram_vec!(
                "relay_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register http_request_duration_seconds: {}",
                    e
                ))
            })?,

            messages_relayed_total: register_counter_vec!(
                "relay_messages_relayed_total",
                "Messages relayed to the chat backend",
                &["kind", "outcome"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register messages_relayed_total: {}",
                    e
                ))
            })?,

            notifications_total: register_counter_vec!(
                "relay_notifications_total",
                "Mail notifications sent to the user service",
                &["kind", "outcome"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register notifications_total: {}", e))
            })?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record one relayed message of `kind` (group, feedback, forward, ...).
    pub fn record_message_relayed(&self, kind: &str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.messages_relayed_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    pub fn record_notification(&self, kind: &str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.notifications_total
            .with_label_values(&[kind, outcome])
            .inc();
    }
}

/// Handler for GET /actuator/prometheus.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/actuator/prometheus",
    tag = "Actuator",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure the relay metrics are registered before the first scrape
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
