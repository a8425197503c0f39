//! Prometheus Metrics Definitions
//!
//! Process-wide counters and histograms exposed at `/metrics` for scraping.
//! These are independent of the in-process `MetricsAggregator`, which keeps
//! the rolling window behind the dashboard.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Provider call latency buckets (seconds). Real calls are bounded by the
/// orchestrator timeout, so nothing above 10s is expected.
const PROVIDER_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.025, 0.100, 0.250, 0.500, 1.0, 2.0, 3.0, 5.0, 10.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<CompassMetrics>> = Lazy::new(CompassMetrics::new);

/// Container for all Compass metrics.
#[derive(Clone)]
pub struct CompassMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Provider attempts - labels: service, provider, outcome
    pub provider_attempts_total: CounterVec,

    /// Simulator fallbacks - labels: service, reason
    pub fallbacks_total: CounterVec,

    /// Provider call latency - labels: service, provider
    pub provider_latency_seconds: HistogramVec,

    /// Health probes - labels: service, outcome
    pub health_probes_total: CounterVec,

    /// Currently open alerts
    pub active_alerts: Gauge,
}

impl CompassMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "compass_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "compass_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            provider_attempts_total: register_counter_vec!(
                "compass_provider_attempts_total",
                "Analysis attempts per provider and outcome",
                &["service", "provider", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register provider_attempts_total: {}", e)))?,

            fallbacks_total: register_counter_vec!(
                "compass_fallbacks_total",
                "Requests answered by the simulator instead of the real provider",
                &["service", "reason"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register fallbacks_total: {}", e)))?,

            provider_latency_seconds: register_histogram_vec!(
                "compass_provider_latency_seconds",
                "Provider call latency in seconds",
                &["service", "provider"],
                PROVIDER_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register provider_latency_seconds: {}", e)))?,

            health_probes_total: register_counter_vec!(
                "compass_health_probes_total",
                "Synthetic health probes per service and outcome",
                &["service", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register health_probes_total: {}", e)))?,

            active_alerts: register_gauge!(
                "compass_active_alerts",
                "Current number of unresolved alerts"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register active_alerts: {}", e)))?,
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

    /// Record one provider attempt and, when it completed, its latency.
    pub fn record_provider_attempt(
        &self,
        service: &str,
        provider: &str,
        outcome: &str,
        duration_secs: Option<f64>,
    ) {
        self.provider_attempts_total
            .with_label_values(&[service, provider, outcome])
            .inc();
        if let Some(secs) = duration_secs {
            self.provider_latency_seconds
                .with_label_values(&[service, provider])
                .observe(secs);
        }
    }

    /// Record a fallback to the simulator.
    pub fn record_fallback(&self, service: &str, reason: &str) {
        self.fallbacks_total.with_label_values(&[service, reason]).inc();
    }

    /// Record a health probe.
    pub fn record_health_probe(&self, service: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.health_probes_total
            .with_label_values(&[service, outcome])
            .inc();
    }

    /// Set the open alert count.
    pub fn set_active_alerts(&self, count: usize) {
        self.active_alerts.set(count as f64);
    }
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
