//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every HTTP request with:
//! - A server span that continues any incoming W3C `traceparent`
//! - Prometheus request counters and latency histograms
//! - A request-completed log line

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use opentelemetry::{
    global,
    trace::{SpanKind, Status, TraceContextExt, Tracer},
    Context, KeyValue,
};
use opentelemetry_http::HeaderExtractor;
use regex::Regex;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::METRICS;

static UUID_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
});

static ID_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"/\d+(/|$)"));

/// Service names are caller-supplied; collapse them so unknown names cannot
/// create new label values.
static SERVICE_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^/monitoring/health/[^/]+$"));

/// Extract trace context from incoming request headers.
fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Normalize path for metrics/spans (replace ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    if let Ok(re) = SERVICE_PATTERN.as_ref() {
        if re.is_match(path) {
            return "/monitoring/health/{service}".to_string();
        }
    }
    let mut result = path.to_string();
    if let Ok(re) = UUID_PATTERN.as_ref() {
        result = re.replace_all(&result, "{id}").into_owned();
    }
    if let Ok(re) = ID_PATTERN.as_ref() {
        result = re.replace_all(&result, "/{id}$1").into_owned();
    }
    result
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let parent_context = extract_trace_context(request.headers());

    let tracer = global::tracer("compass-api");
    let span = tracer
        .span_builder(format!("{} {}", method, normalized_path))
        .with_kind(SpanKind::Server)
        .with_attributes(vec![
            KeyValue::new("http.method", method.to_string()),
            KeyValue::new("http.target", path.clone()),
            KeyValue::new("http.route", normalized_path.clone()),
        ])
        .start_with_context(&tracer, &parent_context);

    let cx = Context::current_with_span(span);

    let tracing_span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
        otel.kind = "server",
    );

    let response = next.run(request).instrument(tracing_span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        );
    }

    cx.span()
        .set_attribute(KeyValue::new("http.status_code", status.as_u16() as i64));

    if status.is_server_error() {
        cx.span().set_status(Status::error("Server error"));
    } else if status.is_client_error() {
        cx.span().set_status(Status::error("Client error"));
    } else {
        cx.span().set_status(Status::Ok);
    }

    cx.span().end();

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/monitoring/alerts/01920c6e-8f3a-7b21-9c4d-5e6f7a8b9c0d/acknowledge";
        assert_eq!(normalize_path(path), "/monitoring/alerts/{id}/acknowledge");
    }

    #[test]
    fn test_normalize_path_numeric_id() {
        assert_eq!(normalize_path("/items/12345"), "/items/{id}");
    }

    #[test]
    fn test_normalize_path_service() {
        assert_eq!(
            normalize_path("/monitoring/health/made-up-service"),
            "/monitoring/health/{service}"
        );
        assert_eq!(normalize_path("/monitoring/health"), "/monitoring/health");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/analyze/text/key-phrases"), "/analyze/text/key-phrases");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }
}
