//! Compass Telemetry - Observability Infrastructure
//!
//! OpenTelemetry tracing and Prometheus metrics for the API layer.
//! Everything works without an OTLP collector; exporting is opt-in.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, CompassMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, shutdown_tracer, TelemetryConfig, TelemetryGuard};
