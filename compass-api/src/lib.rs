//! Compass API - AI Capability Orchestration Layer
//!
//! Serves image and text analysis for marketplace research. Each request is
//! routed to the real upstream provider when it is configured, healthy and
//! within quota, and to the deterministic simulator otherwise, so callers
//! only ever see failures caused by their own input.
//!
//! Alongside the request path, background jobs probe every provider on a
//! timer, fold the results into per-service health with alerting, and keep a
//! rolling window of metric samples for the monitoring dashboard.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod middleware;
pub mod monitoring;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use monitoring::{
    AlertStore, DashboardSnapshot, HealthMonitor, MetricsAggregator, MonitorSettings,
    SettingsHandle,
};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use orchestrator::{FallbackOrchestrator, OrchestratorConfig, RateLimiter, RateLimiterConfig};
pub use routes::create_api_router;
pub use state::{AppState, AppStateConfig};
pub use types::*;
