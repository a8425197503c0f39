//! Health Check Endpoints
//!
//! - /health/ping - pong
//! - /health/live - process is up
//! - /health/ready - the simulator fallback path is usable
//!
//! Readiness tracks the simulator only. The real providers are optional and
//! their outages are absorbed by fallback, so they never make the service
//! unready.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use compass_core::HealthStatus;
use serde::{Deserialize, Serialize};

use crate::constants::SIMULATOR_SERVICE;
use crate::monitoring::HealthMonitor;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Liveness/readiness body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

/// Readiness details: the fallback path plus which real providers are
/// currently being routed around.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub simulator: HealthStatus,
    /// Real-provider services whose requests currently go to the simulator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub falling_back: Vec<String>,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
))]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
))]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (simulator probed and not unhealthy)
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse),
    ),
))]
pub async fn readiness(
    State(health): State<Arc<HealthMonitor>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let ready = health.is_ready();
    let simulator = health.status(SIMULATOR_SERVICE);
    let falling_back = health
        .services()
        .into_iter()
        .filter(|(name, record)| {
            name != SIMULATOR_SERVICE && record.status == HealthStatus::Unhealthy
        })
        .map(|(name, _)| name)
        .collect();

    let response = HealthResponse {
        status: if ready {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        message: (!ready).then(|| "Simulator has not passed a health probe".to_string()),
        details: Some(HealthDetails {
            simulator,
            falling_back,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router, mounted at `/health`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
