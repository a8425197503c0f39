//! Monitoring REST API Routes
//!
//! Read-only views over health, metrics and alerts, alert lifecycle actions,
//! and the runtime monitoring settings. Everything here reads the shared
//! components directly; nothing is cached.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    monitoring::{
        AlertStore, DashboardSnapshot, HealthMonitor, HealthSummary, MetricsAggregator,
        MonitorSettingsPatch, SettingsHandle,
    },
    state::AppState,
    types::{AlertListResponse, AlertQuery, MetricsQuery, MetricsQueryResponse},
};

#[cfg(feature = "openapi")]
use crate::monitoring::{AlertView, MonitorSettings};
#[cfg(feature = "openapi")]
use compass_core::ServiceHealth;

// ============================================================================
// DASHBOARD AND HEALTH
// ============================================================================

/// GET /monitoring/dashboard - Aggregated health, metrics and alert counts
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/monitoring/dashboard",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Dashboard snapshot", body = DashboardSnapshot),
    ),
))]
pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    Json(DashboardSnapshot::collect(
        &state.health,
        &state.metrics,
        &state.alerts,
        state.orchestrator.limiter(),
    ))
}

/// GET /monitoring/health - Overall health and every service
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/monitoring/health",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Health summary", body = HealthSummary),
    ),
))]
pub async fn health_summary(State(health): State<Arc<HealthMonitor>>) -> impl IntoResponse {
    Json(HealthSummary::collect(&health))
}

/// GET /monitoring/health/{service} - One service's health
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/monitoring/health/{service}",
    tag = "Monitoring",
    params(
        ("service" = String, Path, description = "Service name: vision, text or simulator")
    ),
    responses(
        (status = 200, description = "Service health", body = ServiceHealth),
        (status = 404, description = "Unknown service", body = ApiError),
    ),
))]
pub async fn service_health(
    State(health): State<Arc<HealthMonitor>>,
    Path(service): Path<String>,
) -> ApiResult<impl IntoResponse> {
    health
        .service(&service)
        .map(Json)
        .ok_or_else(|| ApiError::entity_not_found("Service", &service))
}

// ============================================================================
// METRICS
// ============================================================================

/// GET /monitoring/metrics - Raw retained metric samples
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/monitoring/metrics",
    tag = "Monitoring",
    params(MetricsQuery),
    responses(
        (status = 200, description = "Matching samples, oldest first", body = MetricsQueryResponse),
        (status = 400, description = "Invalid query", body = ApiError),
    ),
))]
pub async fn query_metrics(
    State(metrics): State<Arc<MetricsAggregator>>,
    Query(params): Query<MetricsQuery>,
) -> ApiResult<impl IntoResponse> {
    let since = params.since(Utc::now())?;
    let samples = metrics.query(
        params.service_name.as_deref(),
        params.metric_name.as_deref(),
        since,
    );
    Ok(Json(MetricsQueryResponse {
        count: samples.len(),
        samples,
        since,
    }))
}

// ============================================================================
// ALERTS
// ============================================================================

/// GET /monitoring/alerts - List alerts, newest first
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/monitoring/alerts",
    tag = "Monitoring",
    params(AlertQuery),
    responses(
        (status = 200, description = "Matching alerts", body = AlertListResponse),
        (status = 400, description = "Invalid query", body = ApiError),
    ),
))]
pub async fn list_alerts(
    State(alerts): State<Arc<AlertStore>>,
    Query(params): Query<AlertQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    let alerts = alerts.list(&filter);
    Ok(Json(AlertListResponse {
        total: alerts.len(),
        alerts,
    }))
}

/// POST /monitoring/alerts/{id}/acknowledge - Acknowledge an alert
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/monitoring/alerts/{id}/acknowledge",
    tag = "Monitoring",
    params(
        ("id" = Uuid, Path, description = "Alert ID")
    ),
    responses(
        (status = 200, description = "Alert acknowledged", body = AlertView),
        (status = 404, description = "Alert not found", body = ApiError),
    ),
))]
pub async fn acknowledge_alert(
    State(alerts): State<Arc<AlertStore>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let view = alerts
        .acknowledge(id)
        .ok_or_else(|| ApiError::entity_not_found("Alert", id))?;
    tracing::info!(alert_id = %id, service = %view.alert.service_name, "Alert acknowledged");
    Ok(Json(view))
}

/// POST /monitoring/alerts/{id}/resolve - Resolve an alert
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/monitoring/alerts/{id}/resolve",
    tag = "Monitoring",
    params(
        ("id" = Uuid, Path, description = "Alert ID")
    ),
    responses(
        (status = 200, description = "Alert resolved", body = AlertView),
        (status = 404, description = "Alert not found", body = ApiError),
    ),
))]
pub async fn resolve_alert(
    State(alerts): State<Arc<AlertStore>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let view = alerts
        .resolve(id)
        .ok_or_else(|| ApiError::entity_not_found("Alert", id))?;
    tracing::info!(alert_id = %id, service = %view.alert.service_name, "Alert resolved manually");
    Ok(Json(view))
}

// ============================================================================
// SETTINGS
// ============================================================================

/// GET /monitoring/config - Current monitoring settings
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/monitoring/config",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Current settings", body = MonitorSettings),
    ),
))]
pub async fn get_settings(State(settings): State<SettingsHandle>) -> impl IntoResponse {
    Json(settings.current())
}

/// PUT /monitoring/config - Patch monitoring settings
///
/// Probe loops pick up a new interval on their next tick. Threshold changes
/// reclassify every service immediately.
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/monitoring/config",
    tag = "Monitoring",
    request_body = MonitorSettingsPatch,
    responses(
        (status = 200, description = "Updated settings", body = MonitorSettings),
        (status = 400, description = "Invalid settings", body = ApiError),
    ),
))]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<MonitorSettingsPatch>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.settings.update(&patch)?;
    let transitions = state.health.apply_thresholds();
    tracing::info!(
        monitoring_enabled = updated.monitoring_enabled,
        health_check_interval_seconds = updated.health_check_interval_seconds,
        metrics_retention_seconds = updated.metrics_retention_seconds,
        reclassified = transitions.len(),
        "Monitoring settings updated"
    );
    Ok(Json(updated))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the monitoring router, mounted at `/monitoring`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/health", get(health_summary))
        .route("/health/:service", get(service_health))
        .route("/metrics", get(query_metrics))
        .route("/alerts", get(list_alerts))
        .route("/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/alerts/:id/resolve", post(resolve_alert))
        .route("/config", get(get_settings).put(update_settings))
}
