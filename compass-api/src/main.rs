//! Compass API Server Entry Point
//!
//! Bootstraps telemetry and the providers, starts the health probe and
//! metrics sweep jobs, and serves the Axum router until Ctrl-C.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use compass_api::constants::{DEFAULT_BIND_HOST, DEFAULT_PORT};
use compass_api::jobs::{metrics_sweep_task, spawn_probe_tasks, HealthProbeConfig, MetricsSweepConfig};
use compass_api::telemetry::{init_tracer, shutdown_tracer, TelemetryConfig};
use compass_api::{create_api_router, ApiError, ApiResult, AppState};
use tokio::sync::watch;

/// How long background jobs get to finish after the shutdown signal.
const JOB_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    let guard = init_tracer(&telemetry_config)?;

    let state = AppState::from_env()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let probes = spawn_probe_tasks(
        state.probe_targets(),
        &state.health,
        &state.metrics,
        &state.settings,
        HealthProbeConfig::from_env(),
        &shutdown_rx,
    );
    let sweep = tokio::spawn(metrics_sweep_task(
        state.metrics.clone(),
        state.alerts.clone(),
        state.inbound_limits.clone(),
        state.settings.clone(),
        MetricsSweepConfig::from_env(),
        shutdown_rx,
    ));

    let app: Router = create_api_router(state)?;

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Compass API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let jobs_stopped = async move {
        for job in probes {
            if let Err(e) = job.await {
                tracing::warn!(error = %e, "Health probe task ended abnormally");
            }
        }
        if let Err(e) = sweep.await {
            tracing::warn!(error = %e, "Metrics sweep task ended abnormally");
        }
    };
    if tokio::time::timeout(JOB_SHUTDOWN_GRACE, jobs_stopped).await.is_err() {
        tracing::warn!(
            grace_secs = JOB_SHUTDOWN_GRACE.as_secs(),
            "Background jobs did not stop in time"
        );
    }

    shutdown_tracer(guard);
    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("COMPASS_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("COMPASS_API_PORT").ok())
        .unwrap_or_else(|| DEFAULT_PORT.to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
