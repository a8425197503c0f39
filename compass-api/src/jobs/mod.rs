//! Background Jobs for the Compass API
//!
//! - `health_probe`: one synthetic-probe loop per monitored service
//! - `metrics_sweep`: retention eviction, alert pruning and error-rate alerts
//!
//! # Usage
//!
//! ```ignore
//! use compass_api::jobs::{metrics_sweep_task, spawn_probe_tasks, HealthProbeConfig, MetricsSweepConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let probes = spawn_probe_tasks(
//!     state.probe_targets(),
//!     &state.health,
//!     &state.metrics,
//!     &state.settings,
//!     HealthProbeConfig::from_env(),
//!     &shutdown_rx,
//! );
//! tokio::spawn(metrics_sweep_task(
//!     state.metrics.clone(),
//!     state.alerts.clone(),
//!     state.inbound_limits.clone(),
//!     state.settings.clone(),
//!     MetricsSweepConfig::default(),
//!     shutdown_rx,
//! ));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod health_probe;
pub mod metrics_sweep;

pub use health_probe::{
    health_probe_task, probe_once, spawn_probe_tasks, HealthProbeConfig, HealthProbeMetrics,
    ProbeTarget,
};
pub use metrics_sweep::{metrics_sweep_task, sweep_once, MetricsSweepConfig, MetricsSweepMetrics};
