//! Metrics Sweep Background Task
//!
//! Runs every minute:
//!
//! - Evicts metric samples older than the retention window
//! - Prunes resolved alerts older than seven days
//! - Forgets inbound rate-limit clients whose quota has replenished
//! - Evaluates the real-provider error rate per capability and raises or
//!   resolves error-rate alerts

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use compass_core::Capability;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::env_or;
use crate::constants::METRICS_SWEEP_INTERVAL_SECS;
use crate::middleware::RateLimitState;
use crate::monitoring::{
    evaluate_error_rates, AlertStore, ErrorRateVerdict, MetricsAggregator, SettingsHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSweepConfig {
    pub sweep_interval: Duration,
}

impl Default for MetricsSweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(METRICS_SWEEP_INTERVAL_SECS),
        }
    }
}

impl MetricsSweepConfig {
    /// # Environment Variables
    /// - `COMPASS_METRICS_SWEEP_INTERVAL_SECS`: Sweep cadence (default: 60)
    pub fn from_env() -> Self {
        Self {
            sweep_interval: Duration::from_secs(
                env_or("COMPASS_METRICS_SWEEP_INTERVAL_SECS", METRICS_SWEEP_INTERVAL_SECS).max(1),
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricsSweepMetrics {
    pub sweeps: AtomicU64,
    pub samples_evicted: AtomicU64,
    pub alerts_pruned: AtomicU64,
    pub clients_pruned: AtomicU64,
    pub error_rate_breaches: AtomicU64,
}

impl MetricsSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSweepSnapshot {
        MetricsSweepSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            samples_evicted: self.samples_evicted.load(Ordering::Relaxed),
            alerts_pruned: self.alerts_pruned.load(Ordering::Relaxed),
            clients_pruned: self.clients_pruned.load(Ordering::Relaxed),
            error_rate_breaches: self.error_rate_breaches.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSweepSnapshot {
    pub sweeps: u64,
    pub samples_evicted: u64,
    pub alerts_pruned: u64,
    pub clients_pruned: u64,
    pub error_rate_breaches: u64,
}

/// Perform one sweep.
pub fn sweep_once(
    metrics: &MetricsAggregator,
    alerts: &AlertStore,
    inbound: &RateLimitState,
    settings: &SettingsHandle,
    stats: &MetricsSweepMetrics,
) {
    stats.sweeps.fetch_add(1, Ordering::Relaxed);

    let evicted = metrics.evict_expired();
    let pruned = alerts.prune(Utc::now());
    let clients = inbound.prune();
    stats.samples_evicted.fetch_add(evicted as u64, Ordering::Relaxed);
    stats.alerts_pruned.fetch_add(pruned as u64, Ordering::Relaxed);
    stats.clients_pruned.fetch_add(clients as u64, Ordering::Relaxed);

    let current = settings.current();
    let breaches = if current.monitoring_enabled {
        evaluate_error_rates(
            Capability::ALL.iter().map(|c| c.as_str()),
            metrics,
            alerts,
            &current,
        )
        .into_iter()
        .filter(|(_, verdict)| matches!(verdict, ErrorRateVerdict::Breached { .. }))
        .count()
    } else {
        0
    };
    stats.error_rate_breaches.fetch_add(breaches as u64, Ordering::Relaxed);

    if evicted > 0 || pruned > 0 || clients > 0 || breaches > 0 {
        tracing::debug!(evicted, pruned, clients, breaches, "Metrics sweep completed");
    } else {
        tracing::trace!("Metrics sweep completed with nothing to do");
    }
}

/// Sweep on a fixed cadence until the shutdown signal is received.
pub async fn metrics_sweep_task(
    metrics: Arc<MetricsAggregator>,
    alerts: Arc<AlertStore>,
    inbound: RateLimitState,
    settings: SettingsHandle,
    config: MetricsSweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<MetricsSweepMetrics> {
    let stats = Arc::new(MetricsSweepMetrics::new());

    // The first tick of `interval` fires immediately; skip it
    let mut ticker = interval(config.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Metrics sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Metrics sweep task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                sweep_once(&metrics, &alerts, &inbound, &settings, &stats);
            }
        }
    }

    let snapshot = stats.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        samples_evicted = snapshot.samples_evicted,
        alerts_pruned = snapshot.alerts_pruned,
        clients_pruned = snapshot.clients_pruned,
        error_rate_breaches = snapshot.error_rate_breaches,
        "Metrics sweep task completed"
    );

    stats
}
