//! Health Probe Background Task
//!
//! One task per monitored service. Each tick sends a synthetic probe to the
//! service's provider under its own timeout, so a hung provider only ever
//! delays its own loop.
//!
//! The cadence comes from the shared `MonitorSettings`; a new
//! `healthCheckIntervalSeconds` takes effect on the next tick without a restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use compass_core::{metric_names, Capability, MetricSample, ProbeOutcome};
use compass_providers::ProviderAdapter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Interval, MissedTickBehavior};

use crate::config::env_or;
use crate::constants::DEFAULT_PROBE_TIMEOUT_MS;
use crate::monitoring::{HealthMonitor, MetricsAggregator, SettingsHandle};
use crate::telemetry::METRICS;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthProbeConfig {
    /// Timeout for one probe, across all of the target's capabilities
    pub probe_timeout: Duration,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

impl HealthProbeConfig {
    /// Create HealthProbeConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `COMPASS_PROBE_TIMEOUT_MS`: Per-probe timeout (default: 2000)
    pub fn from_env() -> Self {
        Self {
            probe_timeout: Duration::from_millis(
                env_or("COMPASS_PROBE_TIMEOUT_MS", DEFAULT_PROBE_TIMEOUT_MS).max(1),
            ),
        }
    }
}

/// A service and the provider that answers its probes.
#[derive(Clone)]
pub struct ProbeTarget {
    pub service: String,
    pub provider: Arc<dyn ProviderAdapter>,
    pub capabilities: Vec<Capability>,
}

impl std::fmt::Debug for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeTarget")
            .field("service", &self.service)
            .field("provider", &self.provider.provider_id())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct HealthProbeMetrics {
    pub probes_run: AtomicU64,
    pub probes_failed: AtomicU64,
    /// Ticks skipped because monitoring was disabled
    pub probes_skipped: AtomicU64,
}

impl HealthProbeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HealthProbeSnapshot {
        HealthProbeSnapshot {
            probes_run: self.probes_run.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
            probes_skipped: self.probes_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthProbeSnapshot {
    pub probes_run: u64,
    pub probes_failed: u64,
    pub probes_skipped: u64,
}

// ============================================================================
// PROBING
// ============================================================================

/// Probe every capability of the target once, under one shared timeout.
pub async fn probe_once(target: &ProbeTarget, probe_timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let run = async {
        for capability in &target.capabilities {
            target.provider.probe(*capability).await?;
        }
        Ok::<(), compass_core::ProviderError>(())
    };
    let result = tokio::time::timeout(probe_timeout, run).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(Ok(())) => ProbeOutcome::success(elapsed_ms),
        Ok(Err(e)) => ProbeOutcome::failure(elapsed_ms, e.to_string()),
        Err(_) => ProbeOutcome::failure(
            elapsed_ms,
            format!("probe timed out after {}ms", probe_timeout.as_millis()),
        ),
    }
}

async fn run_probe(
    target: &ProbeTarget,
    monitor: &HealthMonitor,
    metrics: &MetricsAggregator,
    config: &HealthProbeConfig,
    stats: &HealthProbeMetrics,
) {
    let outcome = probe_once(target, config.probe_timeout).await;
    stats.probes_run.fetch_add(1, Ordering::Relaxed);

    let transition = monitor.record_probe(&target.service, &outcome);
    let label = if outcome.success { "success" } else { "failure" };
    metrics.record(
        MetricSample::new(
            target.service.as_str(),
            metric_names::PROBE_LATENCY_MS,
            outcome.response_time_ms as f64,
        )
        .with_label("provider", target.provider.provider_id())
        .with_label("outcome", label),
    );
    if !outcome.success {
        stats.probes_failed.fetch_add(1, Ordering::Relaxed);
        metrics.record(
            MetricSample::new(target.service.as_str(), metric_names::PROBE_FAILURE, 1.0)
                .with_label("provider", target.provider.provider_id()),
        );
    }
    if let Ok(m) = METRICS.as_ref() {
        m.record_health_probe(&target.service, outcome.success);
    }

    tracing::trace!(
        service = %target.service,
        success = outcome.success,
        response_time_ms = outcome.response_time_ms,
        status = transition.to.as_str(),
        "Health probe completed"
    );
}

fn probe_ticker(period: Duration, immediate: bool) -> Interval {
    let mut ticker = if immediate {
        interval(period)
    } else {
        interval_at(tokio::time::Instant::now() + period, period)
    };
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Probe one target until the shutdown signal is received.
///
/// The first probe runs immediately so readiness is known at startup.
pub async fn health_probe_task(
    target: ProbeTarget,
    monitor: Arc<HealthMonitor>,
    metrics: Arc<MetricsAggregator>,
    settings: SettingsHandle,
    config: HealthProbeConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<HealthProbeMetrics> {
    let stats = Arc::new(HealthProbeMetrics::new());
    let mut settings_rx = settings.subscribe();
    let mut period = settings_rx.borrow_and_update().health_interval();
    let mut ticker = probe_ticker(period, true);
    let mut settings_open = true;

    tracing::info!(
        service = %target.service,
        provider = target.provider.provider_id(),
        interval_secs = period.as_secs(),
        probe_timeout_ms = config.probe_timeout.as_millis() as u64,
        "Health probe task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!(service = %target.service, "Health probe task shutting down");
                    break;
                }
            }

            changed = settings_rx.changed(), if settings_open => {
                if changed.is_err() {
                    settings_open = false;
                    continue;
                }
                let next = settings_rx.borrow_and_update().health_interval();
                if next != period {
                    tracing::info!(
                        service = %target.service,
                        from_secs = period.as_secs(),
                        to_secs = next.as_secs(),
                        "Health probe interval changed"
                    );
                    period = next;
                    ticker = probe_ticker(period, false);
                }
            }

            _ = ticker.tick() => {
                if !settings.current().monitoring_enabled {
                    stats.probes_skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                run_probe(&target, &monitor, &metrics, &config, &stats).await;
            }
        }
    }

    let snapshot = stats.snapshot();
    tracing::info!(
        service = %target.service,
        probes_run = snapshot.probes_run,
        probes_failed = snapshot.probes_failed,
        probes_skipped = snapshot.probes_skipped,
        "Health probe task completed"
    );

    stats
}

/// Spawn one probe task per target.
pub fn spawn_probe_tasks(
    targets: Vec<ProbeTarget>,
    monitor: &Arc<HealthMonitor>,
    metrics: &Arc<MetricsAggregator>,
    settings: &SettingsHandle,
    config: HealthProbeConfig,
    shutdown_rx: &watch::Receiver<bool>,
) -> Vec<JoinHandle<Arc<HealthProbeMetrics>>> {
    targets
        .into_iter()
        .map(|target| {
            tokio::spawn(health_probe_task(
                target,
                Arc::clone(monitor),
                Arc::clone(metrics),
                settings.clone(),
                config,
                shutdown_rx.clone(),
            ))
        })
        .collect()
}
