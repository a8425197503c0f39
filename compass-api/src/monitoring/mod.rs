//! Monitoring state: service health, rolling metrics and alerts
//!
//! - `health`: per-service `ServiceHealth` records fed by the probe jobs
//! - `metrics`: the rolling `MetricSample` store behind the dashboard
//! - `alerts`: the alert log with acknowledgement tracking
//! - `settings`: runtime-adjustable thresholds, cadence and retention
//! - `dashboard`: read-only snapshots assembled from the above

pub mod alerts;
pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod settings;

pub use alerts::{AlertFilter, AlertStore, AlertView};
pub use dashboard::{DashboardSnapshot, HealthSummary};
pub use health::HealthMonitor;
pub use metrics::MetricsAggregator;
pub use settings::{
    AlertThresholds, AlertThresholdsPatch, MonitorSettings, MonitorSettingsPatch, SettingsHandle,
};

use compass_core::{metric_names, AlertKind, AlertLevel};

use crate::constants::ERROR_RATE_MIN_ATTEMPTS;

/// Outcome of one error-rate evaluation for a service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorRateVerdict {
    /// Too few real attempts in the window to judge.
    InsufficientData { attempts: u64 },
    Breached { rate_percent: f64 },
    Ok { rate_percent: f64 },
}

/// Compare each service's real-provider failure rate with the threshold.
///
/// A breach opens one `error` alert per service; it stays open until the
/// rate falls back under the threshold.
pub fn evaluate_error_rates<'a>(
    services: impl IntoIterator<Item = &'a str>,
    metrics: &MetricsAggregator,
    alerts: &AlertStore,
    settings: &MonitorSettings,
) -> Vec<(&'a str, ErrorRateVerdict)> {
    let threshold = settings.alert_thresholds.error_rate_percent;
    services
        .into_iter()
        .map(|service| {
            let attempts = metrics.count(service, metric_names::ATTEMPT_REAL);
            if attempts < ERROR_RATE_MIN_ATTEMPTS {
                return (service, ErrorRateVerdict::InsufficientData { attempts });
            }
            let failures = metrics.count(service, metric_names::REAL_FAILURE);
            let rate_percent = failures as f64 * 100.0 / attempts as f64;
            if rate_percent > threshold {
                if alerts.open(service, AlertKind::ErrorRate).is_none() {
                    alerts.raise(
                        AlertLevel::Error,
                        AlertKind::ErrorRate,
                        service,
                        format!(
                            "{} real-provider error rate {:.1}% exceeds {:.1}% ({} of {} attempts)",
                            service, rate_percent, threshold, failures, attempts
                        ),
                    );
                }
                (service, ErrorRateVerdict::Breached { rate_percent })
            } else {
                alerts.resolve_open(service, AlertKind::ErrorRate);
                (service, ErrorRateVerdict::Ok { rate_percent })
            }
        })
        .collect()
}
