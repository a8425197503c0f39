//! Runtime-adjustable monitoring settings
//!
//! Settings live in a `watch` channel: probe loops and the metrics store
//! subscribe to it, and `PUT /monitoring/config` publishes a new value.

use std::sync::Arc;
use std::time::Duration;

use compass_core::HealthThresholds;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::{env_flag, env_or};
use crate::constants::{
    DEFAULT_DEGRADED_LATENCY_MS, DEFAULT_ERROR_RATE_PERCENT, DEFAULT_HEALTH_INTERVAL_SECS,
    DEFAULT_METRICS_RETENTION_SECS, DEFAULT_UNHEALTHY_AFTER_FAILURES, MAX_HEALTH_INTERVAL_SECS,
    MAX_METRICS_RETENTION_SECS, MIN_HEALTH_INTERVAL_SECS, MIN_METRICS_RETENTION_SECS,
};
use crate::error::{ApiError, ApiResult};

/// Thresholds that drive health classification and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AlertThresholds {
    /// Successful probes slower than this are `degraded`.
    pub response_time_ms: u64,
    /// Real-provider failure rate that raises an error-rate alert.
    pub error_rate_percent: f64,
    /// Consecutive probe failures that make a service `unhealthy`.
    pub unhealthy_after_failures: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: DEFAULT_DEGRADED_LATENCY_MS,
            error_rate_percent: DEFAULT_ERROR_RATE_PERCENT,
            unhealthy_after_failures: DEFAULT_UNHEALTHY_AFTER_FAILURES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MonitorSettings {
    pub monitoring_enabled: bool,
    pub health_check_interval_seconds: u64,
    pub metrics_retention_seconds: u64,
    pub alert_thresholds: AlertThresholds,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            health_check_interval_seconds: DEFAULT_HEALTH_INTERVAL_SECS,
            metrics_retention_seconds: DEFAULT_METRICS_RETENTION_SECS,
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorSettings {
    /// Load from environment variables.
    ///
    /// Environment variables:
    /// - `COMPASS_MONITORING_ENABLED`: Probe and record metrics (default: true)
    /// - `COMPASS_HEALTH_INTERVAL_SECS`: Probe cadence (default: 30)
    /// - `COMPASS_METRICS_RETENTION_SECS`: Sample retention (default: 3600)
    /// - `COMPASS_DEGRADED_LATENCY_MS`: Degraded latency threshold (default: 1000)
    /// - `COMPASS_UNHEALTHY_AFTER_FAILURES`: Failure streak for unhealthy (default: 3)
    /// - `COMPASS_ERROR_RATE_PERCENT`: Error-rate alert threshold (default: 5.0)
    ///
    /// Out-of-range values are clamped to the accepted range.
    pub fn from_env() -> Self {
        Self {
            monitoring_enabled: env_flag("COMPASS_MONITORING_ENABLED", true),
            health_check_interval_seconds: env_or(
                "COMPASS_HEALTH_INTERVAL_SECS",
                DEFAULT_HEALTH_INTERVAL_SECS,
            )
            .clamp(MIN_HEALTH_INTERVAL_SECS, MAX_HEALTH_INTERVAL_SECS),
            metrics_retention_seconds: env_or(
                "COMPASS_METRICS_RETENTION_SECS",
                DEFAULT_METRICS_RETENTION_SECS,
            )
            .clamp(MIN_METRICS_RETENTION_SECS, MAX_METRICS_RETENTION_SECS),
            alert_thresholds: AlertThresholds {
                response_time_ms: env_or("COMPASS_DEGRADED_LATENCY_MS", DEFAULT_DEGRADED_LATENCY_MS)
                    .max(1),
                error_rate_percent: env_or("COMPASS_ERROR_RATE_PERCENT", DEFAULT_ERROR_RATE_PERCENT),
                unhealthy_after_failures: env_or(
                    "COMPASS_UNHEALTHY_AFTER_FAILURES",
                    DEFAULT_UNHEALTHY_AFTER_FAILURES,
                )
                .max(1),
            },
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        if !(MIN_HEALTH_INTERVAL_SECS..=MAX_HEALTH_INTERVAL_SECS)
            .contains(&self.health_check_interval_seconds)
        {
            return Err(ApiError::invalid_range(
                "healthCheckIntervalSeconds",
                MIN_HEALTH_INTERVAL_SECS,
                MAX_HEALTH_INTERVAL_SECS,
            ));
        }
        if !(MIN_METRICS_RETENTION_SECS..=MAX_METRICS_RETENTION_SECS)
            .contains(&self.metrics_retention_seconds)
        {
            return Err(ApiError::invalid_range(
                "metricsRetentionSeconds",
                MIN_METRICS_RETENTION_SECS,
                MAX_METRICS_RETENTION_SECS,
            ));
        }
        let t = &self.alert_thresholds;
        if t.response_time_ms == 0 {
            return Err(ApiError::validation_failed(
                "alertThresholds.responseTimeMs must be positive",
            ));
        }
        if !t.error_rate_percent.is_finite()
            || t.error_rate_percent <= 0.0
            || t.error_rate_percent > 100.0
        {
            return Err(ApiError::invalid_range("alertThresholds.errorRatePercent", 0, 100));
        }
        if t.unhealthy_after_failures == 0 {
            return Err(ApiError::validation_failed(
                "alertThresholds.unhealthyAfterFailures must be positive",
            ));
        }
        Ok(())
    }

    /// New settings with the patch's fields applied.
    pub fn apply(&self, patch: &MonitorSettingsPatch) -> Self {
        let mut next = *self;
        if let Some(enabled) = patch.monitoring_enabled {
            next.monitoring_enabled = enabled;
        }
        if let Some(secs) = patch.health_check_interval_seconds {
            next.health_check_interval_seconds = secs;
        }
        if let Some(secs) = patch.metrics_retention_seconds {
            next.metrics_retention_seconds = secs;
        }
        if let Some(t) = &patch.alert_thresholds {
            if let Some(ms) = t.response_time_ms {
                next.alert_thresholds.response_time_ms = ms;
            }
            if let Some(rate) = t.error_rate_percent {
                next.alert_thresholds.error_rate_percent = rate;
            }
            if let Some(n) = t.unhealthy_after_failures {
                next.alert_thresholds.unhealthy_after_failures = n;
            }
        }
        next
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds.max(MIN_HEALTH_INTERVAL_SECS))
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.metrics_retention_seconds.min(MAX_METRICS_RETENTION_SECS) as i64)
    }

    pub fn health_thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            degraded_latency_ms: self.alert_thresholds.response_time_ms,
            unhealthy_after_failures: self.alert_thresholds.unhealthy_after_failures,
        }
    }
}

/// Partial update accepted by `PUT /monitoring/config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MonitorSettingsPatch {
    pub monitoring_enabled: Option<bool>,
    pub health_check_interval_seconds: Option<u64>,
    pub metrics_retention_seconds: Option<u64>,
    pub alert_thresholds: Option<AlertThresholdsPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlertThresholdsPatch {
    pub response_time_ms: Option<u64>,
    pub error_rate_percent: Option<f64>,
    pub unhealthy_after_failures: Option<u32>,
}

/// Shared handle to the current settings.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<MonitorSettings>>,
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

impl SettingsHandle {
    pub fn new(settings: MonitorSettings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> MonitorSettings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSettings> {
        self.tx.subscribe()
    }

    /// Validate and publish a patched copy of the current settings.
    ///
    /// The patch is applied to whatever value is current at publish time, so
    /// concurrent updates never overwrite each other's fields.
    pub fn update(&self, patch: &MonitorSettingsPatch) -> ApiResult<MonitorSettings> {
        let mut outcome = Err(ApiError::internal_error("settings update did not run"));
        self.tx.send_if_modified(|current| {
            let next = current.apply(patch);
            match next.validate() {
                Ok(()) => {
                    let changed = next != *current;
                    *current = next;
                    outcome = Ok(next);
                    changed
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_defaults_are_valid() {
        let settings = MonitorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.health_interval(), Duration::from_secs(30));
        assert_eq!(settings.health_thresholds(), HealthThresholds::default());
    }

    #[test]
    fn test_partial_patch_keeps_other_fields() -> Result<(), String> {
        let handle = SettingsHandle::default();
        let patch = MonitorSettingsPatch {
            health_check_interval_seconds: Some(5),
            alert_thresholds: Some(AlertThresholdsPatch {
                unhealthy_after_failures: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = handle.update(&patch).map_err(|e| e.to_string())?;
        assert_eq!(updated.health_check_interval_seconds, 5);
        assert_eq!(updated.alert_thresholds.unhealthy_after_failures, 5);
        assert_eq!(updated.metrics_retention_seconds, DEFAULT_METRICS_RETENTION_SECS);
        assert_eq!(updated.alert_thresholds.response_time_ms, DEFAULT_DEGRADED_LATENCY_MS);
        assert_eq!(handle.current(), updated);
        Ok(())
    }

    #[test]
    fn test_invalid_patch_is_rejected_and_not_published() {
        let handle = SettingsHandle::default();
        let cases = [
            MonitorSettingsPatch {
                health_check_interval_seconds: Some(0),
                ..Default::default()
            },
            MonitorSettingsPatch {
                health_check_interval_seconds: Some(3601),
                ..Default::default()
            },
            MonitorSettingsPatch {
                metrics_retention_seconds: Some(59),
                ..Default::default()
            },
            MonitorSettingsPatch {
                alert_thresholds: Some(AlertThresholdsPatch {
                    error_rate_percent: Some(-1.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
            MonitorSettingsPatch {
                alert_thresholds: Some(AlertThresholdsPatch {
                    unhealthy_after_failures: Some(0),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        for patch in cases {
            let err = handle.update(&patch).err();
            assert!(matches!(
                err.map(|e| e.code),
                Some(ErrorCode::InvalidRange) | Some(ErrorCode::ValidationFailed)
            ));
        }
        assert_eq!(handle.current(), MonitorSettings::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() -> Result<(), String> {
        let handle = SettingsHandle::default();
        let mut rx = handle.subscribe();
        handle
            .update(&MonitorSettingsPatch {
                monitoring_enabled: Some(false),
                ..Default::default()
            })
            .map_err(|e| e.to_string())?;
        rx.changed().await.map_err(|e| e.to_string())?;
        assert!(!rx.borrow().monitoring_enabled);
        Ok(())
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let parsed: Result<MonitorSettingsPatch, _> =
            serde_json::from_str(r#"{"healthCheckIntervalSecs": 10}"#);
        assert!(parsed.is_err());
    }
}
