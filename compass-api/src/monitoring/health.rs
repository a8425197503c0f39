//! Health Monitor
//!
//! Owns one `ServiceHealth` record per monitored service. Records change only
//! through [`HealthMonitor::record_probe`] and [`HealthMonitor::apply_thresholds`];
//! both turn status transitions into alerts while still holding the services
//! lock, so alerts for one service are applied in transition order.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use compass_core::{
    AlertKind, AlertLevel, HealthStatus, HealthTransition, OverallHealth, ProbeOutcome,
    ServiceHealth,
};

use super::alerts::AlertStore;
use super::settings::SettingsHandle;
use crate::constants::{PROBE_HISTORY_CAP, SIMULATOR_SERVICE};

const NOT_CONFIGURED_MESSAGE: &str = "provider not configured";

#[derive(Debug)]
pub struct HealthMonitor {
    services: RwLock<BTreeMap<String, ServiceHealth>>,
    /// Success flags of the most recent probes across all services.
    probe_history: Mutex<VecDeque<bool>>,
    simulator_ready: AtomicBool,
    alerts: Arc<AlertStore>,
    settings: SettingsHandle,
}

impl HealthMonitor {
    pub fn new<I, S>(services: I, alerts: Arc<AlertStore>, settings: SettingsHandle) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let services = services
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), ServiceHealth::unknown(name))
            })
            .collect();
        Self {
            services: RwLock::new(services),
            probe_history: Mutex::new(VecDeque::with_capacity(PROBE_HISTORY_CAP)),
            simulator_ready: AtomicBool::new(false),
            alerts,
            settings,
        }
    }

    pub fn alerts(&self) -> &Arc<AlertStore> {
        &self.alerts
    }

    /// Note that a service has no real provider behind it. Its status stays `unknown`.
    pub fn mark_unconfigured(&self, service: &str) {
        let mut services = self.services.write().unwrap_or_else(|p| p.into_inner());
        let record = services
            .entry(service.to_string())
            .or_insert_with(|| ServiceHealth::unknown(service));
        record.error_message = Some(NOT_CONFIGURED_MESSAGE.to_string());
    }

    pub fn status(&self, service: &str) -> HealthStatus {
        self.service(service)
            .map(|s| s.status)
            .unwrap_or(HealthStatus::Unknown)
    }

    pub fn service(&self, service: &str) -> Option<ServiceHealth> {
        let services = self.services.read().unwrap_or_else(|p| p.into_inner());
        services.get(service).cloned()
    }

    pub fn services(&self) -> BTreeMap<String, ServiceHealth> {
        self.services
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Healthy probes over all retained probes, as a percentage.
    pub fn uptime_percent(&self) -> f64 {
        let history = self.probe_history.lock().unwrap_or_else(|p| p.into_inner());
        if history.is_empty() {
            return 100.0;
        }
        let healthy = history.iter().filter(|ok| **ok).count();
        healthy as f64 * 100.0 / history.len() as f64
    }

    pub fn overall(&self) -> OverallHealth {
        let uptime = self.uptime_percent();
        let services = self.services.read().unwrap_or_else(|p| p.into_inner());
        OverallHealth::summarize(services.values(), uptime)
    }

    /// The simulator answered at least one probe and is not failing now.
    pub fn is_ready(&self) -> bool {
        self.simulator_ready.load(Ordering::Acquire)
            && self.status(SIMULATOR_SERVICE) != HealthStatus::Unhealthy
    }

    /// Fold one probe result into the service's record.
    pub fn record_probe(&self, service: &str, outcome: &ProbeOutcome) -> HealthTransition {
        let thresholds = self.settings.current().health_thresholds();
        let transition = {
            let mut services = self.services.write().unwrap_or_else(|p| p.into_inner());
            let record = services
                .entry(service.to_string())
                .or_insert_with(|| ServiceHealth::unknown(service));
            let transition = record.apply_probe(outcome, &thresholds);
            self.on_transition(record, transition);
            transition
        };

        {
            let mut history = self.probe_history.lock().unwrap_or_else(|p| p.into_inner());
            if history.len() == PROBE_HISTORY_CAP {
                history.pop_front();
            }
            history.push_back(outcome.success);
        }

        if service == SIMULATOR_SERVICE && outcome.success {
            self.simulator_ready.store(true, Ordering::Release);
        }

        transition
    }

    /// Re-derive every status after the thresholds changed.
    pub fn apply_thresholds(&self) -> Vec<(String, HealthTransition)> {
        let thresholds = self.settings.current().health_thresholds();
        let mut services = self.services.write().unwrap_or_else(|p| p.into_inner());
        services
            .values_mut()
            .filter_map(|record| {
                let transition = record.reclassify(&thresholds);
                self.on_transition(record, transition);
                transition
                    .changed()
                    .then(|| (record.service_name.clone(), transition))
            })
            .collect()
    }

    fn on_transition(&self, record: &ServiceHealth, transition: HealthTransition) {
        if !transition.changed() {
            return;
        }
        let service = record.service_name.as_str();
        let reason = record
            .error_message
            .clone()
            .or_else(|| record.response_time_ms.map(|ms| format!("probe took {}ms", ms)))
            .unwrap_or_default();

        match transition.to {
            HealthStatus::Degraded => {
                tracing::warn!(service, from = transition.from.as_str(), reason = %reason, "Service degraded");
                self.alerts.raise(
                    AlertLevel::Warning,
                    AlertKind::Health,
                    service,
                    format!("{} is degraded: {}", service, reason),
                );
            }
            HealthStatus::Unhealthy => {
                tracing::error!(
                    service,
                    consecutive_failures = record.consecutive_failures,
                    reason = %reason,
                    "Service unhealthy"
                );
                self.alerts.raise(
                    AlertLevel::Critical,
                    AlertKind::Health,
                    service,
                    format!(
                        "{} is unhealthy after {} consecutive failures: {}",
                        service, record.consecutive_failures, reason
                    ),
                );
            }
            HealthStatus::Healthy => {
                tracing::info!(service, from = transition.from.as_str(), "Service recovered");
                self.alerts.resolve_open(service, AlertKind::Health);
            }
            HealthStatus::Unknown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::alerts::AlertFilter;
    use crate::monitoring::settings::MonitorSettingsPatch;

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(
            ["vision", "text", SIMULATOR_SERVICE],
            Arc::new(AlertStore::new()),
            SettingsHandle::default(),
        )
    }

    fn fail() -> ProbeOutcome {
        ProbeOutcome::failure(12, "connection refused")
    }

    #[test]
    fn test_starts_unknown() {
        let m = monitor();
        assert_eq!(m.status("vision"), HealthStatus::Unknown);
        assert_eq!(m.services().len(), 3);
        assert_eq!(m.overall().status, HealthStatus::Unknown);
        assert_eq!(m.uptime_percent(), 100.0);
        assert!(!m.is_ready());
    }

    #[test]
    fn test_failure_streak_and_single_critical_alert() {
        let m = monitor();
        m.record_probe("vision", &fail());
        assert_eq!(m.status("vision"), HealthStatus::Degraded);
        m.record_probe("vision", &fail());
        assert_eq!(m.status("vision"), HealthStatus::Degraded);
        m.record_probe("vision", &fail());
        assert_eq!(m.status("vision"), HealthStatus::Unhealthy);
        for _ in 0..5 {
            m.record_probe("vision", &fail());
        }
        assert_eq!(m.status("vision"), HealthStatus::Unhealthy);

        let critical = m.alerts().list(&AlertFilter {
            level: Some(AlertLevel::Critical),
            ..Default::default()
        });
        assert_eq!(critical.len(), 1);
        assert_eq!(m.alerts().active_count(), 1);
    }

    #[test]
    fn test_recovery_resolves_alert() {
        let m = monitor();
        for _ in 0..3 {
            m.record_probe("text", &fail());
        }
        assert_eq!(m.alerts().active_count(), 1);
        let t = m.record_probe("text", &ProbeOutcome::success(40));
        assert_eq!(t.to, HealthStatus::Healthy);
        assert_eq!(m.alerts().active_count(), 0);
        assert!(m.service("text").is_some_and(|s| s.consecutive_failures == 0));
    }

    #[test]
    fn test_slow_probe_is_degraded() {
        let m = monitor();
        m.record_probe("vision", &ProbeOutcome::success(1500));
        assert_eq!(m.status("vision"), HealthStatus::Degraded);
        assert_eq!(m.alerts().active_count(), 1);
    }

    #[test]
    fn test_threshold_change_reclassifies() -> Result<(), String> {
        let settings = SettingsHandle::default();
        let m = HealthMonitor::new(["vision"], Arc::new(AlertStore::new()), settings.clone());
        m.record_probe("vision", &ProbeOutcome::success(1500));
        assert_eq!(m.status("vision"), HealthStatus::Degraded);

        settings
            .update(&MonitorSettingsPatch {
                alert_thresholds: Some(crate::monitoring::settings::AlertThresholdsPatch {
                    response_time_ms: Some(2000),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .map_err(|e| e.to_string())?;
        let changed = m.apply_thresholds();
        assert_eq!(changed.len(), 1);
        assert_eq!(m.status("vision"), HealthStatus::Healthy);
        assert_eq!(m.alerts().active_count(), 0);
        Ok(())
    }

    #[test]
    fn test_uptime_and_readiness() {
        let m = monitor();
        m.record_probe(SIMULATOR_SERVICE, &ProbeOutcome::success(1));
        m.record_probe("vision", &fail());
        assert!(m.is_ready());
        assert!((m.uptime_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_unconfigured_service_stays_unknown() {
        let m = monitor();
        m.mark_unconfigured("text");
        let text = m.service("text");
        assert!(text.as_ref().is_some_and(|s| s.status == HealthStatus::Unknown));
        assert_eq!(
            text.and_then(|s| s.error_message).as_deref(),
            Some(NOT_CONFIGURED_MESSAGE)
        );
    }

    #[test]
    fn test_concurrent_probes_do_not_lose_updates() {
        let m = monitor();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..25 {
                        m.record_probe("vision", &fail());
                    }
                });
            }
        });
        assert!(m.service("vision").is_some_and(|s| s.consecutive_failures == 100));
        assert_eq!(m.alerts().active_count(), 1);
    }

    #[test]
    fn test_open_alert_tracks_final_status_under_contention() {
        for _ in 0..20 {
            let m = monitor();
            std::thread::scope(|s| {
                s.spawn(|| {
                    for _ in 0..200 {
                        m.record_probe("text", &fail());
                    }
                });
                s.spawn(|| {
                    for _ in 0..200 {
                        m.record_probe("text", &ProbeOutcome::success(3));
                    }
                });
            });

            let open = m.alerts().open("text", AlertKind::Health).map(|a| a.severity);
            let expected = match m.status("text") {
                HealthStatus::Degraded => Some(AlertLevel::Warning),
                HealthStatus::Unhealthy => Some(AlertLevel::Critical),
                _ => None,
            };
            assert_eq!(open, expected);
            assert!(m.alerts().active_count() <= 1);
        }
    }
}
