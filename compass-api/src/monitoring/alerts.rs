//! Alert log
//!
//! Alerts are only ever mutated to set `resolved_at`. Acknowledgement is an
//! operator annotation kept in a side set keyed by alert id.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use compass_core::{Alert, AlertKind, AlertLevel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ALERT_LOG_CAP, RESOLVED_ALERT_TTL_SECS};
use crate::telemetry::METRICS;

/// An alert as reported by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: Alert,
    pub acknowledged: bool,
}

/// Filters for [`AlertStore::list`]. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub level: Option<AlertLevel>,
    pub service_name: Option<String>,
    pub acknowledged: Option<bool>,
    pub active: Option<bool>,
}

#[derive(Debug, Default)]
struct AlertLog {
    /// Oldest first.
    alerts: Vec<Alert>,
    acknowledged: HashSet<Uuid>,
}

impl AlertLog {
    fn open_mut(&mut self, service: &str, kind: AlertKind) -> Option<&mut Alert> {
        self.alerts
            .iter_mut()
            .rev()
            .find(|a| a.is_active() && a.kind == kind && a.service_name == service)
    }

    fn view(&self, alert: &Alert) -> AlertView {
        AlertView {
            alert: alert.clone(),
            acknowledged: self.acknowledged.contains(&alert.id),
        }
    }

    fn active_count(&self) -> usize {
        self.alerts.iter().filter(|a| a.is_active()).count()
    }

    /// Drop the oldest resolved alert, or the oldest alert if none is resolved.
    fn enforce_cap(&mut self) {
        while self.alerts.len() > ALERT_LOG_CAP {
            let idx = self
                .alerts
                .iter()
                .position(|a| !a.is_active())
                .unwrap_or(0);
            let removed = self.alerts.remove(idx);
            self.acknowledged.remove(&removed.id);
        }
    }
}

/// Shared alert log.
#[derive(Debug, Default)]
pub struct AlertStore {
    log: RwLock<AlertLog>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, AlertLog> {
        self.log.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AlertLog> {
        self.log.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_gauge(count: usize) {
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.set_active_alerts(count);
        }
    }

    /// Open a new alert, resolving the service's previous open alert of the same kind.
    pub fn raise(
        &self,
        severity: AlertLevel,
        kind: AlertKind,
        service: &str,
        message: impl Into<String>,
    ) -> Alert {
        let alert = Alert::new(severity, kind, service, message);
        let active = {
            let mut log = self.write();
            if let Some(previous) = log.open_mut(service, kind) {
                previous.resolve(alert.triggered_at);
            }
            log.alerts.push(alert.clone());
            log.enforce_cap();
            log.active_count()
        };
        Self::publish_gauge(active);
        tracing::warn!(
            alert_id = %alert.id,
            service = service,
            severity = %severity,
            message = %alert.message,
            "Alert raised"
        );
        alert
    }

    /// Resolve the service's open alert of `kind`, if there is one.
    pub fn resolve_open(&self, service: &str, kind: AlertKind) -> Option<Alert> {
        let (resolved, active) = {
            let mut log = self.write();
            let resolved = log.open_mut(service, kind).map(|alert| {
                alert.resolve(Utc::now());
                alert.clone()
            });
            (resolved, log.active_count())
        };
        if let Some(alert) = &resolved {
            Self::publish_gauge(active);
            tracing::info!(alert_id = %alert.id, service = service, "Alert resolved");
        }
        resolved
    }

    pub fn open(&self, service: &str, kind: AlertKind) -> Option<Alert> {
        self.read()
            .alerts
            .iter()
            .rev()
            .find(|a| a.is_active() && a.kind == kind && a.service_name == service)
            .cloned()
    }

    pub fn get(&self, id: Uuid) -> Option<AlertView> {
        let log = self.read();
        log.alerts.iter().find(|a| a.id == id).map(|a| log.view(a))
    }

    /// Mark an alert acknowledged. `None` for unknown ids.
    pub fn acknowledge(&self, id: Uuid) -> Option<AlertView> {
        let mut log = self.write();
        let alert = log.alerts.iter().find(|a| a.id == id)?.clone();
        log.acknowledged.insert(id);
        Some(log.view(&alert))
    }

    /// Resolve one alert by id. Resolving twice keeps the first timestamp.
    pub fn resolve(&self, id: Uuid) -> Option<AlertView> {
        let (view, active) = {
            let mut log = self.write();
            let alert = log.alerts.iter_mut().find(|a| a.id == id)?;
            alert.resolve(Utc::now());
            let alert = alert.clone();
            (log.view(&alert), log.active_count())
        };
        Self::publish_gauge(active);
        Some(view)
    }

    /// Matching alerts, newest first.
    pub fn list(&self, filter: &AlertFilter) -> Vec<AlertView> {
        let log = self.read();
        log.alerts
            .iter()
            .rev()
            .filter(|a| filter.level.map_or(true, |level| a.severity == level))
            .filter(|a| {
                filter
                    .service_name
                    .as_deref()
                    .map_or(true, |s| a.service_name == s)
            })
            .filter(|a| filter.active.map_or(true, |active| a.is_active() == active))
            .map(|a| log.view(a))
            .filter(|v| filter.acknowledged.map_or(true, |ack| v.acknowledged == ack))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.read().active_count()
    }

    pub fn len(&self) -> usize {
        self.read().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove alerts resolved more than seven days before `now`.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - chrono::Duration::seconds(RESOLVED_ALERT_TTL_SECS);
        let mut log = self.write();
        let before = log.alerts.len();
        let mut dropped = Vec::new();
        log.alerts.retain(|a| match a.resolved_at {
            Some(at) if at < cutoff => {
                dropped.push(a.id);
                false
            }
            _ => true,
        });
        for id in dropped {
            log.acknowledged.remove(&id);
        }
        before - log.alerts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_supersedes_open_alert_of_same_kind() {
        let store = AlertStore::new();
        let first = store.raise(AlertLevel::Warning, AlertKind::Health, "vision", "slow");
        let second = store.raise(AlertLevel::Critical, AlertKind::Health, "vision", "down");
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.open("vision", AlertKind::Health).map(|a| a.id), Some(second.id));
        let first = store.get(first.id).map(|v| v.alert);
        assert!(first.is_some_and(|a| a.resolved_at.is_some()));
    }

    #[test]
    fn test_kinds_and_services_are_independent() {
        let store = AlertStore::new();
        store.raise(AlertLevel::Critical, AlertKind::Health, "vision", "down");
        store.raise(AlertLevel::Error, AlertKind::ErrorRate, "vision", "failing");
        store.raise(AlertLevel::Warning, AlertKind::Health, "text", "slow");
        assert_eq!(store.active_count(), 3);
        assert!(store.resolve_open("vision", AlertKind::Health).is_some());
        assert!(store.resolve_open("vision", AlertKind::Health).is_none());
        assert_eq!(store.active_count(), 2);
    }

    #[test]
    fn test_acknowledge_and_filters() -> Result<(), String> {
        let store = AlertStore::new();
        let a = store.raise(AlertLevel::Warning, AlertKind::Health, "vision", "slow");
        let b = store.raise(AlertLevel::Critical, AlertKind::Health, "text", "down");
        store.acknowledge(a.id).ok_or("unknown id")?;

        let acked = store.list(&AlertFilter {
            acknowledged: Some(true),
            ..Default::default()
        });
        assert_eq!(acked.len(), 1);
        assert_eq!(acked[0].alert.id, a.id);

        let critical = store.list(&AlertFilter {
            level: Some(AlertLevel::Critical),
            ..Default::default()
        });
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].alert.id, b.id);

        // Newest first
        let all = store.list(&AlertFilter::default());
        assert_eq!(all.iter().map(|v| v.alert.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        assert!(store.acknowledge(Uuid::now_v7()).is_none());
        Ok(())
    }

    #[test]
    fn test_resolve_by_id_is_idempotent() -> Result<(), String> {
        let store = AlertStore::new();
        let a = store.raise(AlertLevel::Warning, AlertKind::Health, "vision", "slow");
        let first = store.resolve(a.id).ok_or("unknown id")?;
        let second = store.resolve(a.id).ok_or("unknown id")?;
        assert_eq!(first.alert.resolved_at, second.alert.resolved_at);
        assert_eq!(store.active_count(), 0);
        Ok(())
    }

    #[test]
    fn test_prune_drops_only_old_resolved_alerts() {
        let store = AlertStore::new();
        let a = store.raise(AlertLevel::Warning, AlertKind::Health, "vision", "slow");
        store.resolve(a.id);
        store.raise(AlertLevel::Critical, AlertKind::Health, "text", "down");

        assert_eq!(store.prune(Utc::now()), 0);
        let later = Utc::now() + chrono::Duration::seconds(RESOLVED_ALERT_TTL_SECS + 1);
        assert_eq!(store.prune(later), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_log_is_capped() {
        let store = AlertStore::new();
        for i in 0..(ALERT_LOG_CAP + 10) {
            store.raise(AlertLevel::Info, AlertKind::Health, &format!("svc-{}", i % 3), "flap");
        }
        assert_eq!(store.len(), ALERT_LOG_CAP);
        assert_eq!(store.active_count(), 3);
    }

    #[test]
    fn test_view_serializes_flat() -> Result<(), String> {
        let store = AlertStore::new();
        let a = store.raise(AlertLevel::Critical, AlertKind::Health, "vision", "down");
        let view = store.get(a.id).ok_or("unknown id")?;
        let json = serde_json::to_value(&view).map_err(|e| e.to_string())?;
        assert_eq!(json["serviceName"], "vision");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["acknowledged"], false);
        assert!(json["resolvedAt"].is_null());
        Ok(())
    }
}
