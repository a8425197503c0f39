//! Health types for monitored provider capabilities
//!
//! `ServiceHealth.status` is never set directly: it is always derived from the
//! failure streak and last probe latency through [`HealthThresholds::classify`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status for a service or component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,
    /// Component is operational but slow or intermittently failing
    Degraded,
    /// Component is not operational
    Unhealthy,
    /// Health status is unknown (e.g., not yet checked)
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

/// Thresholds that turn probe observations into a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HealthThresholds {
    /// Successful probes slower than this are `degraded`.
    pub degraded_latency_ms: u64,
    /// Consecutive failures at which a service becomes `unhealthy`.
    pub unhealthy_after_failures: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_latency_ms: 1000,
            unhealthy_after_failures: 3,
        }
    }
}

impl HealthThresholds {
    /// Derive a status from the failure streak and the last probe latency.
    pub fn classify(&self, consecutive_failures: u32, response_time_ms: Option<u64>) -> HealthStatus {
        let unhealthy_after = self.unhealthy_after_failures.max(1);
        if consecutive_failures >= unhealthy_after {
            return HealthStatus::Unhealthy;
        }
        if consecutive_failures > 0 {
            return HealthStatus::Degraded;
        }
        match response_time_ms {
            Some(ms) if ms > self.degraded_latency_ms => HealthStatus::Degraded,
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Unknown,
        }
    }
}

/// Result of one synthetic probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn success(response_time_ms: u64) -> Self {
        Self {
            success: true,
            response_time_ms,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn failure(response_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            response_time_ms,
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }
}

/// Health record for one monitored service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub service_name: String,
    pub status: HealthStatus,
    pub response_time_ms: Option<u64>,
    pub last_check: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub consecutive_failures: u32,
}

/// Status change produced by applying a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: HealthStatus,
    pub to: HealthStatus,
}

impl HealthTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl ServiceHealth {
    /// A service that has not been probed yet.
    pub fn unknown(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            status: HealthStatus::Unknown,
            response_time_ms: None,
            last_check: None,
            error_message: None,
            consecutive_failures: 0,
        }
    }

    /// Fold a probe outcome into this record and re-derive the status.
    pub fn apply_probe(
        &mut self,
        outcome: &ProbeOutcome,
        thresholds: &HealthThresholds,
    ) -> HealthTransition {
        let from = self.status;
        if outcome.success {
            self.consecutive_failures = 0;
            self.error_message = None;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.error_message = outcome.error.clone();
        }
        self.response_time_ms = Some(outcome.response_time_ms);
        self.last_check = Some(outcome.checked_at);
        self.status = thresholds.classify(self.consecutive_failures, self.response_time_ms);
        HealthTransition {
            from,
            to: self.status,
        }
    }

    /// Re-derive the status after thresholds change.
    pub fn reclassify(&mut self, thresholds: &HealthThresholds) -> HealthTransition {
        let from = self.status;
        if self.last_check.is_some() {
            self.status = thresholds.classify(self.consecutive_failures, self.response_time_ms);
        }
        HealthTransition {
            from,
            to: self.status,
        }
    }
}

/// Roll-up of every service's health for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    pub status: HealthStatus,
    #[serde(rename = "upTimePercent")]
    pub up_time_percent: f64,
    pub healthy_count: usize,
    pub degraded_count: usize,
    pub unhealthy_count: usize,
    pub services_count: usize,
}

impl OverallHealth {
    /// Worst status wins; `unknown` only when nothing has reported.
    pub fn summarize<'a>(
        services: impl IntoIterator<Item = &'a ServiceHealth>,
        up_time_percent: f64,
    ) -> Self {
        let mut healthy = 0;
        let mut degraded = 0;
        let mut unhealthy = 0;
        let mut total = 0;
        for svc in services {
            total += 1;
            match svc.status {
                HealthStatus::Healthy => healthy += 1,
                HealthStatus::Degraded => degraded += 1,
                HealthStatus::Unhealthy => unhealthy += 1,
                HealthStatus::Unknown => {}
            }
        }
        let status = if unhealthy > 0 {
            HealthStatus::Unhealthy
        } else if degraded > 0 {
            HealthStatus::Degraded
        } else if healthy > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unknown
        };
        Self {
            status,
            up_time_percent,
            healthy_count: healthy,
            degraded_count: degraded,
            unhealthy_count: unhealthy,
            services_count: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table() {
        let t = HealthThresholds::default();
        assert_eq!(t.classify(0, None), HealthStatus::Unknown);
        assert_eq!(t.classify(0, Some(120)), HealthStatus::Healthy);
        assert_eq!(t.classify(0, Some(1000)), HealthStatus::Healthy);
        assert_eq!(t.classify(0, Some(1001)), HealthStatus::Degraded);
        assert_eq!(t.classify(1, Some(10)), HealthStatus::Degraded);
        assert_eq!(t.classify(2, Some(10)), HealthStatus::Degraded);
        assert_eq!(t.classify(3, Some(10)), HealthStatus::Unhealthy);
        assert_eq!(t.classify(40, None), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_apply_probe_streak() {
        let t = HealthThresholds::default();
        let mut svc = ServiceHealth::unknown("vision");

        let tr = svc.apply_probe(&ProbeOutcome::success(50), &t);
        assert_eq!((tr.from, tr.to), (HealthStatus::Unknown, HealthStatus::Healthy));

        for expected in [HealthStatus::Degraded, HealthStatus::Degraded, HealthStatus::Unhealthy] {
            svc.apply_probe(&ProbeOutcome::failure(2000, "timeout"), &t);
            assert_eq!(svc.status, expected);
        }
        assert_eq!(svc.consecutive_failures, 3);
        assert_eq!(svc.error_message.as_deref(), Some("timeout"));

        let tr = svc.apply_probe(&ProbeOutcome::success(30), &t);
        assert!(tr.changed());
        assert_eq!(svc.status, HealthStatus::Healthy);
        assert_eq!(svc.consecutive_failures, 0);
        assert!(svc.error_message.is_none());
    }

    #[test]
    fn test_reclassify_after_threshold_change() {
        let mut svc = ServiceHealth::unknown("text");
        svc.apply_probe(&ProbeOutcome::success(800), &HealthThresholds::default());
        assert_eq!(svc.status, HealthStatus::Healthy);

        let strict = HealthThresholds {
            degraded_latency_ms: 500,
            unhealthy_after_failures: 3,
        };
        svc.reclassify(&strict);
        assert_eq!(svc.status, HealthStatus::Degraded);

        let mut fresh = ServiceHealth::unknown("simulator");
        fresh.reclassify(&strict);
        assert_eq!(fresh.status, HealthStatus::Unknown);
    }

    #[test]
    fn test_overall_health_worst_wins() {
        let t = HealthThresholds::default();
        let mut a = ServiceHealth::unknown("vision");
        let mut b = ServiceHealth::unknown("text");
        let c = ServiceHealth::unknown("simulator");
        a.apply_probe(&ProbeOutcome::success(10), &t);
        b.apply_probe(&ProbeOutcome::failure(10, "503"), &t);

        let overall = OverallHealth::summarize([&a, &b, &c], 50.0);
        assert_eq!(overall.status, HealthStatus::Degraded);
        assert_eq!(overall.healthy_count, 1);
        assert_eq!(overall.degraded_count, 1);
        assert_eq!(overall.services_count, 3);

        let empty = OverallHealth::summarize(std::iter::empty(), 100.0);
        assert_eq!(empty.status, HealthStatus::Unknown);
    }

    #[test]
    fn test_overall_health_serializes_uptime_name() -> Result<(), String> {
        let overall = OverallHealth::summarize(std::iter::empty(), 100.0);
        let json = serde_json::to_value(&overall).map_err(|e| e.to_string())?;
        assert_eq!(json["upTimePercent"], 100.0);
        assert_eq!(json["servicesCount"], 0);
        Ok(())
    }
}
