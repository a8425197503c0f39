//! Read-only dashboard views

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use compass_core::{MetricSummary, OverallHealth, ServiceHealth};
use serde::{Deserialize, Serialize};

use super::alerts::AlertStore;
use super::health::HealthMonitor;
use super::metrics::MetricsAggregator;
use crate::orchestrator::{QuotaState, RateLimiter};

/// Body of `GET /monitoring/dashboard`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub overall_health: OverallHealth,
    pub services: BTreeMap<String, ServiceHealth>,
    /// service -> metric -> summary
    pub metrics_summary: BTreeMap<String, BTreeMap<String, MetricSummary>>,
    pub active_alerts_count: usize,
    /// Real-provider quota usage per service.
    pub rate_limits: BTreeMap<String, QuotaState>,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn collect(
        health: &HealthMonitor,
        metrics: &MetricsAggregator,
        alerts: &AlertStore,
        limiter: &RateLimiter,
    ) -> Self {
        Self {
            overall_health: health.overall(),
            services: health.services(),
            metrics_summary: metrics.summarize_all(),
            active_alerts_count: alerts.active_count(),
            rate_limits: limiter.quota_states(),
            generated_at: Utc::now(),
        }
    }
}

/// Body of `GET /monitoring/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub overall_health: OverallHealth,
    pub services: BTreeMap<String, ServiceHealth>,
}

impl HealthSummary {
    pub fn collect(health: &HealthMonitor) -> Self {
        Self {
            overall_health: health.overall(),
            services: health.services(),
        }
    }
}
