//! Operational metric samples and summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric names emitted by the orchestrator and the health monitor.
pub mod names {
    pub const ATTEMPT_REAL: &str = "attempt_real";
    pub const REAL_FAILURE: &str = "real_failure";
    pub const FALLBACK_TRIGGERED: &str = "fallback_triggered";
    pub const ATTEMPT_SIMULATOR: &str = "attempt_simulator";
    pub const LATENCY_MS: &str = "latency_ms";
    pub const REQUEST_CANCELLED: &str = "request_cancelled";
    pub const PROBE_LATENCY_MS: &str = "probe_latency_ms";
    pub const PROBE_FAILURE: &str = "probe_failure";
}

/// Immutable record of one countable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub service: String,
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    /// Provider and outcome tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl MetricSample {
    pub fn new(service: impl Into<String>, metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            service: service.into(),
            metric_name: metric_name.into(),
            value,
            timestamp: Utc::now(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Derived statistics over the retained samples of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub count: u64,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl MetricSummary {
    /// Summarize a set of values in one pass. `None` for an empty set.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0u64;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            count,
            avg_value: sum / count as f64,
            min_value: min,
            max_value: max,
        })
    }
}
