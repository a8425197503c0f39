//! Monitoring query parameters and list responses

use chrono::{DateTime, Duration, Utc};
use compass_core::{AlertLevel, MetricSample};
use serde::{Deserialize, Serialize};

use crate::config::parse_flag;
use crate::constants::MAX_METRICS_QUERY_HOURS;
use crate::error::{ApiError, ApiResult};
use crate::monitoring::{AlertFilter, AlertView};

/// Query parameters for `GET /monitoring/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct MetricsQuery {
    /// Only samples for this service
    pub service_name: Option<String>,
    /// Only samples of this metric
    pub metric_name: Option<String>,
    /// Look-back in hours, 1 to 168 (default 1)
    pub hours: Option<u32>,
}

impl MetricsQuery {
    /// Start of the requested look-back window.
    pub fn since(&self, now: DateTime<Utc>) -> ApiResult<DateTime<Utc>> {
        let hours = self.hours.unwrap_or(1);
        if !(1..=MAX_METRICS_QUERY_HOURS).contains(&hours) {
            return Err(ApiError::invalid_range("hours", 1, MAX_METRICS_QUERY_HOURS));
        }
        Ok(now - Duration::hours(i64::from(hours)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MetricsQueryResponse {
    pub samples: Vec<MetricSample>,
    pub count: usize,
    pub since: DateTime<Utc>,
}

/// Query parameters for `GET /monitoring/alerts`.
///
/// Booleans are taken as strings so that `1`/`0` and `yes`/`no` work too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct AlertQuery {
    /// info, warning, error or critical
    pub level: Option<String>,
    pub service_name: Option<String>,
    pub acknowledged: Option<String>,
    /// true for unresolved alerts, false for resolved ones
    pub active: Option<String>,
}

impl AlertQuery {
    pub fn into_filter(self) -> ApiResult<AlertFilter> {
        let level = self
            .level
            .as_deref()
            .map(str::parse::<AlertLevel>)
            .transpose()
            .map_err(ApiError::invalid_input)?;
        Ok(AlertFilter {
            level,
            service_name: self.service_name,
            acknowledged: flag("acknowledged", self.acknowledged.as_deref())?,
            active: flag("active", self.active.as_deref())?,
        })
    }
}

fn flag(field: &str, raw: Option<&str>) -> ApiResult<Option<bool>> {
    raw.map(|value| {
        parse_flag(value).ok_or_else(|| ApiError::invalid_format(field, "true/false, 1/0 or yes/no"))
    })
    .transpose()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AlertListResponse {
    pub alerts: Vec<AlertView>,
    pub total: usize,
}
