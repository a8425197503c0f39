//! Alert records
//!
//! An alert is a transition log entry. After creation the only permitted
//! mutation is setting `resolved_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(AlertLevel::Info),
            "warning" => Ok(AlertLevel::Warning),
            "error" => Ok(AlertLevel::Error),
            "critical" => Ok(AlertLevel::Critical),
            other => Err(format!("unknown alert level '{}'", other)),
        }
    }
}

/// What raised the alert. A service has at most one open alert per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Health,
    ErrorRate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub severity: AlertLevel,
    pub kind: AlertKind,
    pub service_name: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        severity: AlertLevel,
        kind: AlertKind,
        service_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            severity,
            kind,
            service_name: service_name.into(),
            message: message.into(),
            triggered_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Set `resolved_at` once. Returns false if already resolved.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> bool {
        if self.resolved_at.is_some() {
            return false;
        }
        self.resolved_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_one_shot() {
        let mut alert = Alert::new(AlertLevel::Critical, AlertKind::Health, "vision", "down");
        assert!(alert.is_active());
        let first = Utc::now();
        assert!(alert.resolve(first));
        assert!(!alert.resolve(Utc::now()));
        assert_eq!(alert.resolved_at, Some(first));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("Warning".parse::<AlertLevel>(), Ok(AlertLevel::Warning));
        assert!("panic".parse::<AlertLevel>().is_err());
        assert!(AlertLevel::Critical > AlertLevel::Warning);
    }
}
