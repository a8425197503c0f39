//! Constants for the Compass API
//!
//! Defaults for every environment-tunable setting, plus the fixed caps that
//! bound in-memory monitoring state.

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 3000;

/// Development server URL
pub const DEV_SERVER_URL: &str = "http://localhost:3000";

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// INBOUND RATE LIMITING
// ============================================================================

/// Default inbound request limit per client IP (per minute)
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 600;

/// Default burst size for inbound rate limiting
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 20;

// ============================================================================
// ORCHESTRATION
// ============================================================================

/// Hard timeout for one real-provider attempt
pub const DEFAULT_REAL_TIMEOUT_MS: u64 = 5000;

/// Hard timeout for one simulator attempt
pub const DEFAULT_SIMULATOR_TIMEOUT_MS: u64 = 1000;

/// Real vision calls allowed per window
pub const DEFAULT_VISION_QUOTA: u32 = 20;

/// Real text calls allowed per window
pub const DEFAULT_TEXT_QUOTA: u32 = 100;

/// Provider quota window in seconds
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

// ============================================================================
// MONITORING
// ============================================================================

/// Service name under which the simulator is probed.
pub const SIMULATOR_SERVICE: &str = "simulator";

pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

pub const DEFAULT_DEGRADED_LATENCY_MS: u64 = 1000;

pub const DEFAULT_UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Metric retention window (1 hour)
pub const DEFAULT_METRICS_RETENTION_SECS: u64 = 3600;

pub const DEFAULT_ERROR_RATE_PERCENT: f64 = 5.0;

pub const MIN_HEALTH_INTERVAL_SECS: u64 = 1;
pub const MAX_HEALTH_INTERVAL_SECS: u64 = 3600;

pub const MIN_METRICS_RETENTION_SECS: u64 = 60;
/// 7 days
pub const MAX_METRICS_RETENTION_SECS: u64 = 604_800;

/// Raw samples kept per (service, metric) series for `/monitoring/metrics`.
/// Summaries and counts are bucketed and do not depend on this cap.
pub const MAX_RAW_SAMPLES_PER_SERIES: usize = 10_000;

/// Summary buckets per retention window; bucket width is retention / this.
pub const SUMMARY_BUCKETS_PER_WINDOW: i64 = 3600;

/// Probe results kept for uptime calculation.
pub const PROBE_HISTORY_CAP: usize = 1000;

/// Alerts kept in the log.
pub const ALERT_LOG_CAP: usize = 1000;

/// Resolved alerts older than this are pruned (7 days).
pub const RESOLVED_ALERT_TTL_SECS: i64 = 604_800;

/// Real attempts needed before an error rate is judged.
pub const ERROR_RATE_MIN_ATTEMPTS: u64 = 10;

/// Cadence of the retention and error-rate sweep.
pub const METRICS_SWEEP_INTERVAL_SECS: u64 = 60;

/// Largest look-back accepted by the raw metrics query.
pub const MAX_METRICS_QUERY_HOURS: u32 = 168;
