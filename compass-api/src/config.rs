//! API Configuration Module
//!
//! CORS and inbound rate-limit settings for the HTTP surface, plus the small
//! environment helpers the other config types share. Orchestration and
//! monitoring settings live next to the components that own them.

use std::str::FromStr;

use crate::constants::{
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_PER_MINUTE,
};

// ============================================================================
// ENVIRONMENT HELPERS
// ============================================================================

/// Parse `key` from the environment, falling back to `default` when unset or invalid.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok(), default)
}

pub(crate) fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

/// Boolean flag accepting true/false, 1/0 and yes/no.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|s| parse_flag(&s))
        .unwrap_or(default)
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS and inbound flood protection.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Inbound Rate Limiting
    // ========================================================================
    /// Whether per-IP rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Requests per client IP per minute.
    pub rate_limit_per_minute: u32,

    /// Burst capacity above the steady rate.
    pub rate_limit_burst: u32,

    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Only set behind a proxy
    /// that overwrites these headers.
    pub trust_proxy_headers: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,

            rate_limit_enabled: true,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            trust_proxy_headers: false,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `COMPASS_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `COMPASS_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `COMPASS_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `COMPASS_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `COMPASS_RATE_LIMIT_PER_MINUTE`: Requests per minute per IP (default: 600)
    /// - `COMPASS_RATE_LIMIT_BURST`: Burst capacity (default: 20)
    /// - `COMPASS_TRUST_PROXY_HEADERS`: "true" or "false" (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cors_origins = std::env::var("COMPASS_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_allow_credentials: env_flag(
                "COMPASS_CORS_ALLOW_CREDENTIALS",
                defaults.cors_allow_credentials,
            ),
            cors_max_age_secs: env_or("COMPASS_CORS_MAX_AGE_SECS", defaults.cors_max_age_secs),
            rate_limit_enabled: env_flag("COMPASS_RATE_LIMIT_ENABLED", defaults.rate_limit_enabled),
            rate_limit_per_minute: env_or(
                "COMPASS_RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            ),
            rate_limit_burst: env_or("COMPASS_RATE_LIMIT_BURST", defaults.rate_limit_burst),
            trust_proxy_headers: env_flag(
                "COMPASS_TRUST_PROXY_HEADERS",
                defaults.trust_proxy_headers,
            ),
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.nichecompass.app
            match (allowed.strip_prefix("*."), origin.strip_prefix("https://")) {
                (Some(pattern), Some(host)) => host.ends_with(&format!(".{}", pattern)),
                _ => false,
            }
        })
    }
}
