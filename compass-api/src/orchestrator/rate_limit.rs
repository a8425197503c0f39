//! Per-provider sliding-window quota
//!
//! Each provider key owns a window of grant timestamps. Eviction, the quota
//! check and the insert happen under the key's map entry lock, so concurrent
//! callers can never push a window past its quota.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use compass_core::Capability;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::env_or;
use crate::constants::{DEFAULT_RATE_WINDOW_SECS, DEFAULT_TEXT_QUOTA, DEFAULT_VISION_QUOTA};

/// Quotas for the real provider, per capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    pub window: Duration,
    pub vision_quota: u32,
    pub text_quota: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            vision_quota: DEFAULT_VISION_QUOTA,
            text_quota: DEFAULT_TEXT_QUOTA,
        }
    }
}

impl RateLimiterConfig {
    /// Load from environment variables.
    ///
    /// Environment variables:
    /// - `COMPASS_VISION_QUOTA`: Real vision calls per window (default: 20)
    /// - `COMPASS_TEXT_QUOTA`: Real text calls per window (default: 100)
    /// - `COMPASS_RATE_WINDOW_SECS`: Window length (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window: Duration::from_secs(
                env_or("COMPASS_RATE_WINDOW_SECS", DEFAULT_RATE_WINDOW_SECS).max(1),
            ),
            vision_quota: env_or("COMPASS_VISION_QUOTA", defaults.vision_quota),
            text_quota: env_or("COMPASS_TEXT_QUOTA", defaults.text_quota),
        }
    }

    pub fn quota_for(&self, capability: Capability) -> u32 {
        match capability {
            Capability::Vision => self.vision_quota,
            Capability::Text => self.text_quota,
        }
    }
}

#[derive(Debug)]
struct Window {
    quota: u32,
    granted: VecDeque<Instant>,
}

impl Window {
    fn evict(&mut self, now: Instant, length: Duration) {
        while let Some(oldest) = self.granted.front() {
            match now.checked_duration_since(*oldest) {
                Some(age) if age >= length => {
                    self.granted.pop_front();
                }
                _ => break,
            }
        }
    }
}

/// Sliding-window limiter keyed by provider.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            windows: DashMap::new(),
        }
    }

    /// One window per capability, keyed by the capability's service name.
    pub fn from_config(config: &RateLimiterConfig) -> Self {
        let limiter = Self::new(config.window);
        for capability in Capability::ALL {
            limiter.set_quota(capability.as_str(), config.quota_for(capability));
        }
        limiter
    }

    /// Install or change a provider's quota. Existing grants are kept.
    pub fn set_quota(&self, provider: &str, quota: u32) {
        self.windows
            .entry(provider.to_string())
            .and_modify(|w| w.quota = quota)
            .or_insert_with(|| Window {
                quota,
                granted: VecDeque::with_capacity(quota.min(1024) as usize),
            });
    }

    /// Take one slot if the window has room. Providers without a quota are unlimited.
    pub fn try_acquire(&self, provider: &str) -> bool {
        self.try_acquire_at(provider, Instant::now())
    }

    pub fn try_acquire_at(&self, provider: &str, now: Instant) -> bool {
        let Some(mut window) = self.windows.get_mut(provider) else {
            return true;
        };
        window.evict(now, self.window);
        if window.granted.len() < window.quota as usize {
            window.granted.push_back(now);
            true
        } else {
            false
        }
    }

    /// Quota usage for one provider, `None` for unlimited providers.
    pub fn quota_state(&self, provider: &str) -> Option<QuotaState> {
        self.quota_state_at(provider, Instant::now())
    }

    pub fn quota_state_at(&self, provider: &str, now: Instant) -> Option<QuotaState> {
        let mut window = self.windows.get_mut(provider)?;
        window.evict(now, self.window);
        let used = window.granted.len() as u32;
        let retry_after_seconds = match window.granted.front() {
            Some(oldest) if used >= window.quota => Some(
                (*oldest + self.window)
                    .saturating_duration_since(now)
                    .as_secs_f64()
                    .ceil() as u64,
            ),
            _ => None,
        };
        Some(QuotaState {
            quota: window.quota,
            remaining: window.quota.saturating_sub(used),
            window_seconds: self.window.as_secs(),
            retry_after_seconds,
        })
    }

    /// Quota usage for every limited provider.
    pub fn quota_states(&self) -> BTreeMap<String, QuotaState> {
        let now = Instant::now();
        let providers: Vec<String> = self.windows.iter().map(|e| e.key().clone()).collect();
        providers
            .into_iter()
            .filter_map(|p| self.quota_state_at(&p, now).map(|state| (p, state)))
            .collect()
    }
}

/// One provider's quota as reported on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct QuotaState {
    pub quota: u32,
    pub remaining: u32,
    pub window_seconds: u64,
    /// Seconds until a slot frees up; absent while slots remain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}
