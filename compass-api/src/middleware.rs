//! Inbound rate limiting middleware
//!
//! Per-client-IP flood guard in front of every route. This is unrelated to the
//! per-provider quota the orchestrator enforces: exceeding it rejects the
//! HTTP request with 429 instead of falling back.
//!
//! Forwarded-for headers are only honored when `trust_proxy_headers` is set;
//! otherwise the client is keyed by the socket peer address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{clock::DefaultClock, DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::ApiConfig;
use crate::error::ApiError;

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<ApiConfig>,
    /// One governor cell per client IP.
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RateLimitState {
    pub fn new(config: ApiConfig) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(config.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.rate_limit_burst).unwrap_or(NonZeroU32::MIN));
        Self {
            config: Arc::new(config),
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Take one cell for `ip`.
    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        self.limiter.check_key(&ip).map_err(|not_until| {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1);
            RateLimitError { retry_after }
        })
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Forget clients whose quota has fully replenished. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        before.saturating_sub(self.limiter.len())
    }
}

/// Error type for rate limit middleware.
#[derive(Debug)]
pub struct RateLimitError {
    /// Seconds until the client may retry
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Extract client IP from request, considering proxy headers when trusted.
fn extract_client_ip(request: &Request, peer: SocketAddr, trust_proxy_headers: bool) -> IpAddr {
    if !trust_proxy_headers {
        return peer.ip();
    }

    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        // First entry is the original client
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse() {
                return ip;
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        if let Ok(ip) = real_ip.trim().parse() {
            return ip;
        }
    }

    peer.ip()
}

/// Rate limiting middleware.
///
/// Requests without `ConnectInfo` (in-process tests) are keyed as loopback.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));
    let ip = extract_client_ip(&request, peer, state.config.trust_proxy_headers);

    if let Err(err) = state.check(ip) {
        tracing::warn!(client_ip = %ip, retry_after = err.retry_after, "Inbound rate limit exceeded");
        return Err(err);
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from_str(&state.config.rate_limit_per_minute.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("600")),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(state: RateLimitState) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn_with_state(state, rate_limit_middleware))
    }

    fn request(ip: &str) -> Result<axum::http::Request<Body>, String> {
        axum::http::Request::builder()
            .uri("/ping")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn test_burst_then_429() -> Result<(), String> {
        let app = app(RateLimitState::new(ApiConfig {
            rate_limit_per_minute: 1,
            rate_limit_burst: 2,
            trust_proxy_headers: true,
            ..ApiConfig::default()
        }));

        for _ in 0..2 {
            let res = app.clone().oneshot(request("10.0.0.1")?).await.map_err(|e| e.to_string())?;
            assert_eq!(res.status(), StatusCode::OK);
            assert!(res.headers().contains_key("x-ratelimit-limit"));
        }
        let res = app.clone().oneshot(request("10.0.0.1")?).await.map_err(|e| e.to_string())?;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key("retry-after"));

        // Other clients are unaffected
        let res = app.oneshot(request("10.0.0.2")?).await.map_err(|e| e.to_string())?;
        assert_eq!(res.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_untrusted_forwarded_for_is_ignored() -> Result<(), String> {
        let state = RateLimitState::new(ApiConfig {
            rate_limit_per_minute: 1,
            rate_limit_burst: 2,
            ..ApiConfig::default()
        });
        let app = app(state.clone());

        let mut statuses = Vec::new();
        for i in 0..50u32 {
            let spoofed = format!("10.1.{}.{}", i / 256, i % 256);
            let res = app.clone().oneshot(request(&spoofed)?).await.map_err(|e| e.to_string())?;
            statuses.push(res.status());
        }

        assert_eq!(state.tracked_clients(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 2);
        assert_eq!(statuses[2], StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }

    #[test]
    fn test_prune_forgets_replenished_clients() {
        // 60k/min replenishes one cell per millisecond
        let state = RateLimitState::new(ApiConfig {
            rate_limit_per_minute: 60_000,
            rate_limit_burst: 1,
            trust_proxy_headers: true,
            ..ApiConfig::default()
        });
        for i in 0..5000u32 {
            let ip = IpAddr::from(Ipv4Addr::from(0x0a00_0000 + i));
            assert!(state.check(ip).is_ok());
        }
        assert_eq!(state.tracked_clients(), 5000);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(state.prune(), 5000);
        assert_eq!(state.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_disabled_passes_through() -> Result<(), String> {
        let app = app(RateLimitState::new(ApiConfig {
            rate_limit_enabled: false,
            rate_limit_per_minute: 1,
            rate_limit_burst: 1,
            ..ApiConfig::default()
        }));
        for _ in 0..5 {
            let res = app.clone().oneshot(request("10.0.0.3")?).await.map_err(|e| e.to_string())?;
            assert_eq!(res.status(), StatusCode::OK);
        }
        Ok(())
    }

    #[test]
    fn test_extract_client_ip_prefers_forwarded_for() -> Result<(), String> {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let peer = SocketAddr::from((Ipv4Addr::new(192, 0, 2, 9), 4000));
        assert_eq!(extract_client_ip(&req, peer, true).to_string(), "203.0.113.7");
        assert_eq!(extract_client_ip(&req, peer, false).to_string(), "192.0.2.9");
        Ok(())
    }
}
