//! REST API Routes Module
//!
//! Includes:
//! - Analysis routes (image and text, routed through the fallback orchestrator)
//! - Monitoring routes (dashboard, health, metrics, alerts, settings)
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod analyze;
pub mod health;
pub mod monitoring;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{rate_limit_middleware, RateLimitState};
use crate::state::AppState;

pub use analyze::create_router as analyze_router;
pub use health::create_router as health_router;
pub use monitoring::create_router as monitoring_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Check if running in a production environment.
fn is_production_environment() -> bool {
    std::env::var("COMPASS_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set COMPASS_CORS_ORIGINS.",
        ));
    }
    if !config.rate_limit_enabled {
        tracing::warn!(
            "Rate limiting is disabled in production - this is not recommended.\n\
             Set COMPASS_RATE_LIMIT_ENABLED=true to enable rate limiting."
        );
    }
    Ok(())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builder for the API router with CORS, observability and rate limiting.
pub struct SecureRouterBuilder {
    state: AppState,
    api_config: Arc<ApiConfig>,
    rate_limit_state: RateLimitState,
}

impl SecureRouterBuilder {
    /// Create a new SecureRouterBuilder.
    ///
    /// In production environments this validates the CORS and rate-limit
    /// configuration and returns an error if critical settings are missing.
    pub fn new(state: AppState) -> ApiResult<Self> {
        let api_config = state.api_config.clone();
        if is_production_environment() {
            validate_api_config_for_production(&api_config)?;
        }
        let rate_limit_state = state.inbound_limits.clone();

        Ok(Self {
            state,
            api_config,
            rate_limit_state,
        })
    }

    /// Build the complete router.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS (outermost) - handles preflight requests
    /// 2. Observability - tracing and metrics
    /// 3. Rate Limiting - rejects floods per client IP
    pub fn build(self) -> Router {
        use crate::telemetry::{metrics_handler, observability_middleware};
        use axum::middleware::from_fn;

        #[allow(unused_mut)]
        let mut router = Router::new()
            .nest("/analyze", analyze::create_router())
            .nest("/monitoring", monitoring::create_router())
            .nest("/health", health::create_router())
            .route("/metrics", get(metrics_handler));

        #[cfg(feature = "openapi")]
        {
            router = router.route("/openapi.json", get(openapi_json));
        }

        #[allow(unused_mut)]
        let mut router: Router = router.with_state(self.state);

        // Add Swagger UI if swagger-ui feature is enabled
        #[cfg(all(feature = "openapi", feature = "swagger-ui"))]
        {
            use utoipa::OpenApi;
            use utoipa_swagger_ui::SwaggerUi;
            router = router.merge(
                SwaggerUi::new("/swagger-ui").url("/openapi.json", crate::openapi::ApiDoc::openapi()),
            );
        }

        let cors = build_cors_layer(&self.api_config);

        // Execution order: CORS -> Observability -> Rate Limiting -> Handler
        router
            .layer(from_fn_with_state(self.rate_limit_state, rate_limit_middleware))
            .layer(from_fn(observability_middleware))
            .layer(cors)
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins, including
/// `*.domain` wildcard entries.
fn build_cors_layer(config: &Arc<ApiConfig>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let allowed = config.clone();
        let origins = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| allowed.is_origin_allowed(o))
                .unwrap_or(false)
        });

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router.
///
/// - Analysis routes under /analyze/*
/// - Monitoring routes under /monitoring/*
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI spec at /openapi.json (openapi feature)
/// - Swagger UI at /swagger-ui (swagger-ui feature)
pub fn create_api_router(state: AppState) -> ApiResult<Router> {
    SecureRouterBuilder::new(state).map(SecureRouterBuilder::build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use compass_providers::SimulatorProvider;
    use tower::ServiceExt;

    use crate::state::AppStateConfig;

    fn app() -> Router {
        let state = AppState::new(
            None,
            Arc::new(SimulatorProvider::default()),
            AppStateConfig::default(),
        );
        SecureRouterBuilder::new(state)
            .map(SecureRouterBuilder::build)
            .unwrap_or_else(|e| panic!("router: {}", e))
    }

    #[tokio::test]
    async fn test_ping_and_unknown_route() -> Result<(), String> {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/health/ping")
                    .body(Body::empty())
                    .map_err(|e| e.to_string())?,
            )
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(res.status(), StatusCode::OK);

        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .map_err(|e| e.to_string())?,
            )
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_cors_preflight_in_dev_mode() -> Result<(), String> {
        let res = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/analyze/text")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .map_err(|e| e.to_string())?,
            )
            .await
            .map_err(|e| e.to_string())?;
        assert!(res
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        Ok(())
    }

    #[test]
    fn test_production_requires_cors_origins() {
        assert!(validate_api_config_for_production(&ApiConfig::default()).is_err());
        let config = ApiConfig {
            cors_origins: vec!["https://nichecompass.app".to_string()],
            ..ApiConfig::default()
        };
        assert!(validate_api_config_for_production(&config).is_ok());
    }
}
