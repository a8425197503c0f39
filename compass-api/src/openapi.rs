//! OpenAPI Specification for the Compass API
//!
//! Generated with utoipa from the handler annotations and the schema derives
//! on the request, response and domain types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::monitoring::{
    AlertThresholds, AlertThresholdsPatch, AlertView, DashboardSnapshot, HealthSummary,
    MonitorSettings, MonitorSettingsPatch,
};
use crate::orchestrator::QuotaState;
use crate::routes::health::{HealthDetails, HealthResponse};
use crate::routes::{analyze, health, monitoring};
use crate::telemetry::metrics;
use crate::types::*;

use compass_core::{
    Alert, AlertKind, AlertLevel, BoundingBox, Capability, Caption, ColorInfo, ConfidenceScores,
    DetectedFace, DetectedLanguage, DetectedObject, Entity, HealthStatus, ImageAnalysis,
    ImageCategory, ImageFeature, MetricSample, MetricSummary, OverallHealth, Sentiment,
    SentimentLabel, ServiceHealth, SourceProvider, Tag, TextAnalysis, TextFeature,
};

/// OpenAPI document for the Compass API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Niche Compass API",
        version = "0.1.0",
        description = "AI capability orchestration for marketplace research: image and text analysis with automatic simulator fallback, provider health monitoring and metrics",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "Niche Compass", url = "https://nichecompass.app")
    ),
    servers(
        (url = "https://api.nichecompass.app", description = "Production"),
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Analysis", description = "Image and text analysis with provider fallback"),
        (name = "Monitoring", description = "Provider health, metrics, alerts and monitoring settings"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Analysis Routes ===
        analyze::analyze_image,
        analyze::analyze_text,
        analyze::analyze_sentiment,
        analyze::extract_key_phrases,
        analyze::recognize_entities,
        analyze::detect_language,
        analyze::image_features,
        analyze::text_features,

        // === Monitoring Routes ===
        monitoring::dashboard,
        monitoring::health_summary,
        monitoring::service_health,
        monitoring::query_metrics,
        monitoring::list_alerts,
        monitoring::acknowledge_alert,
        monitoring::resolve_alert,
        monitoring::get_settings,
        monitoring::update_settings,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,

        // === Observability ===
        metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Analysis Types ===
            AnalyzeImageRequest, AnalyzeTextRequest, TextInput,
            ImageAnalysisResponse, TextAnalysisResponse, FeatureListResponse,
            Capability, ImageFeature, TextFeature, SourceProvider,
            ImageAnalysis, Tag, Caption, ColorInfo, ImageCategory, BoundingBox,
            DetectedObject, DetectedFace,
            TextAnalysis, Sentiment, SentimentLabel, ConfidenceScores, Entity, DetectedLanguage,

            // === Monitoring Types ===
            DashboardSnapshot, HealthSummary, OverallHealth, ServiceHealth, HealthStatus,
            QuotaState,
            MetricSample, MetricSummary, MetricsQueryResponse,
            Alert, AlertKind, AlertLevel, AlertView, AlertListResponse,
            MonitorSettings, MonitorSettingsPatch, AlertThresholds, AlertThresholdsPatch,

            // === Health Types ===
            HealthResponse, HealthDetails
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}
