//! Analysis REST API Routes
//!
//! Every handler routes through the shared [`FallbackOrchestrator`]; upstream
//! failures never surface here, only bad input and simulator failures do.

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use compass_core::TextFeature;

#[cfg(feature = "openapi")]
use crate::error::ApiError;
use crate::{
    error::ApiResult,
    orchestrator::FallbackOrchestrator,
    state::AppState,
    types::{
        AnalyzeImageRequest, AnalyzeTextRequest, FeatureListResponse, ImageAnalysisResponse,
        TextAnalysisResponse, TextInput,
    },
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /analyze/image - Analyze a product image
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/analyze/image",
    tag = "Analysis",
    request_body = AnalyzeImageRequest,
    responses(
        (status = 200, description = "Image analyzed", body = ImageAnalysisResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 422, description = "Analysis failed", body = ApiError),
    ),
))]
pub async fn analyze_image(
    State(orchestrator): State<Arc<FallbackOrchestrator>>,
    Json(req): Json<AnalyzeImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = req.into_request()?;
    let result = orchestrator.analyze(request).await?;
    Ok(Json(ImageAnalysisResponse::try_from(result)?))
}

/// POST /analyze/text - Analyze a review or product description
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/analyze/text",
    tag = "Analysis",
    request_body = AnalyzeTextRequest,
    responses(
        (status = 200, description = "Text analyzed", body = TextAnalysisResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 422, description = "Analysis failed", body = ApiError),
    ),
))]
pub async fn analyze_text(
    State(orchestrator): State<Arc<FallbackOrchestrator>>,
    Json(req): Json<AnalyzeTextRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = req.into_request()?;
    let result = orchestrator.analyze(request).await?;
    Ok(Json(TextAnalysisResponse::try_from(result)?))
}

async fn analyze_text_feature(
    orchestrator: &FallbackOrchestrator,
    input: TextInput,
    feature: TextFeature,
) -> ApiResult<Json<TextAnalysisResponse>> {
    let result = orchestrator.analyze(input.into_request(feature)).await?;
    Ok(Json(TextAnalysisResponse::try_from(result)?))
}

/// POST /analyze/text/sentiment - Sentiment only
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/analyze/text/sentiment",
    tag = "Analysis",
    request_body = TextInput,
    responses(
        (status = 200, description = "Sentiment analyzed", body = TextAnalysisResponse),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn analyze_sentiment(
    State(orchestrator): State<Arc<FallbackOrchestrator>>,
    Json(input): Json<TextInput>,
) -> ApiResult<impl IntoResponse> {
    analyze_text_feature(&orchestrator, input, TextFeature::Sentiment).await
}

/// POST /analyze/text/key-phrases - Key phrases only
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/analyze/text/key-phrases",
    tag = "Analysis",
    request_body = TextInput,
    responses(
        (status = 200, description = "Key phrases extracted", body = TextAnalysisResponse),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn extract_key_phrases(
    State(orchestrator): State<Arc<FallbackOrchestrator>>,
    Json(input): Json<TextInput>,
) -> ApiResult<impl IntoResponse> {
    analyze_text_feature(&orchestrator, input, TextFeature::KeyPhrases).await
}

/// POST /analyze/text/entities - Named entities only
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/analyze/text/entities",
    tag = "Analysis",
    request_body = TextInput,
    responses(
        (status = 200, description = "Entities recognized", body = TextAnalysisResponse),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn recognize_entities(
    State(orchestrator): State<Arc<FallbackOrchestrator>>,
    Json(input): Json<TextInput>,
) -> ApiResult<impl IntoResponse> {
    analyze_text_feature(&orchestrator, input, TextFeature::Entities).await
}

/// POST /analyze/text/language - Language detection only
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/analyze/text/language",
    tag = "Analysis",
    request_body = TextInput,
    responses(
        (status = 200, description = "Language detected", body = TextAnalysisResponse),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn detect_language(
    State(orchestrator): State<Arc<FallbackOrchestrator>>,
    Json(input): Json<TextInput>,
) -> ApiResult<impl IntoResponse> {
    analyze_text_feature(&orchestrator, input, TextFeature::Language).await
}

/// GET /analyze/image/features - Supported image features
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/analyze/image/features",
    tag = "Analysis",
    responses(
        (status = 200, description = "Supported image features", body = FeatureListResponse),
    ),
))]
pub async fn image_features() -> impl IntoResponse {
    Json(FeatureListResponse::image())
}

/// GET /analyze/text/features - Supported text features
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/analyze/text/features",
    tag = "Analysis",
    responses(
        (status = 200, description = "Supported text features", body = FeatureListResponse),
    ),
))]
pub async fn text_features() -> impl IntoResponse {
    Json(FeatureListResponse::text())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the analysis router, mounted at `/analyze`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/image", post(analyze_image))
        .route("/image/features", get(image_features))
        .route("/text", post(analyze_text))
        .route("/text/features", get(text_features))
        .route("/text/sentiment", post(analyze_sentiment))
        .route("/text/key-phrases", post(extract_key_phrases))
        .route("/text/entities", post(recognize_entities))
        .route("/text/language", post(detect_language))
}
