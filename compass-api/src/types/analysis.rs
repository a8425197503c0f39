//! Analysis request and response bodies

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use compass_core::{
    AnalysisData, AnalysisRequest, AnalysisResult, Capability, ImageAnalysis, ImageFeature,
    ImageRequest, ImageSource, SourceProvider, TextAnalysis, TextFeature, TextRequest,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// REQUESTS
// ============================================================================

/// Request to analyze a product image.
///
/// Exactly one of `image_url` and `image_bytes` must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalyzeImageRequest {
    /// Public http(s) URL of the image
    #[serde(default)]
    pub image_url: Option<String>,
    /// Base64-encoded image bytes (at most 4 MiB decoded)
    #[serde(default)]
    pub image_bytes: Option<String>,
    /// Features to analyze; omitted or empty means tags, captions and colors
    #[serde(default)]
    pub features: Option<Vec<String>>,
    /// Output language (ISO-639-1), defaults to `en`
    #[serde(default)]
    pub language: Option<String>,
}

impl AnalyzeImageRequest {
    pub fn into_request(self) -> ApiResult<AnalysisRequest> {
        let source = match (self.image_url, self.image_bytes) {
            (Some(url), None) => ImageSource::Url(url),
            (None, Some(encoded)) => {
                let bytes = BASE64
                    .decode(encoded.trim())
                    .map_err(|_| ApiError::invalid_format("image_bytes", "base64"))?;
                ImageSource::Bytes(bytes)
            }
            (Some(_), Some(_)) => {
                return Err(ApiError::validation_failed(
                    "Provide either image_url or image_bytes, not both",
                ))
            }
            (None, None) => {
                return Err(ApiError::validation_failed(
                    "One of image_url or image_bytes is required",
                ))
            }
        };

        let features = self
            .features
            .unwrap_or_default()
            .iter()
            .map(|name| name.parse::<ImageFeature>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut request = ImageRequest::new(source).with_features(features);
        if let Some(language) = self.language {
            request = request.with_language(language);
        }
        Ok(AnalysisRequest::Image(request))
    }
}

/// Request to analyze a product review or description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalyzeTextRequest {
    /// Text to analyze (at most 5120 characters)
    #[serde(default)]
    pub text: String,
    /// Features to analyze; omitted or empty means sentiment, key_phrases and entities
    #[serde(default)]
    pub features: Option<Vec<String>>,
    /// Language hint (ISO-639-1)
    #[serde(default)]
    pub language: Option<String>,
}

impl AnalyzeTextRequest {
    pub fn into_request(self) -> ApiResult<AnalysisRequest> {
        let features = self
            .features
            .unwrap_or_default()
            .iter()
            .map(|name| name.parse::<TextFeature>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AnalysisRequest::Text(build_text_request(
            self.text,
            features,
            self.language,
        )))
    }
}

/// Body of the single-feature text shortcuts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TextInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl TextInput {
    pub fn into_request(self, feature: TextFeature) -> AnalysisRequest {
        AnalysisRequest::Text(build_text_request(self.text, [feature], self.language))
    }
}

fn build_text_request(
    text: String,
    features: impl IntoIterator<Item = TextFeature>,
    language: Option<String>,
) -> TextRequest {
    let request = TextRequest::new(text).with_features(features);
    match language {
        Some(language) => request.with_language(language),
        None => request,
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Image analysis result with the analysis fields at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisResponse {
    pub request_id: Uuid,
    pub features: Vec<String>,
    #[serde(flatten)]
    pub analysis: ImageAnalysis,
    pub source_provider: SourceProvider,
    pub processing_time_ms: f64,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TryFrom<AnalysisResult> for ImageAnalysisResponse {
    type Error = ApiError;

    fn try_from(result: AnalysisResult) -> Result<Self, Self::Error> {
        match result.data {
            AnalysisData::Image(analysis) => Ok(Self {
                request_id: result.request_id,
                features: result.features,
                analysis,
                source_provider: result.source_provider,
                processing_time_ms: result.processing_time_ms,
                analyzed_at: result.analyzed_at,
                error_message: result.error_message,
            }),
            AnalysisData::Text(_) => Err(ApiError::internal_error(
                "Provider returned a text result for an image request",
            )),
        }
    }
}

/// Text analysis result with the analysis fields at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysisResponse {
    pub request_id: Uuid,
    pub features: Vec<String>,
    #[serde(flatten)]
    pub analysis: TextAnalysis,
    pub source_provider: SourceProvider,
    pub processing_time_ms: f64,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TryFrom<AnalysisResult> for TextAnalysisResponse {
    type Error = ApiError;

    fn try_from(result: AnalysisResult) -> Result<Self, Self::Error> {
        match result.data {
            AnalysisData::Text(analysis) => Ok(Self {
                request_id: result.request_id,
                features: result.features,
                analysis,
                source_provider: result.source_provider,
                processing_time_ms: result.processing_time_ms,
                analyzed_at: result.analyzed_at,
                error_message: result.error_message,
            }),
            AnalysisData::Image(_) => Err(ApiError::internal_error(
                "Provider returned an image result for a text request",
            )),
        }
    }
}

/// Supported and default features for one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FeatureListResponse {
    pub capability: Capability,
    pub supported: Vec<String>,
    pub defaults: Vec<String>,
}

impl FeatureListResponse {
    pub fn image() -> Self {
        Self {
            capability: Capability::Vision,
            supported: ImageFeature::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            defaults: ImageFeature::DEFAULTS
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
        }
    }

    pub fn text() -> Self {
        Self {
            capability: Capability::Text,
            supported: TextFeature::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            defaults: TextFeature::DEFAULTS
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
        }
    }
}
