//! Analysis request and result types
//!
//! Canonical shapes shared by every provider. Vendor wire formats never leak
//! past the provider adapters; everything upstream of them speaks these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ProviderError;

/// Largest accepted decoded image payload (4 MiB).
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// Largest accepted text document, in characters.
pub const MAX_TEXT_CHARS: usize = 5120;

// ============================================================================
// CAPABILITIES AND FEATURES
// ============================================================================

/// A provider capability. Also the service name used for health and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Vision,
    Text,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Vision, Capability::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Vision => "vision",
            Capability::Text => "text",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image analysis features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ImageFeature {
    Tags,
    Captions,
    Colors,
    Faces,
    Objects,
    Categories,
}

impl ImageFeature {
    pub const ALL: [ImageFeature; 6] = [
        ImageFeature::Tags,
        ImageFeature::Captions,
        ImageFeature::Colors,
        ImageFeature::Faces,
        ImageFeature::Objects,
        ImageFeature::Categories,
    ];

    /// Features analyzed when a request names none.
    pub const DEFAULTS: [ImageFeature; 3] =
        [ImageFeature::Tags, ImageFeature::Captions, ImageFeature::Colors];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFeature::Tags => "tags",
            ImageFeature::Captions => "captions",
            ImageFeature::Colors => "colors",
            ImageFeature::Faces => "faces",
            ImageFeature::Objects => "objects",
            ImageFeature::Categories => "categories",
        }
    }
}

impl FromStr for ImageFeature {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFeature::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProviderError::invalid_input(format!("unknown image feature '{}'", s)))
    }
}

/// Text analysis features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TextFeature {
    Sentiment,
    KeyPhrases,
    Entities,
    Language,
}

impl TextFeature {
    pub const ALL: [TextFeature; 4] = [
        TextFeature::Sentiment,
        TextFeature::KeyPhrases,
        TextFeature::Entities,
        TextFeature::Language,
    ];

    /// Features analyzed when a request names none.
    pub const DEFAULTS: [TextFeature; 3] = [
        TextFeature::Sentiment,
        TextFeature::KeyPhrases,
        TextFeature::Entities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextFeature::Sentiment => "sentiment",
            TextFeature::KeyPhrases => "key_phrases",
            TextFeature::Entities => "entities",
            TextFeature::Language => "language",
        }
    }
}

impl FromStr for TextFeature {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        TextFeature::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| ProviderError::invalid_input(format!("unknown text feature '{}'", s)))
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// Where the image to analyze comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Bytes(Vec<u8>),
}

/// Image analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub source: ImageSource,
    pub features: BTreeSet<ImageFeature>,
    pub language: String,
}

impl ImageRequest {
    /// Request with the default feature set and English output.
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            features: ImageFeature::DEFAULTS.into_iter().collect(),
            language: "en".to_string(),
        }
    }

    /// Replace the feature set. An empty iterator keeps the defaults.
    pub fn with_features(mut self, features: impl IntoIterator<Item = ImageFeature>) -> Self {
        let features: BTreeSet<_> = features.into_iter().collect();
        if !features.is_empty() {
            self.features = features;
        }
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn wants(&self, feature: ImageFeature) -> bool {
        self.features.contains(&feature)
    }
}

/// Text analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    pub text: String,
    pub features: BTreeSet<TextFeature>,
    /// Language hint; `None` lets the provider assume English.
    pub language: Option<String>,
}

impl TextRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            features: TextFeature::DEFAULTS.into_iter().collect(),
            language: None,
        }
    }

    /// Replace the feature set. An empty iterator keeps the defaults.
    pub fn with_features(mut self, features: impl IntoIterator<Item = TextFeature>) -> Self {
        let features: BTreeSet<_> = features.into_iter().collect();
        if !features.is_empty() {
            self.features = features;
        }
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn wants(&self, feature: TextFeature) -> bool {
        self.features.contains(&feature)
    }
}

/// A request routed through the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisRequest {
    Image(ImageRequest),
    Text(TextRequest),
}

impl AnalysisRequest {
    pub fn capability(&self) -> Capability {
        match self {
            AnalysisRequest::Image(_) => Capability::Vision,
            AnalysisRequest::Text(_) => Capability::Text,
        }
    }

    /// Names of the requested features, in canonical order.
    pub fn feature_names(&self) -> Vec<String> {
        match self {
            AnalysisRequest::Image(req) => {
                req.features.iter().map(|f| f.as_str().to_string()).collect()
            }
            AnalysisRequest::Text(req) => {
                req.features.iter().map(|f| f.as_str().to_string()).collect()
            }
        }
    }

    /// Reject malformed input before any provider is contacted.
    pub fn validate(&self) -> Result<(), ProviderError> {
        match self {
            AnalysisRequest::Image(req) => {
                match &req.source {
                    ImageSource::Url(url) => validate_image_url(url)?,
                    ImageSource::Bytes(bytes) => {
                        if bytes.is_empty() {
                            return Err(ProviderError::invalid_input("image bytes are empty"));
                        }
                        if bytes.len() > MAX_IMAGE_BYTES {
                            return Err(ProviderError::invalid_input(format!(
                                "image is {} bytes, limit is {}",
                                bytes.len(),
                                MAX_IMAGE_BYTES
                            )));
                        }
                    }
                }
                if req.features.is_empty() {
                    return Err(ProviderError::invalid_input("no image features requested"));
                }
                validate_language(&req.language)
            }
            AnalysisRequest::Text(req) => {
                if req.text.trim().is_empty() {
                    return Err(ProviderError::invalid_input("text is empty"));
                }
                let chars = req.text.chars().count();
                if chars > MAX_TEXT_CHARS {
                    return Err(ProviderError::invalid_input(format!(
                        "text is {} characters, limit is {}",
                        chars, MAX_TEXT_CHARS
                    )));
                }
                if req.features.is_empty() {
                    return Err(ProviderError::invalid_input("no text features requested"));
                }
                match &req.language {
                    Some(lang) => validate_language(lang),
                    None => Ok(()),
                }
            }
        }
    }
}

fn validate_image_url(url: &str) -> Result<(), ProviderError> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| ProviderError::invalid_input("image_url must be an http(s) URL"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ProviderError::invalid_input("image_url has no host"));
    }
    Ok(())
}

/// ISO-639-1 code with an optional region or script subtag, e.g. `en`, `pt-BR`, `zh-Hans`.
pub fn is_valid_language_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts
        .next()
        .map(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_lowercase()))
        .unwrap_or(false);
    let rest: Vec<&str> = parts.collect();
    primary_ok
        && rest.len() <= 1
        && rest
            .iter()
            .all(|p| (2..=4).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn validate_language(tag: &str) -> Result<(), ProviderError> {
    if is_valid_language_tag(tag) {
        Ok(())
    } else {
        Err(ProviderError::invalid_input(format!(
            "language '{}' is not an ISO-639-1 code",
            tag
        )))
    }
}

// ============================================================================
// IMAGE RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Tag {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Caption {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    /// Color names or hex codes, most dominant first.
    pub dominant_colors: Vec<String>,
    pub accent_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImageCategory {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    pub bounding_box: BoundingBox,
}

/// Image analysis output. A field is `Some` exactly when its feature was analyzed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImageAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<Vec<Caption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<ImageCategory>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<DetectedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faces: Option<Vec<DetectedFace>>,
}

// ============================================================================
// TEXT RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    /// Only reported by the real provider.
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConfidenceScores {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl ConfidenceScores {
    pub fn sum(&self) -> f64 {
        self.positive + self.neutral + self.negative
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub overall: SentimentLabel,
    pub confidence_scores: ConfidenceScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DetectedLanguage {
    pub name: String,
    #[serde(rename = "iso6391Name")]
    pub iso6391_name: String,
    pub confidence: f64,
}

/// Text analysis output. A field is `Some` exactly when its feature was analyzed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TextAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(rename = "key_phrases", skip_serializing_if = "Option::is_none")]
    pub key_phrases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<DetectedLanguage>,
}

// ============================================================================
// ANALYSIS RESULT
// ============================================================================

/// Which backend produced a result. Always visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SourceProvider {
    Real,
    Simulator,
}

impl SourceProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceProvider::Real => "real",
            SourceProvider::Simulator => "simulator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AnalysisData {
    Image(ImageAnalysis),
    Text(TextAnalysis),
}

impl AnalysisData {
    pub fn capability(&self) -> Capability {
        match self {
            AnalysisData::Image(_) => Capability::Vision,
            AnalysisData::Text(_) => Capability::Text,
        }
    }
}

/// Canonical analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub request_id: Uuid,
    pub features: Vec<String>,
    pub data: AnalysisData,
    pub source_provider: SourceProvider,
    pub processing_time_ms: f64,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AnalysisResult {
    /// Build a result for `request` with a fresh UUIDv7 request id.
    pub fn new(request: &AnalysisRequest, data: AnalysisData, source: SourceProvider) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            features: request.feature_names(),
            data,
            source_provider: source,
            processing_time_ms: 0.0,
            analyzed_at: Utc::now(),
            error_message: None,
        }
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn image(&self) -> Option<&ImageAnalysis> {
        match &self.data {
            AnalysisData::Image(image) => Some(image),
            AnalysisData::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&TextAnalysis> {
        match &self.data {
            AnalysisData::Text(text) => Some(text),
            AnalysisData::Image(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_parsing() {
        assert_eq!("tags".parse::<ImageFeature>(), Ok(ImageFeature::Tags));
        assert_eq!("Colors".parse::<ImageFeature>(), Ok(ImageFeature::Colors));
        assert_eq!("key_phrases".parse::<TextFeature>(), Ok(TextFeature::KeyPhrases));
        assert_eq!("key-phrases".parse::<TextFeature>(), Ok(TextFeature::KeyPhrases));
        assert!("holograms".parse::<ImageFeature>().is_err());
        assert!("poetry".parse::<TextFeature>().is_err());
    }

    #[test]
    fn test_empty_feature_set_keeps_defaults() {
        let req = TextRequest::new("hello").with_features(Vec::new());
        assert_eq!(req.features.len(), TextFeature::DEFAULTS.len());
        let req = ImageRequest::new(ImageSource::Url("https://x.io/a.png".into()))
            .with_features([ImageFeature::Faces]);
        assert!(req.wants(ImageFeature::Faces));
        assert!(!req.wants(ImageFeature::Tags));
    }

    #[test]
    fn test_validate_rejects_blank_text() {
        for text in ["", "   ", "\n\t"] {
            let req = AnalysisRequest::Text(TextRequest::new(text));
            assert!(matches!(req.validate(), Err(ProviderError::InvalidInput { .. })));
        }
    }

    #[test]
    fn test_validate_rejects_oversized_text() {
        let req = AnalysisRequest::Text(TextRequest::new("a".repeat(MAX_TEXT_CHARS + 1)));
        assert!(req.validate().is_err());
        let req = AnalysisRequest::Text(TextRequest::new("a".repeat(MAX_TEXT_CHARS)));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_image_sources() {
        let ok = AnalysisRequest::Image(ImageRequest::new(ImageSource::Url(
            "https://cdn.shop/jewelry-necklace-123.jpg".into(),
        )));
        assert!(ok.validate().is_ok());

        let ftp = AnalysisRequest::Image(ImageRequest::new(ImageSource::Url(
            "ftp://cdn.shop/x.jpg".into(),
        )));
        assert!(ftp.validate().is_err());

        let no_host = AnalysisRequest::Image(ImageRequest::new(ImageSource::Url("https://".into())));
        assert!(no_host.validate().is_err());

        let empty = AnalysisRequest::Image(ImageRequest::new(ImageSource::Bytes(Vec::new())));
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_language_tags() {
        assert!(is_valid_language_tag("en"));
        assert!(is_valid_language_tag("pt-BR"));
        assert!(is_valid_language_tag("zh-Hans"));
        assert!(!is_valid_language_tag("english"));
        assert!(!is_valid_language_tag("EN"));
        assert!(!is_valid_language_tag("en-US-x"));
        assert!(!is_valid_language_tag(""));
    }

    #[test]
    fn test_text_analysis_serializes_key_phrases_snake_case() -> Result<(), String> {
        let analysis = TextAnalysis {
            key_phrases: Some(vec!["fast shipping".into()]),
            ..Default::default()
        };
        let json = serde_json::to_value(&analysis).map_err(|e| e.to_string())?;
        assert!(json.get("key_phrases").is_some());
        assert!(json.get("sentiment").is_none());
        Ok(())
    }

    #[test]
    fn test_source_provider_serialization() -> Result<(), String> {
        let json = serde_json::to_string(&SourceProvider::Simulator).map_err(|e| e.to_string())?;
        assert_eq!(json, "\"simulator\"");
        Ok(())
    }
}
