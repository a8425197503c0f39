//! Azure Cognitive Services request and response types

use serde::{Deserialize, Serialize};

// ============================================================================
// ERROR ENVELOPE
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AzureErrorEnvelope {
    pub error: AzureErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// COMPUTER VISION v3.2
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrlBody<'a> {
    pub url: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionAnalyzeResponse {
    #[serde(default)]
    pub tags: Option<Vec<VisionTag>>,
    #[serde(default)]
    pub description: Option<VisionDescription>,
    #[serde(default)]
    pub color: Option<VisionColor>,
    #[serde(default)]
    pub categories: Option<Vec<VisionCategory>>,
    #[serde(default)]
    pub objects: Option<Vec<VisionObject>>,
    #[serde(default)]
    pub faces: Option<Vec<VisionFace>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionTag {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionDescription {
    #[serde(default)]
    pub captions: Vec<VisionCaption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionCaption {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionColor {
    #[serde(default)]
    pub dominant_colors: Vec<String>,
    #[serde(default)]
    pub accent_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionCategory {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VisionRectangle {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionObject {
    pub object: String,
    pub confidence: f64,
    pub rectangle: VisionRectangle,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FaceRectangle {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionFace {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    pub face_rectangle: FaceRectangle,
}

// ============================================================================
// TEXT ANALYTICS v3.1
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DocumentsRequest<'a> {
    pub documents: Vec<InputDocument<'a>>,
}

impl<'a> DocumentsRequest<'a> {
    /// Single-document batch; the id is always "1".
    pub fn single(text: &'a str, language: Option<&'a str>) -> Self {
        Self {
            documents: vec![InputDocument {
                id: "1",
                text,
                language,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InputDocument<'a> {
    pub id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsResponse<D> {
    #[serde(default = "Vec::new")]
    pub documents: Vec<D>,
    #[serde(default)]
    pub errors: Vec<DocumentError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentError {
    #[serde(default)]
    pub id: String,
    pub error: AzureErrorBody,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentDocument {
    pub sentiment: String,
    pub confidence_scores: SentimentScores,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPhrasesDocument {
    #[serde(default)]
    pub key_phrases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedEntity {
    pub text: String,
    pub category: String,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitiesDocument {
    #[serde(default)]
    pub entities: Vec<RecognizedEntity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDetectedLanguage {
    pub name: String,
    pub iso6391_name: String,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDocument {
    pub detected_language: WireDetectedLanguage,
}
