//! Compass Core - Orchestration Data Types
//!
//! Pure data structures shared by the provider adapters and the API layer:
//! analysis requests and results, service health, metric samples, alerts and
//! the provider error taxonomy. No I/O lives here.

use sha2::{Digest, Sha256};

pub mod alert;
pub mod analysis;
pub mod error;
pub mod health;
pub mod metrics;

pub use alert::{Alert, AlertKind, AlertLevel};
pub use analysis::{
    is_valid_language_tag, AnalysisData, AnalysisRequest, AnalysisResult, BoundingBox, Capability,
    Caption, ColorInfo, ConfidenceScores, DetectedFace, DetectedLanguage, DetectedObject, Entity,
    ImageAnalysis, ImageCategory, ImageFeature, ImageRequest, ImageSource, Sentiment,
    SentimentLabel, SourceProvider, Tag, TextAnalysis, TextFeature, TextRequest, MAX_IMAGE_BYTES,
    MAX_TEXT_CHARS,
};
pub use error::{CompassError, CompassResult, ConfigError, ProviderError};
pub use health::{
    HealthStatus, HealthThresholds, HealthTransition, OverallHealth, ProbeOutcome, ServiceHealth,
};
pub use metrics::{names as metric_names, MetricSample, MetricSummary};

/// SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = compute_content_hash(b"https://cdn.shop/jewelry-necklace-123.jpg");
        let b = compute_content_hash(b"https://cdn.shop/jewelry-necklace-123.jpg");
        let c = compute_content_hash(b"https://cdn.shop/jewelry-necklace-124.jpg");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
