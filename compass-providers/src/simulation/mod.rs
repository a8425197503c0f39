//! Deterministic local analysis
//!
//! The simulation engine produces plausible, input-keyed results for both
//! capabilities without any network access. Identical inputs always produce
//! identical outputs.

pub mod image;
pub mod seed;
pub mod text;

use compass_core::{ImageAnalysis, ImageRequest, ImageSource, ProviderError, TextAnalysis, TextRequest};

pub use text::DEFAULT_KEY_PHRASE_BOOST;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tunables for the simulation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Terms that rank higher during key-phrase extraction.
    pub key_phrase_boost: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            key_phrase_boost: DEFAULT_KEY_PHRASE_BOOST
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SimulationConfig {
    /// Load from `COMPASS_KEY_PHRASE_BOOST` (comma separated), falling back to
    /// the built-in list when unset or empty.
    pub fn from_env() -> Self {
        std::env::var("COMPASS_KEY_PHRASE_BOOST")
            .ok()
            .map(|raw| Self::from_boost_list(&raw))
            .filter(|cfg| !cfg.key_phrase_boost.is_empty())
            .unwrap_or_default()
    }

    pub fn from_boost_list(raw: &str) -> Self {
        Self {
            key_phrase_boost: raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SimulationEngine {
    config: SimulationConfig,
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn analyze_image(&self, request: &ImageRequest) -> Result<ImageAnalysis, ProviderError> {
        match &request.source {
            ImageSource::Bytes(bytes) if bytes.is_empty() => {
                Err(ProviderError::invalid_input("image payload is empty"))
            }
            ImageSource::Url(url) if url.trim().is_empty() => {
                Err(ProviderError::invalid_input("image url is empty"))
            }
            _ => Ok(image::analyze(request)),
        }
    }

    pub fn analyze_text(&self, request: &TextRequest) -> Result<TextAnalysis, ProviderError> {
        text::analyze(request, &self.config.key_phrase_boost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::{ImageFeature, SentimentLabel, TextFeature};

    #[test]
    fn test_boost_list_parsing() {
        let cfg = SimulationConfig::from_boost_list(" Glaze, ,handle ,Customer Service");
        assert_eq!(cfg.key_phrase_boost, vec!["glaze", "handle", "customer service"]);
    }

    #[test]
    fn test_text_is_deterministic() -> Result<(), ProviderError> {
        let engine = SimulationEngine::default();
        let req = TextRequest::new("The quality is great but shipping was slow")
            .with_features(TextFeature::ALL);
        assert_eq!(engine.analyze_text(&req)?, engine.analyze_text(&req)?);
        Ok(())
    }

    #[test]
    fn test_image_is_deterministic() -> Result<(), ProviderError> {
        let engine = SimulationEngine::default();
        let req = ImageRequest::new(ImageSource::Url(
            "https://cdn.shop.example/silver-ring-42.jpg".into(),
        ))
        .with_features(ImageFeature::ALL);
        assert_eq!(engine.analyze_image(&req)?, engine.analyze_image(&req)?);
        Ok(())
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let engine = SimulationEngine::default();
        let img = ImageRequest::new(ImageSource::Bytes(Vec::new()));
        assert!(matches!(engine.analyze_image(&img), Err(ProviderError::InvalidInput { .. })));
        let txt = TextRequest::new("");
        assert!(matches!(engine.analyze_text(&txt), Err(ProviderError::InvalidInput { .. })));
    }

    #[test]
    fn test_only_requested_text_features() -> Result<(), ProviderError> {
        let engine = SimulationEngine::default();
        let req = TextRequest::new("I hate this, it broke after a day")
            .with_features([TextFeature::Sentiment]);
        let out = engine.analyze_text(&req)?;
        assert_eq!(
            out.sentiment.map(|s| s.overall),
            Some(SentimentLabel::Negative)
        );
        assert!(out.key_phrases.is_none());
        assert!(out.entities.is_none());
        assert!(out.language.is_none());
        Ok(())
    }
}
