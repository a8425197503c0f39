//! Simulator adapter over the local engine

use crate::simulation::{SimulationConfig, SimulationEngine};
use crate::ProviderAdapter;
use async_trait::async_trait;
use compass_core::{
    AnalysisData, AnalysisRequest, AnalysisResult, Capability, ImageFeature, ImageRequest,
    ImageSource, ProviderError, SourceProvider, TextFeature, TextRequest,
};

pub const SIMULATOR_PROVIDER_ID: &str = "simulator";

const PROBE_TEXT: &str = "Simulator probe: the quality is great.";
const PROBE_IMAGE_URL: &str = "https://probe.invalid/handmade-silver-ring.jpg";

/// Fallback provider. Always available and deterministic.
#[derive(Debug, Clone, Default)]
pub struct SimulatorProvider {
    engine: SimulationEngine,
}

impl SimulatorProvider {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            engine: SimulationEngine::new(config),
        }
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }
}

#[async_trait]
impl ProviderAdapter for SimulatorProvider {
    fn provider_id(&self) -> &str {
        SIMULATOR_PROVIDER_ID
    }

    fn source(&self) -> SourceProvider {
        SourceProvider::Simulator
    }

    fn capabilities(&self) -> &[Capability] {
        &Capability::ALL
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        request.validate()?;
        match request {
            AnalysisRequest::Image(req) => {
                let analysis = self.engine.analyze_image(req)?;
                let result =
                    AnalysisResult::new(request, AnalysisData::Image(analysis), self.source());
                Ok(if req.wants(ImageFeature::Faces) {
                    result.with_error_message("face detection is not simulated")
                } else {
                    result
                })
            }
            AnalysisRequest::Text(req) => {
                let analysis = self.engine.analyze_text(req)?;
                Ok(AnalysisResult::new(
                    request,
                    AnalysisData::Text(analysis),
                    self.source(),
                ))
            }
        }
    }

    async fn probe(&self, capability: Capability) -> Result<(), ProviderError> {
        let outcome = match capability {
            Capability::Text => self
                .engine
                .analyze_text(&TextRequest::new(PROBE_TEXT).with_features([TextFeature::Sentiment]))
                .map(|_| ()),
            Capability::Vision => self
                .engine
                .analyze_image(
                    &ImageRequest::new(ImageSource::Url(PROBE_IMAGE_URL.to_string()))
                        .with_features([ImageFeature::Tags]),
                )
                .map(|_| ()),
        };
        outcome.map_err(|e| ProviderError::SimulatorFailure {
            reason: e.to_string(),
        })
    }
}
