//! Compass Test Utilities
//!
//! Centralized test infrastructure for the Compass workspace:
//! - Scripted provider doubles for driving the orchestrator
//! - Proptest generators for requests and upstream failures
//! - Test fixtures for common scenarios

pub use compass_core::{
    AnalysisData, AnalysisRequest, AnalysisResult, Capability, ImageAnalysis, ImageFeature,
    ImageRequest, ImageSource, ProviderError, SourceProvider, TextAnalysis, TextFeature,
    TextRequest,
};
pub use compass_providers::{ProviderAdapter, SimulatorProvider};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

// ============================================================================
// SCRIPTED PROVIDER
// ============================================================================

/// What a scripted provider does on one call.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Answer with simulator-shaped data tagged with the provider's source.
    Succeed,
    Fail(ProviderError),
    /// Sleep, then succeed. Used to trip orchestrator timeouts.
    Hang(Duration),
    /// Succeed with data of the other capability.
    Mismatch,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Provider double with a queue of per-call outcomes.
///
/// Once the queue is drained every call uses the fallback outcome.
#[derive(Debug)]
pub struct ScriptedProvider {
    id: String,
    source: SourceProvider,
    capabilities: Vec<Capability>,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback: Mutex<ScriptedOutcome>,
    probe_result: Mutex<Result<(), ProviderError>>,
    calls: AtomicU64,
    probe_calls: AtomicU64,
    inner: SimulatorProvider,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<String>, source: SourceProvider) -> Self {
        Self {
            id: id.into(),
            source,
            capabilities: Capability::ALL.to_vec(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ScriptedOutcome::Succeed),
            probe_result: Mutex::new(Ok(())),
            calls: AtomicU64::new(0),
            probe_calls: AtomicU64::new(0),
            inner: SimulatorProvider::default(),
        }
    }

    /// A healthy stand-in for the real provider.
    pub fn real() -> Self {
        Self::new("scripted-real", SourceProvider::Real)
    }

    /// A stand-in for the simulator.
    pub fn simulator() -> Self {
        Self::new("scripted-simulator", SourceProvider::Simulator)
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    /// Outcome for every call once the script is empty.
    pub fn always(self, outcome: ScriptedOutcome) -> Self {
        *lock(&self.fallback) = outcome;
        self
    }

    /// Queue an outcome for the next unscripted call.
    pub fn then(self, outcome: ScriptedOutcome) -> Self {
        lock(&self.script).push_back(outcome);
        self
    }

    pub fn failing(self, error: ProviderError) -> Self {
        self.always(ScriptedOutcome::Fail(error))
    }

    pub fn hanging(self, delay: Duration) -> Self {
        self.always(ScriptedOutcome::Hang(delay))
    }

    pub fn with_probe(self, result: Result<(), ProviderError>) -> Self {
        self.set_probe(result);
        self
    }

    pub fn set_probe(&self, result: Result<(), ProviderError>) {
        *lock(&self.probe_result) = result;
    }

    pub fn set_outcome(&self, outcome: ScriptedOutcome) {
        *lock(&self.fallback) = outcome;
    }

    /// Number of `analyze` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> u64 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.fallback).clone())
    }

    async fn succeed(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        let mut result = self.inner.analyze(request).await?;
        result.source_provider = self.source;
        if self.source == SourceProvider::Real {
            result.error_message = None;
        }
        Ok(result)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> SourceProvider {
        self.source
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            ScriptedOutcome::Succeed => self.succeed(request).await,
            ScriptedOutcome::Fail(error) => Err(error),
            ScriptedOutcome::Hang(delay) => {
                tokio::time::sleep(delay).await;
                self.succeed(request).await
            }
            ScriptedOutcome::Mismatch => {
                let mut result = self.succeed(request).await?;
                result.data = match result.data {
                    AnalysisData::Image(_) => AnalysisData::Text(TextAnalysis::default()),
                    AnalysisData::Text(_) => AnalysisData::Image(ImageAnalysis::default()),
                };
                Ok(result)
            }
        }
    }

    async fn probe(&self, _capability: Capability) -> Result<(), ProviderError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.probe_result).clone()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

pub mod errors {
    //! Canned upstream failures, one per error kind.

    use super::ProviderError;

    pub const PROVIDER: &str = "scripted-real";

    pub fn timeout() -> ProviderError {
        ProviderError::UpstreamTimeout {
            provider: PROVIDER.to_string(),
            timeout_ms: 5000,
        }
    }

    pub fn auth_failure() -> ProviderError {
        ProviderError::UpstreamAuthFailure {
            provider: PROVIDER.to_string(),
            status: 401,
        }
    }

    pub fn quota_exceeded() -> ProviderError {
        ProviderError::UpstreamQuotaExceeded {
            provider: PROVIDER.to_string(),
            retry_after_ms: Some(1000),
        }
    }

    pub fn unavailable() -> ProviderError {
        ProviderError::UpstreamUnavailable {
            provider: PROVIDER.to_string(),
            status: Some(503),
            message: "service unavailable".to_string(),
        }
    }

    pub fn rejected() -> ProviderError {
        ProviderError::UpstreamRejected {
            provider: PROVIDER.to_string(),
            status: 400,
            message: "bad request".to_string(),
        }
    }

    pub fn invalid_response() -> ProviderError {
        ProviderError::UpstreamInvalidResponse {
            provider: PROVIDER.to_string(),
            message: "unexpected body".to_string(),
        }
    }

    pub fn simulator_failure() -> ProviderError {
        ProviderError::SimulatorFailure {
            reason: "scripted failure".to_string(),
        }
    }

    /// Every error the orchestrator must absorb with a fallback.
    pub fn all_upstream() -> Vec<ProviderError> {
        vec![
            timeout(),
            auth_failure(),
            quota_exceeded(),
            unavailable(),
            rejected(),
            invalid_response(),
        ]
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for requests and failures.

    use super::*;
    use proptest::prelude::*;

    const REVIEW_WORDS: &[&str] = &[
        "this", "necklace", "is", "very", "not", "absolutely", "amazing", "terrible", "okay",
        "love", "hate", "shipping", "quality", "price", "was", "the", "never", "broke",
        "beautiful", "cheap", "decent", "really", "and", "I",
    ];

    const URL_SUBJECTS: &[&str] = &[
        "silver-ring", "dog-collar", "wall-art", "canvas-print", "knitting-kit", "vase",
        "earrings", "cat-toy", "poster", "blanket",
    ];

    /// Review-like text built from lexicon and filler words.
    pub fn arb_review_text() -> impl Strategy<Value = String> {
        proptest::collection::vec(proptest::sample::select(REVIEW_WORDS), 1..60)
            .prop_map(|words| words.join(" "))
    }

    /// Product image URLs that pass request validation.
    pub fn arb_image_url() -> impl Strategy<Value = String> {
        (proptest::sample::select(URL_SUBJECTS), 0u32..100_000)
            .prop_map(|(subject, n)| format!("https://cdn.shop.example/{}-{}.jpg", subject, n))
    }

    pub fn arb_text_features() -> impl Strategy<Value = Vec<TextFeature>> {
        proptest::sample::subsequence(TextFeature::ALL.to_vec(), 1..=TextFeature::ALL.len())
    }

    pub fn arb_image_features() -> impl Strategy<Value = Vec<ImageFeature>> {
        proptest::sample::subsequence(ImageFeature::ALL.to_vec(), 1..=ImageFeature::ALL.len())
    }

    pub fn arb_text_request() -> impl Strategy<Value = AnalysisRequest> {
        (arb_review_text(), arb_text_features()).prop_map(|(text, features)| {
            AnalysisRequest::Text(TextRequest::new(text).with_features(features))
        })
    }

    pub fn arb_image_request() -> impl Strategy<Value = AnalysisRequest> {
        (arb_image_url(), arb_image_features()).prop_map(|(url, features)| {
            AnalysisRequest::Image(ImageRequest::new(ImageSource::Url(url)).with_features(features))
        })
    }

    pub fn arb_request() -> impl Strategy<Value = AnalysisRequest> {
        prop_oneof![arb_text_request(), arb_image_request()]
    }

    /// Any failure the real provider can report.
    pub fn arb_upstream_error() -> impl Strategy<Value = ProviderError> {
        proptest::sample::select(super::errors::all_upstream())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built requests for common scenarios.

    use super::*;

    pub const POSITIVE_REVIEW: &str = "This product is absolutely amazing! I love it so much!";
    pub const NEGATIVE_REVIEW: &str = "Terrible quality, it broke after two days. Very disappointed.";
    pub const JEWELRY_IMAGE_URL: &str = "https://cdn.shop.example/handmade-silver-necklace.jpg";

    pub fn text_request(text: &str) -> AnalysisRequest {
        AnalysisRequest::Text(TextRequest::new(text))
    }

    pub fn image_url_request(url: &str) -> AnalysisRequest {
        AnalysisRequest::Image(ImageRequest::new(ImageSource::Url(url.to_string())))
    }

    pub fn positive_review() -> AnalysisRequest {
        text_request(POSITIVE_REVIEW)
    }

    pub fn jewelry_image() -> AnalysisRequest {
        image_url_request(JEWELRY_IMAGE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let provider = ScriptedProvider::real()
            .then(ScriptedOutcome::Fail(errors::unavailable()))
            .always(ScriptedOutcome::Succeed);
        let req = fixtures::positive_review();

        assert!(provider.analyze(&req).await.is_err());
        let ok = provider.analyze(&req).await;
        assert_eq!(ok.map(|r| r.source_provider).ok(), Some(SourceProvider::Real));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_probe_result_is_settable() {
        let provider = ScriptedProvider::real().with_probe(Err(errors::timeout()));
        assert!(provider.probe(Capability::Text).await.is_err());
        provider.set_probe(Ok(()));
        assert!(provider.probe(Capability::Text).await.is_ok());
        assert_eq!(provider.probe_calls(), 2);
    }

    #[test]
    fn test_all_upstream_errors_are_fallback_eligible() {
        assert!(errors::all_upstream().iter().all(|e| e.is_fallback_eligible()));
        assert!(!errors::simulator_failure().is_fallback_eligible());
    }
}
