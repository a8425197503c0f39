//! Property-Based Tests for Provider Fallback
//!
//! **Property: Upstream failures are invisible**
//!
//! For any valid request and any failure of the real provider, the
//! orchestrator SHALL return a simulator result for the same features,
//! and SHALL record exactly one fallback for the request's service.
//!
//! **Property: Invalid input is rejected before any provider call**

use std::sync::Arc;

use compass_api::{AppState, AppStateConfig};
use compass_core::{metric_names, AnalysisRequest, ProviderError, SourceProvider, TextRequest};
use compass_providers::{ProviderAdapter, SimulatorProvider};
use compass_test_utils::{generators, ScriptedProvider};
use proptest::prelude::*;

fn state_with_real(real: Arc<ScriptedProvider>) -> AppState {
    AppState::new(
        Some(real as Arc<dyn ProviderAdapter>),
        Arc::new(SimulatorProvider::default()),
        AppStateConfig::default(),
    )
}

fn blank_text() -> impl Strategy<Value = String> {
    proptest::sample::select(vec!["", " ", "\t", "\n\n", "   \t  "]).prop_map(String::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_upstream_failure_falls_back_to_simulator(
        request in generators::arb_request(),
        error in generators::arb_upstream_error(),
    ) {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        rt.block_on(async {
            let real = Arc::new(ScriptedProvider::real().failing(error.clone()));
            let state = state_with_real(real.clone());
            let service = request.capability().as_str();
            let expected_features = request.feature_names();

            let result = state
                .orchestrator
                .analyze(request)
                .await
                .map_err(|e| TestCaseError::fail(format!("{} leaked: {}", error, e)))?;

            prop_assert_eq!(result.source_provider, SourceProvider::Simulator);
            prop_assert_eq!(&result.features, &expected_features);
            prop_assert_eq!(real.calls(), 1);
            prop_assert_eq!(
                state.metrics.count(service, metric_names::FALLBACK_TRIGGERED),
                1
            );
            if let Some(sentiment) = result.text().and_then(|t| t.sentiment.as_ref()) {
                prop_assert!((sentiment.confidence_scores.sum() - 1.0).abs() < 1e-6);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_blank_text_never_reaches_a_provider(text in blank_text()) {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        rt.block_on(async {
            let real = Arc::new(ScriptedProvider::real());
            let state = state_with_real(real.clone());

            let outcome = state
                .orchestrator
                .analyze(AnalysisRequest::Text(TextRequest::new(text)))
                .await;

            prop_assert!(
                matches!(outcome, Err(ProviderError::InvalidInput { .. })),
                "expected InvalidInput, got {:?}",
                outcome
            );
            prop_assert_eq!(real.calls(), 0);
            prop_assert_eq!(state.metrics.count("text", metric_names::ATTEMPT_REAL), 0);
            prop_assert_eq!(state.metrics.count("text", metric_names::ATTEMPT_SIMULATOR), 0);
            Ok(())
        })?;
    }
}
