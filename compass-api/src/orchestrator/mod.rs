//! Fallback Orchestrator
//!
//! Per-request state machine:
//!
//! ```text
//! START -> RATE_CHECK -> REAL_ATTEMPT -> SUCCESS
//!              |              |
//!              +--------------+--> SIMULATOR_ATTEMPT -> SUCCESS | HARD_FAIL
//! ```
//!
//! The real provider is skipped when it is not configured for the capability,
//! when its service is `unhealthy`, or when its quota window is full. Every
//! real failure is absorbed; only invalid input and simulator failures reach
//! the caller. Both attempts run under a hard timeout, so one request takes
//! at most `real_timeout + simulator_timeout`.

pub mod rate_limit;

pub use rate_limit::{QuotaState, RateLimiter, RateLimiterConfig};

use std::sync::Arc;
use std::time::{Duration, Instant};

use compass_core::{
    metric_names, AnalysisRequest, AnalysisResult, Capability, HealthStatus, MetricSample,
    ProviderError,
};
use compass_providers::ProviderAdapter;
use tokio::time::timeout;

use crate::config::env_or;
use crate::constants::{DEFAULT_REAL_TIMEOUT_MS, DEFAULT_SIMULATOR_TIMEOUT_MS};
use crate::monitoring::{HealthMonitor, MetricsAggregator};
use crate::telemetry::METRICS;

/// Attempt timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub real_timeout: Duration,
    pub simulator_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            real_timeout: Duration::from_millis(DEFAULT_REAL_TIMEOUT_MS),
            simulator_timeout: Duration::from_millis(DEFAULT_SIMULATOR_TIMEOUT_MS),
        }
    }
}

impl OrchestratorConfig {
    /// Load from environment variables.
    ///
    /// Environment variables:
    /// - `COMPASS_REAL_TIMEOUT_MS`: Real provider attempt timeout (default: 5000)
    /// - `COMPASS_SIMULATOR_TIMEOUT_MS`: Simulator attempt timeout (default: 1000)
    pub fn from_env() -> Self {
        Self {
            real_timeout: Duration::from_millis(
                env_or("COMPASS_REAL_TIMEOUT_MS", DEFAULT_REAL_TIMEOUT_MS).max(1),
            ),
            simulator_timeout: Duration::from_millis(
                env_or("COMPASS_SIMULATOR_TIMEOUT_MS", DEFAULT_SIMULATOR_TIMEOUT_MS).max(1),
            ),
        }
    }

    /// Upper bound on one request's wall-clock time.
    pub fn total_bound(&self) -> Duration {
        self.real_timeout + self.simulator_timeout
    }
}

/// Why a request was answered by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    NotConfigured,
    Unhealthy,
    RateLimited,
    /// The real attempt failed; carries the error kind.
    RealFailure(&'static str),
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match *self {
            FallbackReason::NotConfigured => "not_configured",
            FallbackReason::Unhealthy => "unhealthy",
            FallbackReason::RateLimited => "rate_limited",
            FallbackReason::RealFailure(kind) => kind,
        }
    }
}

/// Records a `request_cancelled` sample if the request future is dropped
/// before it completes.
struct CancelGuard<'a> {
    metrics: &'a MetricsAggregator,
    service: &'static str,
    armed: bool,
}

impl<'a> CancelGuard<'a> {
    fn new(metrics: &'a MetricsAggregator, service: &'static str) -> Self {
        Self {
            metrics,
            service,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(service = self.service, "Analysis request cancelled");
            self.metrics.record(MetricSample::new(
                self.service,
                metric_names::REQUEST_CANCELLED,
                1.0,
            ));
        }
    }
}

pub struct FallbackOrchestrator {
    real: Option<Arc<dyn ProviderAdapter>>,
    simulator: Arc<dyn ProviderAdapter>,
    limiter: RateLimiter,
    health: Arc<HealthMonitor>,
    metrics: Arc<MetricsAggregator>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field("real", &self.real.as_ref().map(|p| p.provider_id().to_string()))
            .field("simulator", &self.simulator.provider_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FallbackOrchestrator {
    pub fn new(
        real: Option<Arc<dyn ProviderAdapter>>,
        simulator: Arc<dyn ProviderAdapter>,
        limiter: RateLimiter,
        health: Arc<HealthMonitor>,
        metrics: Arc<MetricsAggregator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            real,
            simulator,
            limiter,
            health,
            metrics,
            config,
        }
    }

    pub fn real(&self) -> Option<&Arc<dyn ProviderAdapter>> {
        self.real.as_ref()
    }

    pub fn simulator(&self) -> &Arc<dyn ProviderAdapter> {
        &self.simulator
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The real provider if it serves `capability`.
    pub fn real_for(&self, capability: Capability) -> Option<&Arc<dyn ProviderAdapter>> {
        self.real.as_ref().filter(|p| p.supports(capability))
    }

    /// Analyze one request, falling back to the simulator when the real
    /// provider is skipped or fails.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        request.validate()?;

        let started = Instant::now();
        let capability = request.capability();
        let service = capability.as_str();
        let guard = CancelGuard::new(&self.metrics, service);

        let outcome = self.route(&request, capability, service).await;
        guard.disarm();

        let (mut result, provider) = outcome?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        result.processing_time_ms = elapsed_ms;
        self.metrics.record(
            MetricSample::new(service, metric_names::LATENCY_MS, elapsed_ms)
                .with_label("provider", provider)
                .with_label("source", result.source_provider.as_str()),
        );
        Ok(result)
    }

    async fn route(
        &self,
        request: &AnalysisRequest,
        capability: Capability,
        service: &'static str,
    ) -> Result<(AnalysisResult, String), ProviderError> {
        let reason = match self.real_for(capability) {
            None => FallbackReason::NotConfigured,
            Some(_) if self.health.status(service) == HealthStatus::Unhealthy => {
                FallbackReason::Unhealthy
            }
            Some(_) if !self.limiter.try_acquire(service) => FallbackReason::RateLimited,
            Some(real) => match self.attempt_real(real, request, service).await {
                Ok(result) => return Ok((result, real.provider_id().to_string())),
                Err(e) => FallbackReason::RealFailure(e.kind()),
            },
        };

        self.metrics.record(
            MetricSample::new(service, metric_names::FALLBACK_TRIGGERED, 1.0)
                .with_label("reason", reason.as_str()),
        );
        if let Ok(m) = METRICS.as_ref() {
            m.record_fallback(service, reason.as_str());
        }
        tracing::debug!(service, reason = reason.as_str(), "Falling back to simulator");

        let result = self.attempt_simulator(request, service).await?;
        Ok((result, self.simulator.provider_id().to_string()))
    }

    async fn attempt_real(
        &self,
        real: &Arc<dyn ProviderAdapter>,
        request: &AnalysisRequest,
        service: &'static str,
    ) -> Result<AnalysisResult, ProviderError> {
        let provider = real.provider_id();
        self.metrics.record(
            MetricSample::new(service, metric_names::ATTEMPT_REAL, 1.0)
                .with_label("provider", provider),
        );

        let started = Instant::now();
        let outcome = match timeout(self.config.real_timeout, real.analyze(request)).await {
            Ok(Ok(result)) if result.data.capability() != request.capability() => {
                Err(ProviderError::UpstreamInvalidResponse {
                    provider: provider.to_string(),
                    message: format!(
                        "{} analysis returned for a {} request",
                        result.data.capability().as_str(),
                        request.capability().as_str()
                    ),
                })
            }
            Ok(result) => result,
            Err(_) => Err(ProviderError::UpstreamTimeout {
                provider: provider.to_string(),
                timeout_ms: self.config.real_timeout.as_millis() as u64,
            }),
        };
        let secs = started.elapsed().as_secs_f64();

        match &outcome {
            Ok(_) => {
                if let Ok(m) = METRICS.as_ref() {
                    m.record_provider_attempt(service, provider, "success", Some(secs));
                }
            }
            Err(e) => {
                tracing::warn!(
                    service,
                    provider,
                    kind = e.kind(),
                    error = %e,
                    elapsed_ms = (secs * 1000.0) as u64,
                    "Real provider attempt failed"
                );
                self.metrics.record(
                    MetricSample::new(service, metric_names::REAL_FAILURE, 1.0)
                        .with_label("provider", provider)
                        .with_label("outcome", e.kind()),
                );
                if let Ok(m) = METRICS.as_ref() {
                    m.record_provider_attempt(service, provider, e.kind(), Some(secs));
                }
            }
        }
        outcome
    }

    async fn attempt_simulator(
        &self,
        request: &AnalysisRequest,
        service: &'static str,
    ) -> Result<AnalysisResult, ProviderError> {
        let provider = self.simulator.provider_id();
        self.metrics.record(
            MetricSample::new(service, metric_names::ATTEMPT_SIMULATOR, 1.0)
                .with_label("provider", provider),
        );

        let started = Instant::now();
        let outcome = match timeout(self.config.simulator_timeout, self.simulator.analyze(request)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e @ ProviderError::InvalidInput { .. }))
            | Ok(Err(e @ ProviderError::SimulatorFailure { .. })) => Err(e),
            Ok(Err(other)) => Err(ProviderError::SimulatorFailure {
                reason: other.to_string(),
            }),
            Err(_) => Err(ProviderError::SimulatorFailure {
                reason: format!(
                    "simulator exceeded {}ms",
                    self.config.simulator_timeout.as_millis()
                ),
            }),
        };
        let secs = started.elapsed().as_secs_f64();

        let label = match &outcome {
            Ok(_) => "success",
            Err(e) => {
                tracing::error!(service, provider, error = %e, "Simulator attempt failed");
                e.kind()
            }
        };
        if let Ok(m) = METRICS.as_ref() {
            m.record_provider_attempt(service, provider, label, Some(secs));
        }
        outcome
    }
}
