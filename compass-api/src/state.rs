//! Shared application state for Axum routers.
//!
//! Components are built once here and handed to handlers and background jobs
//! as explicit `Arc` handles.

use std::sync::Arc;

use compass_core::Capability;
use compass_providers::{AzureConfig, AzureProvider, ProviderAdapter, SimulationConfig, SimulatorProvider};

use crate::config::ApiConfig;
use crate::constants::SIMULATOR_SERVICE;
use crate::error::ApiResult;
use crate::jobs::ProbeTarget;
use crate::middleware::RateLimitState;
use crate::monitoring::{AlertStore, HealthMonitor, MetricsAggregator, MonitorSettings, SettingsHandle};
use crate::orchestrator::{FallbackOrchestrator, OrchestratorConfig, RateLimiter, RateLimiterConfig};

/// Tunables gathered from the environment at startup.
#[derive(Debug, Clone, Default)]
pub struct AppStateConfig {
    pub orchestrator: OrchestratorConfig,
    pub rate_limits: RateLimiterConfig,
    pub monitor: MonitorSettings,
    pub api: ApiConfig,
}

impl AppStateConfig {
    pub fn from_env() -> Self {
        Self {
            orchestrator: OrchestratorConfig::from_env(),
            rate_limits: RateLimiterConfig::from_env(),
            monitor: MonitorSettings::from_env(),
            api: ApiConfig::from_env(),
        }
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FallbackOrchestrator>,
    pub health: Arc<HealthMonitor>,
    pub metrics: Arc<MetricsAggregator>,
    pub alerts: Arc<AlertStore>,
    pub settings: SettingsHandle,
    pub api_config: Arc<ApiConfig>,
    pub inbound_limits: RateLimitState,
    pub start_time: std::time::Instant,
}

crate::impl_from_ref!(Arc<FallbackOrchestrator>, orchestrator);
crate::impl_from_ref!(Arc<HealthMonitor>, health);
crate::impl_from_ref!(Arc<MetricsAggregator>, metrics);
crate::impl_from_ref!(Arc<AlertStore>, alerts);
crate::impl_from_ref!(SettingsHandle, settings);
crate::impl_from_ref!(Arc<ApiConfig>, api_config);
crate::impl_from_ref!(std::time::Instant, start_time);

impl AppState {
    /// Wire the components around the given providers.
    pub fn new(
        real: Option<Arc<dyn ProviderAdapter>>,
        simulator: Arc<dyn ProviderAdapter>,
        config: AppStateConfig,
    ) -> Self {
        let settings = SettingsHandle::new(config.monitor);
        let alerts = Arc::new(AlertStore::new());
        let services = Capability::ALL
            .iter()
            .map(|c| c.as_str())
            .chain([SIMULATOR_SERVICE]);
        let health = Arc::new(HealthMonitor::new(services, alerts.clone(), settings.clone()));
        let metrics = Arc::new(MetricsAggregator::new(settings.clone()));

        for capability in Capability::ALL {
            if !real.as_ref().is_some_and(|p| p.supports(capability)) {
                health.mark_unconfigured(capability.as_str());
            }
        }

        let orchestrator = Arc::new(FallbackOrchestrator::new(
            real,
            simulator,
            RateLimiter::from_config(&config.rate_limits),
            health.clone(),
            metrics.clone(),
            config.orchestrator,
        ));

        Self {
            orchestrator,
            health,
            metrics,
            alerts,
            settings,
            inbound_limits: RateLimitState::new(config.api.clone()),
            api_config: Arc::new(config.api),
            start_time: std::time::Instant::now(),
        }
    }

    /// Build the Azure provider (when configured) and the simulator from the environment.
    pub fn from_env() -> ApiResult<Self> {
        let azure = AzureProvider::from_config(&AzureConfig::from_env()?)?;
        let real: Option<Arc<dyn ProviderAdapter>> = match azure {
            Some(provider) => {
                tracing::info!(
                    capabilities = ?provider.capabilities(),
                    "Real provider configured"
                );
                Some(Arc::new(provider) as Arc<dyn ProviderAdapter>)
            }
            None => {
                tracing::warn!("No real provider configured; every request is served by the simulator");
                None
            }
        };
        let simulator = Arc::new(SimulatorProvider::new(SimulationConfig::from_env()));
        Ok(Self::new(real, simulator, AppStateConfig::from_env()))
    }

    /// One probe target per configured real capability, plus the simulator.
    pub fn probe_targets(&self) -> Vec<ProbeTarget> {
        let mut targets: Vec<ProbeTarget> = Capability::ALL
            .iter()
            .filter_map(|capability| {
                self.orchestrator
                    .real_for(*capability)
                    .map(|provider| ProbeTarget {
                        service: capability.as_str().to_string(),
                        provider: provider.clone(),
                        capabilities: vec![*capability],
                    })
            })
            .collect();
        targets.push(ProbeTarget {
            service: SIMULATOR_SERVICE.to_string(),
            provider: self.orchestrator.simulator().clone(),
            capabilities: Capability::ALL.to_vec(),
        });
        targets
    }
}
