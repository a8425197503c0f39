//! Analysis provider adapters
//!
//! Every analysis backend sits behind [`ProviderAdapter`]:
//! - `azure` - Azure Cognitive Services (Computer Vision v3.2, Text Analytics v3.1)
//! - `simulator` - the deterministic local engine in [`simulation`]
//!
//! The orchestrator in `compass-api` holds adapters as trait objects, so test
//! doubles plug in the same way the real backends do.

pub mod azure;
pub mod simulation;
pub mod simulator;

pub use azure::{AzureClient, AzureConfig, AzureProvider};
pub use simulation::{SimulationConfig, SimulationEngine};
pub use simulator::SimulatorProvider;

use async_trait::async_trait;
use compass_core::{AnalysisRequest, AnalysisResult, Capability, ProviderError, SourceProvider};

// ============================================================================
// PROVIDER ADAPTER TRAIT
// ============================================================================

/// Adapter trait shared by the real provider and the simulator.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier used in logs and metric labels.
    fn provider_id(&self) -> &str;

    /// Which side of the fallback chain this adapter represents.
    fn source(&self) -> SourceProvider;

    /// Capabilities this adapter is configured to serve.
    fn capabilities(&self) -> &[Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Analyze one request. Implementations do not retry.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError>;

    /// Cheap liveness check for one capability.
    async fn probe(&self, capability: Capability) -> Result<(), ProviderError>;
}
