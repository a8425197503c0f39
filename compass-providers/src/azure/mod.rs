//! Azure Cognitive Services provider
//!
//! Vision and text are separate Azure resources with their own endpoint and
//! key. Either may be configured alone; the provider only advertises the
//! capabilities it has credentials for.

pub mod client;
pub mod text;
pub mod types;
pub mod vision;

pub use client::AzureClient;

use crate::ProviderAdapter;
use async_trait::async_trait;
use compass_core::{
    AnalysisData, AnalysisRequest, AnalysisResult, Capability, CompassResult, ConfigError,
    ImageFeature, ImageRequest, ImageSource, ProviderError, SourceProvider, TextFeature,
    TextRequest,
};
use std::time::Duration;

pub const AZURE_PROVIDER_ID: &str = "azure";
pub const VISION_PROVIDER_NAME: &str = "azure-vision";
pub const TEXT_PROVIDER_NAME: &str = "azure-text";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PROBE_IMAGE_URL: &str =
    "https://upload.wikimedia.org/wikipedia/commons/3/3f/Fronalpstock_big.jpg";
const PROBE_TEXT: &str = "ping";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Endpoint and key for one Cognitive Services resource.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    pub endpoint: String,
    pub api_key: String,
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConfig {
    pub vision: Option<AzureCredentials>,
    pub text: Option<AzureCredentials>,
    /// Image used by the vision health probe.
    pub probe_image_url: String,
    pub request_timeout: Duration,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            vision: None,
            text: None,
            probe_image_url: DEFAULT_PROBE_IMAGE_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl AzureConfig {
    /// Load from environment variables.
    ///
    /// Environment variables:
    /// - `COMPASS_AZURE_VISION_ENDPOINT` / `COMPASS_AZURE_VISION_KEY`
    /// - `COMPASS_AZURE_TEXT_ENDPOINT` / `COMPASS_AZURE_TEXT_KEY`
    /// - `COMPASS_AZURE_PROBE_IMAGE_URL`: Image for vision probes
    /// - `COMPASS_AZURE_REQUEST_TIMEOUT_MS`: Per-request HTTP timeout (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            vision: credentials(
                get("COMPASS_AZURE_VISION_ENDPOINT"),
                get("COMPASS_AZURE_VISION_KEY"),
                "COMPASS_AZURE_VISION",
            )?,
            text: credentials(
                get("COMPASS_AZURE_TEXT_ENDPOINT"),
                get("COMPASS_AZURE_TEXT_KEY"),
                "COMPASS_AZURE_TEXT",
            )?,
            probe_image_url: get("COMPASS_AZURE_PROBE_IMAGE_URL")
                .unwrap_or(defaults.probe_image_url),
            request_timeout: get("COMPASS_AZURE_REQUEST_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.vision.is_some() || self.text.is_some()
    }
}

/// Both halves or neither. A lone endpoint or key is a configuration error.
fn credentials(
    endpoint: Option<String>,
    api_key: Option<String>,
    prefix: &str,
) -> Result<Option<AzureCredentials>, ConfigError> {
    match (endpoint, api_key) {
        (Some(endpoint), Some(api_key)) => {
            if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}_ENDPOINT", prefix),
                    value: endpoint,
                    reason: "must be an http(s) URL".to_string(),
                });
            }
            Ok(Some(AzureCredentials { endpoint, api_key }))
        }
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingRequired {
            field: format!("{}_KEY", prefix),
        }),
        (None, Some(_)) => Err(ConfigError::MissingRequired {
            field: format!("{}_ENDPOINT", prefix),
        }),
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Real provider backed by Azure Cognitive Services.
#[derive(Debug)]
pub struct AzureProvider {
    vision: Option<AzureClient>,
    text: Option<AzureClient>,
    capabilities: Vec<Capability>,
    probe_image_url: String,
}

impl AzureProvider {
    /// Build a provider from config. `None` when no resource is configured.
    pub fn from_config(config: &AzureConfig) -> CompassResult<Option<Self>> {
        if !config.is_configured() {
            return Ok(None);
        }
        let build = |name: &'static str, creds: &Option<AzureCredentials>| {
            creds
                .as_ref()
                .map(|c| AzureClient::new(name, &c.endpoint, &c.api_key, config.request_timeout))
                .transpose()
        };
        let vision = build(VISION_PROVIDER_NAME, &config.vision)?;
        let text = build(TEXT_PROVIDER_NAME, &config.text)?;

        let mut capabilities = Vec::new();
        if vision.is_some() {
            capabilities.push(Capability::Vision);
        }
        if text.is_some() {
            capabilities.push(Capability::Text);
        }

        Ok(Some(Self {
            vision,
            text,
            capabilities,
            probe_image_url: config.probe_image_url.clone(),
        }))
    }

    fn client_for(&self, capability: Capability) -> Result<&AzureClient, ProviderError> {
        let client = match capability {
            Capability::Vision => self.vision.as_ref(),
            Capability::Text => self.text.as_ref(),
        };
        client.ok_or_else(|| ProviderError::UpstreamUnavailable {
            provider: AZURE_PROVIDER_ID.to_string(),
            status: None,
            message: format!("{} capability is not configured", capability),
        })
    }
}

#[async_trait]
impl ProviderAdapter for AzureProvider {
    fn provider_id(&self) -> &str {
        AZURE_PROVIDER_ID
    }

    fn source(&self) -> SourceProvider {
        SourceProvider::Real
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        request.validate()?;
        let client = self.client_for(request.capability())?;
        let data = match request {
            AnalysisRequest::Image(req) => AnalysisData::Image(vision::analyze(client, req).await?),
            AnalysisRequest::Text(req) => AnalysisData::Text(text::analyze(client, req).await?),
        };
        Ok(AnalysisResult::new(request, data, self.source()))
    }

    async fn probe(&self, capability: Capability) -> Result<(), ProviderError> {
        let client = self.client_for(capability)?;
        match capability {
            Capability::Text => {
                let req = TextRequest::new(PROBE_TEXT).with_features([TextFeature::Language]);
                text::analyze(client, &req).await.map(|_| ())
            }
            Capability::Vision => {
                let req = ImageRequest::new(ImageSource::Url(self.probe_image_url.clone()))
                    .with_features([ImageFeature::Colors]);
                vision::analyze(client, &req).await.map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::CompassError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_env_is_unconfigured() -> Result<(), ConfigError> {
        let cfg = AzureConfig::from_lookup(lookup(&[]))?;
        assert!(!cfg.is_configured());
        assert_eq!(cfg.request_timeout, Duration::from_millis(10_000));
        Ok(())
    }

    #[test]
    fn test_half_configured_resource_is_an_error() {
        let err = AzureConfig::from_lookup(lookup(&[(
            "COMPASS_AZURE_TEXT_ENDPOINT",
            "https://text.example.com",
        )]))
        .err();
        assert_eq!(
            err,
            Some(ConfigError::MissingRequired {
                field: "COMPASS_AZURE_TEXT_KEY".to_string()
            })
        );
    }

    #[test]
    fn test_text_only_provider() -> Result<(), CompassError> {
        let cfg = AzureConfig::from_lookup(lookup(&[
            ("COMPASS_AZURE_TEXT_ENDPOINT", "https://text.example.com/"),
            ("COMPASS_AZURE_TEXT_KEY", "k"),
            ("COMPASS_AZURE_REQUEST_TIMEOUT_MS", "2500"),
        ]))?;
        assert_eq!(cfg.request_timeout, Duration::from_millis(2500));
        let provider = AzureProvider::from_config(&cfg)?
            .ok_or(ProviderError::invalid_input("expected a provider"))?;
        assert!(provider.supports(Capability::Text));
        assert!(!provider.supports(Capability::Vision));
        assert_eq!(provider.source(), SourceProvider::Real);
        Ok(())
    }

    #[test]
    fn test_unconfigured_provider_is_none() -> Result<(), CompassError> {
        assert!(AzureProvider::from_config(&AzureConfig::default())?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_unconfigured_capability_is_fallback_eligible() -> Result<(), CompassError> {
        let cfg = AzureConfig {
            text: Some(AzureCredentials {
                endpoint: "https://text.example.com".into(),
                api_key: "k".into(),
            }),
            ..AzureConfig::default()
        };
        let provider = AzureProvider::from_config(&cfg)?
            .ok_or(ProviderError::invalid_input("expected a provider"))?;
        let req = AnalysisRequest::Image(ImageRequest::new(ImageSource::Url(
            "https://shop.example/a.jpg".into(),
        )));
        let err = provider.analyze(&req).await.err();
        assert!(err.map(|e| e.is_fallback_eligible()).unwrap_or(false));
        Ok(())
    }
}
