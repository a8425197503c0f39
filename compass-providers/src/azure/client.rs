//! Azure Cognitive Services HTTP client

use super::types::AzureErrorEnvelope;
use compass_core::ProviderError;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Thin client for one Cognitive Services resource.
///
/// Each call is a single attempt. Retries and fallback belong to the
/// orchestrator.
pub struct AzureClient {
    client: Client,
    provider: &'static str,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl AzureClient {
    /// Create a client for the resource at `endpoint`.
    ///
    /// # Arguments
    /// * `provider` - Name used in errors and metric labels (e.g. "azure-vision")
    /// * `endpoint` - Resource base URL, with or without a trailing slash
    /// * `timeout` - Per-request timeout enforced by reqwest
    pub fn new(
        provider: &'static str,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::UpstreamUnavailable {
                provider: provider.to_string(),
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            }
        })?;
        Ok(Self {
            client,
            provider,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<Req: Serialize + ?Sized, Res: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Res, ProviderError> {
        let request = self.client.post(self.url(path)).json(body);
        self.execute(request).await
    }

    /// POST raw image bytes and decode a JSON response.
    pub async fn post_bytes<Res: DeserializeOwned>(
        &self,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<Res, ProviderError> {
        let request = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        self.execute(request).await
    }

    async fn execute<Res: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Res, ProviderError> {
        let response = request
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(|e| self.send_error(e))?;
            return serde_json::from_slice(&body).map_err(|e| {
                ProviderError::UpstreamInvalidResponse {
                    provider: self.provider.to_string(),
                    message: format!("failed to parse response: {}", e),
                }
            });
        }

        let retry_after_ms = parse_retry_after_ms(response.headers());
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = match serde_json::from_str::<AzureErrorEnvelope>(&error_text) {
            Ok(envelope) => format!("{}: {}", envelope.error.code, envelope.error.message),
            Err(_) => error_text,
        };
        Err(map_status(self.provider, status, retry_after_ms, message))
    }

    fn send_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::UpstreamTimeout {
                provider: self.provider.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ProviderError::UpstreamUnavailable {
                provider: self.provider.to_string(),
                status: error.status().map(|s| s.as_u16()),
                message: format!("HTTP request failed: {}", error),
            }
        }
    }
}

/// Translate a non-success status into the provider error taxonomy.
pub fn map_status(
    provider: &str,
    status: StatusCode,
    retry_after_ms: Option<u64>,
    message: String,
) -> ProviderError {
    let provider = provider.to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::UpstreamAuthFailure {
            provider,
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::UpstreamQuotaExceeded {
            provider,
            retry_after_ms,
        },
        StatusCode::REQUEST_TIMEOUT => ProviderError::UpstreamTimeout {
            provider,
            timeout_ms: 0,
        },
        s if s.is_client_error() => ProviderError::UpstreamRejected {
            provider,
            status: s.as_u16(),
            message,
        },
        s => ProviderError::UpstreamUnavailable {
            provider,
            status: Some(s.as_u16()),
            message,
        },
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as u64)
}

impl std::fmt::Debug for AzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClient")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_status_mapping() {
        let msg = || "boom".to_string();
        assert!(matches!(
            map_status("azure-text", StatusCode::UNAUTHORIZED, None, msg()),
            ProviderError::UpstreamAuthFailure { status: 401, .. }
        ));
        assert!(matches!(
            map_status("azure-text", StatusCode::FORBIDDEN, None, msg()),
            ProviderError::UpstreamAuthFailure { status: 403, .. }
        ));
        assert!(matches!(
            map_status("azure-text", StatusCode::TOO_MANY_REQUESTS, Some(2000), msg()),
            ProviderError::UpstreamQuotaExceeded { retry_after_ms: Some(2000), .. }
        ));
        assert!(matches!(
            map_status("azure-text", StatusCode::BAD_REQUEST, None, msg()),
            ProviderError::UpstreamRejected { status: 400, .. }
        ));
        assert!(matches!(
            map_status("azure-text", StatusCode::SERVICE_UNAVAILABLE, None, msg()),
            ProviderError::UpstreamUnavailable { status: Some(503), .. }
        ));
        assert!(matches!(
            map_status("azure-text", StatusCode::REQUEST_TIMEOUT, None, msg()),
            ProviderError::UpstreamTimeout { .. }
        ));
    }

    #[test]
    fn test_every_mapped_status_is_fallback_eligible() {
        for code in [400u16, 401, 403, 404, 408, 413, 415, 429, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(map_status("azure-vision", status, None, String::new()).is_fallback_eligible());
        }
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after_ms(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after_ms(&headers), Some(1500));
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after_ms(&headers), None);
    }

    #[test]
    fn test_debug_redacts_key() -> Result<(), ProviderError> {
        let client = AzureClient::new(
            "azure-text",
            "https://example.cognitiveservices.azure.com/",
            "super-secret",
            Duration::from_secs(1),
        )?;
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert_eq!(
            client.url("/text/analytics/v3.1/sentiment"),
            "https://example.cognitiveservices.azure.com/text/analytics/v3.1/sentiment"
        );
        Ok(())
    }
}
