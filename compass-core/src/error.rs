//! Error types for Compass operations

use thiserror::Error;

/// Errors produced by an analysis provider, real or simulated.
///
/// Every `Upstream*` variant is absorbed by the orchestrator and turned into a
/// simulator-backed result. Only `InvalidInput` and `SimulatorFailure` ever
/// reach a caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    UpstreamTimeout { provider: String, timeout_ms: u64 },

    #[error("Authentication with {provider} failed (status {status})")]
    UpstreamAuthFailure { provider: String, status: u16 },

    #[error("Quota exceeded at {provider}, retry after {retry_after_ms:?}ms")]
    UpstreamQuotaExceeded {
        provider: String,
        retry_after_ms: Option<u64>,
    },

    #[error("{provider} unavailable (status {status:?}): {message}")]
    UpstreamUnavailable {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} rejected the request with status {status}: {message}")]
    UpstreamRejected {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    UpstreamInvalidResponse { provider: String, message: String },

    #[error("Simulator failed: {reason}")]
    SimulatorFailure { reason: String },
}

impl ProviderError {
    /// Shorthand for an `InvalidInput` error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Whether the orchestrator may answer this failure with the simulator.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(
            self,
            Self::InvalidInput { .. } | Self::SimulatorFailure { .. }
        )
    }

    /// Stable label used for metric tags and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::UpstreamTimeout { .. } => "timeout",
            Self::UpstreamAuthFailure { .. } => "auth_failure",
            Self::UpstreamQuotaExceeded { .. } => "quota_exceeded",
            Self::UpstreamUnavailable { .. } => "unavailable",
            Self::UpstreamRejected { .. } => "rejected",
            Self::UpstreamInvalidResponse { .. } => "invalid_response",
            Self::SimulatorFailure { .. } => "simulator_failure",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },
}

/// Master error type for all Compass errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompassError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Compass operations.
pub type CompassResult<T> = Result<T, CompassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_are_fallback_eligible() {
        let upstream = [
            ProviderError::UpstreamTimeout {
                provider: "azure-vision".into(),
                timeout_ms: 5000,
            },
            ProviderError::UpstreamAuthFailure {
                provider: "azure-vision".into(),
                status: 401,
            },
            ProviderError::UpstreamQuotaExceeded {
                provider: "azure-text".into(),
                retry_after_ms: Some(1000),
            },
            ProviderError::UpstreamUnavailable {
                provider: "azure-text".into(),
                status: Some(503),
                message: "maintenance".into(),
            },
            ProviderError::UpstreamRejected {
                provider: "azure-text".into(),
                status: 400,
                message: "bad document".into(),
            },
            ProviderError::UpstreamInvalidResponse {
                provider: "azure-text".into(),
                message: "missing documents".into(),
            },
        ];
        for err in upstream {
            assert!(err.is_fallback_eligible(), "{} should fall back", err.kind());
        }
    }

    #[test]
    fn test_terminal_errors_are_not_fallback_eligible() {
        assert!(!ProviderError::invalid_input("empty text").is_fallback_eligible());
        assert!(!ProviderError::SimulatorFailure {
            reason: "bad input".into()
        }
        .is_fallback_eligible());
    }

    #[test]
    fn test_compass_error_from_provider() {
        let err: CompassError = ProviderError::invalid_input("x").into();
        assert!(matches!(err, CompassError::Provider(_)));
        assert!(err.to_string().contains("Invalid input"));
    }
}
