//! OpenTelemetry Tracer Initialization
//!
//! Sets up the tracing subscriber (JSON logs plus an OpenTelemetry layer) and,
//! when an endpoint is configured, an OTLP/HTTP span exporter.

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{env_flag, env_or};
use crate::error::{ApiError, ApiResult};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces (e.g., "http://localhost:4318/v1/traces")
    pub otlp_endpoint: Option<String>,
    /// Service name for traces
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Trace sampling ratio (0.0 to 1.0)
    pub trace_sample_rate: f64,
    /// Emit JSON log lines instead of the human-readable format
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: std::env::var("COMPASS_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            service_name: std::env::var("COMPASS_SERVICE_NAME")
                .unwrap_or_else(|_| "compass-api".to_string()),
            service_version: std::env::var("COMPASS_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            environment: std::env::var("COMPASS_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            trace_sample_rate: env_or("COMPASS_TRACE_SAMPLE_RATE", 1.0),
            json_logs: env_flag("COMPASS_JSON_LOGS", true),
        }
    }
}

impl TelemetryConfig {
    pub fn sampler(&self) -> Sampler {
        if self.trace_sample_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.trace_sample_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.trace_sample_rate)
        }
    }
}

/// Keeps the tracer provider alive; hand it back to [`shutdown_tracer`] on exit.
#[derive(Debug)]
pub struct TelemetryGuard {
    provider: SdkTracerProvider,
}

/// Initialize the OpenTelemetry tracer and tracing subscriber.
///
/// Call once at startup before any tracing occurs. Sets up:
/// - OTLP exporter for distributed traces (if endpoint configured)
/// - TraceContext propagation (W3C traceparent header)
/// - tracing-subscriber with an EnvFilter and the OpenTelemetry layer
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<TelemetryGuard> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new("deployment.environment", config.environment.clone()),
        ])
        .build();

    let mut builder = SdkTracerProvider::builder()
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource);

    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to create OTLP exporter: {}", e))
            })?;
        builder = builder.with_batch_exporter(exporter);
    }

    let provider = builder.build();
    let tracer = provider.tracer("compass-api");
    global::set_tracer_provider(provider.clone());

    let otel_layer = OpenTelemetryLayer::new(tracer);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("compass_api=debug,tower_http=debug,info"));

    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    let init = if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    init.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        environment = config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { provider })
}

/// Flush pending spans and shut the tracer provider down.
pub fn shutdown_tracer(guard: TelemetryGuard) {
    if let Err(e) = guard.provider.shutdown() {
        tracing::warn!(error = %e, "Tracer shutdown reported an error");
    }
    tracing::info!("Tracer shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_telemetry_config_default() {
        let _rate = EnvVarGuard::set("COMPASS_TRACE_SAMPLE_RATE", None);
        let _name = EnvVarGuard::set("COMPASS_SERVICE_NAME", None);
        let _endpoint = EnvVarGuard::set("COMPASS_OTLP_ENDPOINT", Some("  "));
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "compass-api");
        assert_eq!(config.trace_sample_rate, 1.0);
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn test_sampler_selection() {
        let config = |rate| TelemetryConfig {
            trace_sample_rate: rate,
            ..TelemetryConfig::default()
        };
        assert!(matches!(config(1.0).sampler(), Sampler::AlwaysOn));
        assert!(matches!(config(0.0).sampler(), Sampler::AlwaysOff));
        assert!(matches!(config(-2.0).sampler(), Sampler::AlwaysOff));
        assert!(matches!(
            config(0.25).sampler(),
            Sampler::TraceIdRatioBased(r) if (r - 0.25).abs() < f64::EPSILON
        ));
    }
}
