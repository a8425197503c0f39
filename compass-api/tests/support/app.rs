//! Shared in-process app harness for the API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use compass_api::{create_api_router, ApiConfig, AppState, AppStateConfig};
use compass_providers::{ProviderAdapter, SimulatorProvider};
use compass_test_utils::ScriptedProvider;
use serde_json::Value;
use tower::ServiceExt;

/// Config with the inbound flood guard off so tests can fire freely.
pub fn test_config() -> AppStateConfig {
    AppStateConfig {
        api: ApiConfig {
            rate_limit_enabled: false,
            ..ApiConfig::default()
        },
        ..AppStateConfig::default()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub real: Option<Arc<ScriptedProvider>>,
}

impl TestApp {
    pub fn simulator_only() -> Result<Self, String> {
        Self::build(None, test_config())
    }

    pub fn with_real(real: ScriptedProvider) -> Result<Self, String> {
        Self::build(Some(Arc::new(real)), test_config())
    }

    pub fn build(real: Option<Arc<ScriptedProvider>>, config: AppStateConfig) -> Result<Self, String> {
        let state = AppState::new(
            real.clone().map(|r| r as Arc<dyn ProviderAdapter>),
            Arc::new(SimulatorProvider::default()),
            config,
        );
        let router = create_api_router(state.clone()).map_err(|e| e.to_string())?;
        Ok(Self { state, router, real })
    }

    pub fn real_calls(&self) -> u64 {
        self.real.as_ref().map_or(0, |r| r.calls())
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), String> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| e.to_string())?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok((status, json))
    }

    pub async fn get(&self, uri: &str) -> Result<(StatusCode, Value), String> {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Result<(StatusCode, Value), String> {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Result<(StatusCode, Value), String> {
        self.send(Method::PUT, uri, Some(body)).await
    }
}
