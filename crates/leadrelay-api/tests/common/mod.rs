//! Shared fixtures for relay API tests.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use leadrelay_api::{create_router, AppState, RelaySettings};
use leadrelay_core::TestClock;
use leadrelay_delivery::{
    fast_policy, DeliveryClient, EngineConfig, HttpClientConfig, HttpDeliveryClient, RetryEngine,
};
use leadrelay_mapping::FieldMapper;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::MockServer;

/// Bearer token accepted by the operator routes in [`settings`].
pub const ADMIN_TOKEN: &str = "ops-token";

/// Default settings plus the admin token.
pub fn settings() -> RelaySettings {
    RelaySettings { admin_token: Some(ADMIN_TOKEN.to_string()), ..RelaySettings::default() }
}

/// Relay wired to a test clock; `client` is the CRM destination.
pub struct TestRelay {
    pub app: Router,
    pub state: AppState,
    pub clock: TestClock,
}

impl TestRelay {
    pub fn new(client: Option<Arc<dyn DeliveryClient>>) -> Self {
        Self::with(client, settings(), engine_config())
    }

    pub fn with(
        client: Option<Arc<dyn DeliveryClient>>,
        settings: RelaySettings,
        config: EngineConfig,
    ) -> Self {
        let clock = TestClock::new();
        let engine = RetryEngine::with_clock(config, Arc::new(clock.clone())).unwrap();
        let state = AppState::new(
            FieldMapper::new(),
            engine,
            client,
            settings,
            Arc::new(clock.clone()),
        );
        Self { app: create_router(state.clone()), state, clock }
    }

    /// Relay forwarding to `{server}/crm`.
    pub fn forwarding_to(server: &MockServer) -> Self {
        Self::new(Some(crm_client(server)))
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(post_json(uri, body)).await;
        (status, body)
    }

    /// Calls an operator route with the admin token.
    pub async fn admin(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }
}

/// Engine settings with millisecond backoff and no queue pause.
pub fn engine_config() -> EngineConfig {
    EngineConfig { retry: fast_policy(), queue_item_delay: Duration::ZERO, ..EngineConfig::default() }
}

pub fn crm_client(server: &MockServer) -> Arc<dyn DeliveryClient> {
    let client = HttpDeliveryClient::new(HttpClientConfig::new(format!("{}/crm", server.uri())));
    Arc::new(client.unwrap())
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A website lead that maps cleanly.
pub fn valid_lead() -> Value {
    json!({
        "first_name": "Jane",
        "last_name": "Roe",
        "email": "jane.roe@example.com",
        "phone": "555-123-4567",
        "address": "12 Oak St",
        "state": "Texas",
        "message": "Roof leak over the kitchen after last night's storm, please call."
    })
}
