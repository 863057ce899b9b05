//! Fixtures for end-to-end relay tests.
//!
//! Relays are built the way the binary builds them, from a [`Config`], with
//! the CRM pointed at a wiremock server and backoff shortened to milliseconds.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use leadrelay_api::{create_router, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::MockServer;

/// Admin token set by [`config_for`] and sent by [`Relay::request`].
pub const ADMIN_TOKEN: &str = "ops-token";

/// Relay configuration forwarding to `{server}/crm` with fast retries.
pub fn config_for(server: &MockServer) -> Config {
    Config {
        crm_webhook_url: Some(format!("{}/crm", server.uri())),
        retry_base_delay_ms: 5,
        retry_max_delay_ms: 20,
        retry_jitter_factor: 0.0,
        queue_item_delay_ms: 0,
        admin_token: Some(ADMIN_TOKEN.to_string()),
        ..Config::default()
    }
}

pub struct Relay {
    pub app: Router,
    pub state: AppState,
}

impl Relay {
    pub fn from_config(config: &Config) -> Self {
        let state = AppState::from_config(config).unwrap();
        Self { app: create_router(state.clone()), state }
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<&Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"));
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    pub async fn submit(&self, source: &str, lead: &Value) -> (StatusCode, Value) {
        self.request("POST", &format!("/webhook/{source}"), Some(lead)).await
    }
}

/// A lead that maps cleanly, numbered so concurrent submissions differ.
pub fn lead(n: usize) -> Value {
    json!({
        "fname": format!("Lead{n}"),
        "lname": "Tester",
        "email": format!("lead{n}@example.com"),
        "phone_number": format!("512-555-{:04}", n % 10_000),
        "service_type": "repair",
        "city": "Austin",
        "state": "texas",
        "zip": "78701"
    })
}
