//! Operational endpoint tests: health, metrics, schema, queue and fallback.

#![allow(clippy::unwrap_used)]

mod common;

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{engine_config, valid_lead, TestRelay};
use leadrelay_api::RelaySettings;
use leadrelay_delivery::{AttemptOptions, CircuitState, DeliveryClient, DeliveryError};
use serde_json::{json, Value};
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn health_reports_healthy_then_degraded() {
    let relay = TestRelay::new(None);
    relay.clock.advance(Duration::from_secs(42));

    let (status, body) = relay.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["uptimeSeconds"], 42);
    assert_eq!(body["checks"]["circuitBreaker"], "CLOSED");
    assert_eq!(body["checks"]["forwarding"], false);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    relay.state.engine.circuit_breaker().force_state(CircuitState::Open).await;

    let (status, body) = relay.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["circuitBreaker"], "OPEN");
}

#[tokio::test]
async fn metrics_combine_server_and_delivery() {
    let client: Arc<dyn DeliveryClient> = Arc::new(|_payload: Value, _options: AttemptOptions| async {
        Ok::<_, DeliveryError>(json!({ "id": 7 }))
    });
    let relay = TestRelay::new(Some(client));

    relay.post("/webhook/yelp", &valid_lead()).await;
    relay.post("/webhook/yelp", &valid_lead()).await;
    relay.post("/webhook/google", &valid_lead()).await;

    let (status, body) = relay.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"]["totalRequests"], 3);
    assert_eq!(body["server"]["bySource"], json!({ "google": 1, "yelp": 2 }));
    assert_eq!(body["delivery"]["totalRequests"], 3);
    assert_eq!(body["delivery"]["successRate"], 100.0);
    assert_eq!(body["delivery"]["queueSize"], 0);
    assert_eq!(body["delivery"]["circuitBreakerStatus"], "CLOSED");
}

#[tokio::test]
async fn metrics_reset_zeroes_counters() {
    let relay = TestRelay::new(None);
    relay.post("/webhook/website", &valid_lead()).await;

    let (status, body) = relay.admin("POST", "/metrics/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"]["totalRequests"], 0);
    assert_eq!(body["delivery"]["totalRequests"], 0);

    let (_, body) = relay.get("/metrics").await;
    assert_eq!(body["server"]["bySource"], json!({}));
}

#[tokio::test]
async fn schema_lists_rule_categories() {
    let relay = TestRelay::new(None);

    let (status, body) = relay.get("/schema").await;

    assert_eq!(status, StatusCode::OK);
    for category in ["contact", "address", "roofing", "service", "attribution", "additional"] {
        assert!(body["categories"].get(category).is_some(), "missing {category}");
    }
    assert_eq!(body["categories"]["contact"]["fields"]["email"]["required"], true);
}

#[tokio::test]
async fn queued_lead_is_redelivered_on_demand() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(4)
        .mount(&server)
        .await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    let relay = TestRelay::forwarding_to(&server);

    let (status, _) = relay.post("/webhook/website", &valid_lead()).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, health) = relay.get("/health").await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["checks"]["queueSize"], 1);

    let (status, body) = relay.admin("POST", "/queue/process").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["delivered"], 1);
    assert_eq!(body["remaining"], 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn queue_can_be_cleared() {
    let client: Arc<dyn DeliveryClient> = Arc::new(|_payload: Value, _options: AttemptOptions| async {
        Err::<Value, _>(DeliveryError::network("connection refused"))
    });
    let relay = TestRelay::new(Some(client));
    relay.post("/webhook/website", &valid_lead()).await;
    relay.post("/webhook/website", &valid_lead()).await;
    assert_eq!(relay.state.engine.queue_size().await, 2);

    let (status, body) = relay.admin("DELETE", "/queue").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert_eq!(relay.state.engine.queue_size().await, 0);
}

#[tokio::test]
async fn queue_processing_needs_a_crm() {
    let relay = TestRelay::new(None);

    let (status, body) = relay.admin("POST", "/queue/process").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "E3001");
}

#[tokio::test]
async fn operator_routes_require_admin_token() {
    let relay = TestRelay::new(None);
    relay.post("/webhook/website", &valid_lead()).await;

    let routes = [("POST", "/metrics/reset"), ("DELETE", "/queue"), ("POST", "/queue/process")];
    for (method, uri) in routes {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = relay.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["error"]["code"], "E1007");

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", "Bearer wrong-token")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = relay.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
    }

    let (_, metrics) = relay.get("/metrics").await;
    assert_eq!(metrics["server"]["totalRequests"], 1);

    let (status, _) = relay.admin("POST", "/metrics/reset").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = relay.admin("DELETE", "/queue").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
}

#[tokio::test]
async fn operator_routes_closed_without_configured_token() {
    let relay = TestRelay::with(None, RelaySettings::default(), engine_config());

    let (status, body) = relay.admin("DELETE", "/queue").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E1007");
}

#[tokio::test]
async fn unknown_route_lists_endpoints() {
    let relay = TestRelay::new(None);

    let (status, body) = relay.get("/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"].as_str().unwrap().contains("POST /webhook/{source}"));
}
