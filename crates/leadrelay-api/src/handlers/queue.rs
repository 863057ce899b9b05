//! Fallback queue operations.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use leadrelay_core::RelayError;
use leadrelay_delivery::DeliveryOutcome;
use serde::Serialize;
use tracing::{info, instrument};

use super::create_error_response;
use crate::AppState;

/// Result of one queue pass.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProcessResponse {
    /// Items taken from the queue
    pub processed: usize,
    /// Items delivered on this pass
    pub delivered: usize,
    /// Items still waiting afterwards
    pub remaining: usize,
    /// Per-item outcomes, in queue order
    pub outcomes: Vec<DeliveryOutcome>,
}

/// `POST /queue/process`: redelivers every queued lead once.
#[instrument(name = "process_queue", skip(state))]
pub async fn process_queue(State(state): State<AppState>) -> Response {
    let Some(client) = state.crm_client.as_ref() else {
        let error = RelayError::Configuration("no CRM webhook URL configured".into());
        return create_error_response(StatusCode::SERVICE_UNAVAILABLE, error.code(), error.to_string());
    };

    let outcomes = state.engine.process_error_queue(client.as_ref()).await;
    let delivered = outcomes.iter().filter(|outcome| outcome.is_success()).count();
    let response = QueueProcessResponse {
        processed: outcomes.len(),
        delivered,
        remaining: state.engine.queue_size().await,
        outcomes,
    };
    info!(processed = response.processed, delivered, remaining = response.remaining, "queue processed");

    (StatusCode::OK, Json(response)).into_response()
}

/// `DELETE /queue`: drops every queued lead.
#[instrument(name = "clear_queue", skip(state))]
pub async fn clear_queue(State(state): State<AppState>) -> Response {
    let removed = state.engine.clear_error_queue().await;
    (StatusCode::OK, Json(serde_json::json!({ "removed": removed }))).into_response()
}
