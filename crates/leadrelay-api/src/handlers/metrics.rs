//! Relay and delivery metrics.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use leadrelay_delivery::MetricsSnapshot;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{state::RelayCounters, AppState};

/// Combined metrics report.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    /// Inbound request counters
    pub server: RelayCounters,
    /// CRM delivery counters, queue and breaker state
    pub delivery: MetricsSnapshot,
}

/// `GET /metrics`.
#[instrument(name = "get_metrics", skip(state))]
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    let response = MetricsResponse {
        server: state.stats.snapshot().await,
        delivery: state.engine.metrics().await,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// `POST /metrics/reset`: zeroes relay and delivery counters.
///
/// The fallback queue and the breaker are left as they are.
#[instrument(name = "reset_metrics", skip(state))]
pub async fn reset_metrics(State(state): State<AppState>) -> Response {
    state.stats.reset(state.clock.now_utc()).await;
    state.engine.reset_metrics().await;
    info!("metrics reset");

    let response = MetricsResponse {
        server: state.stats.snapshot().await,
        delivery: state.engine.metrics().await,
    };
    (StatusCode::OK, Json(response)).into_response()
}
