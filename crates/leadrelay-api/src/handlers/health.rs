//! Health check handlers for service monitoring.
//!
//! The relay has no database; its health is the CRM path. An open circuit
//! breaker or a backed-up fallback queue reports the service as degraded.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use leadrelay_delivery::CircuitState;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{state::RelayCounters, AppState};

/// Health check response structure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Service version
    pub version: String,
    /// Component checks
    pub checks: HealthChecks,
    /// Inbound request counters
    pub metrics: RelayCounters,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// CRM delivery impaired; leads are still accepted
    Degraded,
}

/// Component-level results.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    /// Breaker position for the CRM destination
    pub circuit_breaker: CircuitState,
    /// Deliveries waiting for reprocessing
    pub queue_size: usize,
    /// Whether leads are forwarded at all
    pub forwarding: bool,
}

/// `GET /health`.
///
/// Always answers 200 while the process is serving; `status` carries the
/// degraded signal.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let circuit_breaker = state.engine.circuit_state().await;
    let queue_size = state.engine.queue_size().await;

    let status = if circuit_breaker == CircuitState::Open || queue_size > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let response = HealthResponse {
        status,
        timestamp: state.clock.now_utc(),
        uptime_seconds: state.uptime().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            circuit_breaker,
            queue_size,
            forwarding: state.forwarding_enabled(),
        },
        metrics: state.stats.snapshot().await,
    };

    debug!(status = ?response.status, circuit = %circuit_breaker, queue_size, "health check completed");

    (StatusCode::OK, Json(response)).into_response()
}
