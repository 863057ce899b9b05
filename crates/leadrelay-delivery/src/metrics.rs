//! Delivery counters and their reporting snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{circuit::CircuitState, error::ErrorKind};

/// Counters accumulated since the last reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMetrics {
    /// Deliveries that reached the retry loop.
    pub total_requests: u64,
    /// Deliveries that eventually succeeded.
    pub successful_requests: u64,
    /// Deliveries that exhausted retries or hit a non-retryable error.
    pub failed_requests: u64,
    /// Successful deliveries that needed more than one attempt.
    pub retried_requests: u64,
    /// Failed attempts by error code.
    pub error_type_counts: BTreeMap<String, u64>,
    /// Start of the measurement window.
    pub last_reset: DateTime<Utc>,
}

impl DeliveryMetrics {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            retried_requests: 0,
            error_type_counts: BTreeMap::new(),
            last_reset: now,
        }
    }

    pub(crate) fn record_error(&mut self, kind: &ErrorKind) {
        *self.error_type_counts.entry(kind.to_string()).or_default() += 1;
    }

    /// Successful deliveries as a percentage of total.
    pub fn success_rate(&self) -> f64 {
        percentage(self.successful_requests, self.total_requests)
    }

    /// Retried deliveries as a percentage of total.
    pub fn retry_rate(&self) -> f64 {
        percentage(self.retried_requests, self.total_requests)
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Metrics as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Raw counters.
    #[serde(flatten)]
    pub counters: DeliveryMetrics,
    /// Percentage of deliveries that succeeded, two decimals.
    pub success_rate: f64,
    /// Percentage of deliveries that needed retries, two decimals.
    pub retry_rate: f64,
    /// Deliveries waiting in the fallback queue.
    pub queue_size: usize,
    /// Breaker position.
    pub circuit_breaker_status: CircuitState,
    /// Milliseconds since the last reset.
    pub window_ms: u64,
}

impl MetricsSnapshot {
    pub(crate) fn new(
        counters: DeliveryMetrics,
        queue_size: usize,
        circuit_breaker_status: CircuitState,
        now: DateTime<Utc>,
    ) -> Self {
        let window_ms = u64::try_from((now - counters.last_reset).num_milliseconds()).unwrap_or(0);
        Self {
            success_rate: counters.success_rate(),
            retry_rate: counters.retry_rate(),
            counters,
            queue_size,
            circuit_breaker_status,
            window_ms,
        }
    }
}
