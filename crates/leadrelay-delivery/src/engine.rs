//! Retry engine orchestrating CRM delivery.
//!
//! One engine guards one destination. Every delivery flow shares its circuit
//! breaker, metrics and fallback queue, so concurrent callers see a single
//! view of destination health.
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌────────────────┐
//! │ execute_with │──▶│ CircuitBreaker │──▶│ DeliveryClient │
//! │ _retry       │   └────────────────┘   └────────────────┘
//! └──────────────┘            │                    │
//!        │                    ▼                    ▼
//!        ▼             ┌─────────────┐      ┌─────────────┐
//! ┌──────────────┐     │ RetryPolicy │      │ ErrorKind   │
//! │ ErrorQueue   │◀────│ backoff     │◀─────│ classify    │
//! └──────────────┘     └─────────────┘      └─────────────┘
//! ```
//!
//! Attempts for one payload run sequentially. Each attempt is bounded by
//! [`RetryPolicy::attempt_timeout`]; there is no cancellation of a delivery
//! flow once started.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use leadrelay_core::{Clock, RealClock};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    circuit::{CircuitBreaker, CircuitConfig, CircuitState},
    client::{AttemptOptions, DeliveryClient},
    error::{ConfigError, DeliveryError, ErrorKind},
    metrics::{DeliveryMetrics, MetricsSnapshot},
    queue::{ErrorQueue, QueuedDelivery, DEFAULT_MAX_QUEUE_SIZE},
    retry::RetryPolicy,
};

/// Reason attached to queued deliveries dropped after too many passes.
const QUEUE_RETRIES_EXCEEDED: &str = "Max queue retries exceeded";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Backoff and retry eligibility.
    pub retry: RetryPolicy,
    /// Breaker thresholds.
    pub circuit: CircuitConfig,
    /// Whether exhausted deliveries are kept for reprocessing.
    pub fallback_queue: bool,
    /// Queue passes before a delivery is dropped.
    pub max_queue_retries: u32,
    /// Largest fallback queue; the oldest item is dropped beyond it.
    pub max_queue_size: usize,
    /// Pause between items while processing the queue.
    pub queue_item_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            circuit: CircuitConfig::default(),
            fallback_queue: true,
            max_queue_retries: 3,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            queue_item_delay: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Validates the retry policy, breaker thresholds and queue bound.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.circuit.validate()?;
        if self.max_queue_size == 0 {
            return Err(ConfigError::InvalidQueue("max queue size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Classified failure reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailure {
    /// Error code, e.g. `503_SERVER_ERROR`.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Whether the policy considered this failure retryable.
    pub retryable: bool,
    /// HTTP status, when the destination answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl DeliveryFailure {
    fn from_error(error: &DeliveryError, kind: ErrorKind, retryable: bool) -> Self {
        Self { kind, message: error.to_string(), retryable, status_code: error.status_code() }
    }

    fn circuit_open() -> Self {
        Self {
            kind: ErrorKind::CircuitBreakerOpen,
            message: "Circuit breaker is open, delivery skipped".to_string(),
            retryable: false,
            status_code: None,
        }
    }

    fn queue_exhausted(previous: &DeliveryFailure) -> Self {
        Self {
            kind: ErrorKind::QueueRetriesExhausted,
            message: format!("{QUEUE_RETRIES_EXCEEDED}: {}", previous.message),
            retryable: false,
            status_code: previous.status_code,
        }
    }
}

/// Result of a delivery flow. Always returned, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// The destination accepted the payload.
    #[serde(rename_all = "camelCase")]
    Delivered {
        /// Decoded response body.
        data: Value,
        /// Attempts made, including the successful one.
        attempts: u32,
        /// Time from the first attempt to the result.
        #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
        duration: Duration,
        /// When the result was produced.
        timestamp: DateTime<Utc>,
    },
    /// Delivery gave up.
    #[serde(rename_all = "camelCase")]
    Failed {
        /// Last classified failure.
        error: DeliveryFailure,
        /// Attempts made; zero when short-circuited.
        attempts: u32,
        /// Time from the first attempt to the result.
        #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
        duration: Duration,
        /// When the result was produced.
        timestamp: DateTime<Utc>,
        /// Whether the payload now waits in the fallback queue.
        queued: bool,
    },
}

impl DeliveryOutcome {
    /// Whether the payload was delivered.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// Elapsed time of the flow.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Delivered { duration, .. } | Self::Failed { duration, .. } => *duration,
        }
    }

    /// Failure details, if delivery failed.
    pub fn failure(&self) -> Option<&DeliveryFailure> {
        match self {
            Self::Delivered { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Whether a failed payload was placed in the fallback queue.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Failed { queued: true, .. })
    }

    fn set_queued(&mut self) {
        if let Self::Failed { queued, .. } = self {
            *queued = true;
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Retrying CRM delivery with a circuit breaker, metrics and fallback queue.
#[derive(Debug)]
pub struct RetryEngine {
    config: EngineConfig,
    circuit: CircuitBreaker,
    metrics: Mutex<DeliveryMetrics>,
    queue: Mutex<ErrorQueue>,
    clock: Arc<dyn Clock>,
}

impl RetryEngine {
    /// Creates an engine on the real clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(RealClock::new()))
    }

    /// Creates an engine on `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let circuit = CircuitBreaker::new(config.circuit.clone(), clock.clone());
        let metrics = Mutex::new(DeliveryMetrics::new(clock.now_utc()));

        let queue = Mutex::new(ErrorQueue::new(config.max_queue_size));

        Ok(Self { config, circuit, metrics, queue, clock })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared circuit breaker.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit
    }

    /// Delivers `payload` with retries.
    ///
    /// A failed delivery is queued when the fallback queue is enabled, unless
    /// it was short-circuited by the open breaker.
    pub async fn execute_with_retry<C>(&self, client: &C, payload: &Value) -> DeliveryOutcome
    where
        C: DeliveryClient + ?Sized,
    {
        self.execute_with_options(client, payload, BTreeMap::new()).await
    }

    /// Delivers `payload` with retries, passing `headers` to every attempt.
    pub async fn execute_with_options<C>(
        &self,
        client: &C,
        payload: &Value,
        headers: BTreeMap<String, String>,
    ) -> DeliveryOutcome
    where
        C: DeliveryClient + ?Sized,
    {
        let mut outcome = self.run(client, payload, &headers).await;

        if let DeliveryOutcome::Failed { error, .. } = &outcome {
            if self.config.fallback_queue && error.kind != ErrorKind::CircuitBreakerOpen {
                let item = QueuedDelivery {
                    payload: payload.clone(),
                    error: error.clone(),
                    timestamp: self.clock.now_utc(),
                    retry_count: 0,
                };
                self.enqueue(item).await;
                outcome.set_queued();
            }
        }

        outcome
    }

    /// Runs one delivery flow without touching the queue.
    async fn run<C>(
        &self,
        client: &C,
        payload: &Value,
        headers: &BTreeMap<String, String>,
    ) -> DeliveryOutcome
    where
        C: DeliveryClient + ?Sized,
    {
        if !self.circuit.should_allow_request().await {
            warn!("circuit breaker open, skipping delivery");
            return DeliveryOutcome::Failed {
                error: DeliveryFailure::circuit_open(),
                attempts: 0,
                duration: Duration::ZERO,
                timestamp: self.clock.now_utc(),
                queued: false,
            };
        }

        let max_retries = self.config.retry.max_retries;
        let span = info_span!("delivery", max_retries);
        self.attempt_loop(client, payload, headers).instrument(span).await
    }

    async fn attempt_loop<C>(
        &self,
        client: &C,
        payload: &Value,
        headers: &BTreeMap<String, String>,
    ) -> DeliveryOutcome
    where
        C: DeliveryClient + ?Sized,
    {
        let policy = &self.config.retry;
        let started = self.clock.now();
        self.metrics.lock().await.total_requests += 1;

        let mut attempt = 0;
        let failure = loop {
            let timeout = RetryPolicy::attempt_timeout(attempt);
            let options = AttemptOptions { attempt, timeout, headers: headers.clone() };

            debug!(attempt, timeout = ?timeout, "attempting delivery");

            let result = match tokio::time::timeout(timeout, client.deliver(payload, options)).await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::timeout(timeout)),
            };

            match result {
                Ok(data) => {
                    {
                        let mut metrics = self.metrics.lock().await;
                        metrics.successful_requests += 1;
                        if attempt > 0 {
                            metrics.retried_requests += 1;
                        }
                    }
                    self.circuit.record_success().await;

                    let attempts = attempt + 1;
                    info!(attempts, "delivery succeeded");
                    return DeliveryOutcome::Delivered {
                        data,
                        attempts,
                        duration: self.clock.now().saturating_duration_since(started),
                        timestamp: self.clock.now_utc(),
                    };
                },
                Err(err) => {
                    let kind = ErrorKind::classify(&err);
                    let retryable = policy.is_retryable(&kind);
                    self.metrics.lock().await.record_error(&kind);

                    warn!(attempt, error_kind = %kind, retryable, error = %err, "delivery attempt failed");

                    let failure = DeliveryFailure::from_error(&err, kind, retryable);
                    if !retryable || attempt >= policy.max_retries {
                        break failure;
                    }

                    self.circuit.record_failure().await;

                    let delay = policy.backoff_delay(attempt);
                    debug!(attempt, delay = ?delay, "backing off before retry");
                    self.clock.sleep(delay).await;
                    attempt += 1;
                },
            }
        };

        self.metrics.lock().await.failed_requests += 1;

        let attempts = attempt + 1;
        error!(attempts, error_kind = %failure.kind, "delivery failed");
        DeliveryOutcome::Failed {
            error: failure,
            attempts,
            duration: self.clock.now().saturating_duration_since(started),
            timestamp: self.clock.now_utc(),
            queued: false,
        }
    }

    /// Delivers each payload in order with `pause` between items.
    ///
    /// Items share the engine's breaker and metrics, so an opened breaker
    /// short-circuits the rest of the batch.
    pub async fn deliver_batch<C>(
        &self,
        client: &C,
        payloads: &[Value],
        pause: Duration,
    ) -> Vec<DeliveryOutcome>
    where
        C: DeliveryClient + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(payloads.len());
        for (index, payload) in payloads.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                self.clock.sleep(pause).await;
            }
            outcomes.push(self.execute_with_retry(client, payload).await);
        }
        outcomes
    }

    /// Drains the fallback queue and redelivers every item.
    ///
    /// Items still failing are queued again with their pass count bumped;
    /// an item that has already used its passes is dropped with a
    /// `MAX_QUEUE_RETRIES_EXCEEDED` result.
    pub async fn process_error_queue<C>(&self, client: &C) -> Vec<DeliveryOutcome>
    where
        C: DeliveryClient + ?Sized,
    {
        let items = self.queue.lock().await.drain();
        info!(items = items.len(), "processing error queue");

        let mut outcomes = Vec::with_capacity(items.len());
        for (index, mut item) in items.into_iter().enumerate() {
            if index > 0 && !self.config.queue_item_delay.is_zero() {
                self.clock.sleep(self.config.queue_item_delay).await;
            }

            item.retry_count += 1;
            if item.retry_count > self.config.max_queue_retries {
                warn!(retry_count = item.retry_count, "dropping queued delivery");
                outcomes.push(DeliveryOutcome::Failed {
                    error: DeliveryFailure::queue_exhausted(&item.error),
                    attempts: 0,
                    duration: Duration::ZERO,
                    timestamp: self.clock.now_utc(),
                    queued: false,
                });
                continue;
            }

            let mut outcome = self.run(client, &item.payload, &BTreeMap::new()).await;
            if let DeliveryOutcome::Failed { error, .. } = &outcome {
                item.error = error.clone();
                item.timestamp = self.clock.now_utc();
                self.enqueue(item).await;
                outcome.set_queued();
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn enqueue(&self, item: QueuedDelivery) {
        let mut queue = self.queue.lock().await;
        if let Some(evicted) = queue.push(item) {
            warn!(
                max_queue_size = queue.max_len(),
                queued_at = %evicted.timestamp,
                kind = %evicted.error.kind,
                "fallback queue full, dropped oldest delivery"
            );
        }
        debug!(queue_size = queue.len(), "delivery queued for reprocessing");
    }

    /// Empties the fallback queue, returning how many items were dropped.
    pub async fn clear_error_queue(&self) -> usize {
        let removed = self.queue.lock().await.clear();
        info!(removed, "error queue cleared");
        removed
    }

    /// Items waiting in the fallback queue.
    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Current breaker position.
    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit.state().await
    }

    /// Current counters with derived rates, queue size and breaker position.
    pub async fn metrics(&self) -> MetricsSnapshot {
        let counters = self.metrics.lock().await.clone();
        let queue_size = self.queue_size().await;
        let state = self.circuit_state().await;
        MetricsSnapshot::new(counters, queue_size, state, self.clock.now_utc())
    }

    /// Restarts the counters. The queue and the breaker are left alone.
    pub async fn reset_metrics(&self) {
        *self.metrics.lock().await = DeliveryMetrics::new(self.clock.now_utc());
        info!("delivery metrics reset");
    }
}

#[cfg(test)]
mod tests {
    use leadrelay_core::TestClock;
    use serde_json::json;

    use super::*;

    fn engine(config: EngineConfig) -> (RetryEngine, TestClock) {
        let clock = TestClock::new();
        let engine = RetryEngine::with_clock(config, Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    #[test]
    fn invalid_config_rejected() {
        let config = EngineConfig {
            circuit: CircuitConfig { failure_threshold: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(RetryEngine::new(config), Err(ConfigError::InvalidCircuit(_))));
    }

    #[tokio::test]
    async fn outcome_serializes_with_millis() {
        let (engine, _clock) = engine(EngineConfig::default());
        let client = |_: Value, _: AttemptOptions| async { Ok::<_, DeliveryError>(json!({ "id": "crm-1" })) };

        let outcome = engine.execute_with_retry(&client, &json!({})).await;
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["outcome"], "delivered");
        assert_eq!(value["attempts"], 1);
        assert_eq!(value["durationMs"], 0);
        assert_eq!(value["data"]["id"], "crm-1");
    }

    #[tokio::test]
    async fn failure_serializes_kind_as_type() {
        let (engine, _clock) = engine(EngineConfig { fallback_queue: false, ..Default::default() });
        let client =
            |_: Value, _: AttemptOptions| async { Err::<Value, _>(DeliveryError::http(401, "unauthorized")) };

        let outcome = engine.execute_with_retry(&client, &json!({})).await;
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["error"]["type"], "401_CLIENT_ERROR");
        assert_eq!(value["error"]["statusCode"], 401);
        assert_eq!(value["error"]["retryable"], false);
        assert_eq!(value["queued"], false);
    }

    #[tokio::test]
    async fn attempt_options_carry_timeout_and_headers() {
        let (engine, _clock) = engine(EngineConfig::default());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let client = {
            let seen = seen.clone();
            move |_: Value, options: AttemptOptions| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(options.clone());
                    if options.attempt == 0 {
                        Err(DeliveryError::network("reset"))
                    } else {
                        Ok(json!({}))
                    }
                }
            }
        };

        let headers = BTreeMap::from([("X-Source".to_string(), "yelp".to_string())]);
        let outcome = engine.execute_with_options(&client, &json!({}), headers.clone()).await;
        assert!(outcome.is_success());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].timeout, Duration::from_secs(10));
        assert_eq!(seen[1].timeout, Duration::from_secs(15));
        assert_eq!(seen[1].headers, headers);
    }
}
