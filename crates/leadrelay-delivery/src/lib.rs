//! CRM delivery with retries, a circuit breaker and a fallback queue.
//!
//! The engine wraps a caller-supplied [`DeliveryClient`] that performs one
//! attempt. Failures are classified into an [`ErrorKind`], which decides
//! whether the engine backs off and tries again. Deliveries that give up are
//! kept in an in-memory queue for later reprocessing.
//!
//! # Flow
//!
//! 1. **Circuit check** - an open breaker short-circuits the call
//! 2. **Attempt** - the client is invoked with a per-attempt timeout
//! 3. **Classify** - failures become an [`ErrorKind`] and are counted
//! 4. **Back off** - retryable failures wait with exponential backoff
//! 5. **Queue** - exhausted deliveries wait in the fallback queue
//!
//! # Example
//!
//! ```no_run
//! use leadrelay_delivery::{EngineConfig, HttpClientConfig, HttpDeliveryClient, RetryEngine};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), leadrelay_delivery::ConfigError> {
//! let engine = RetryEngine::new(EngineConfig::default())?;
//! let client = HttpDeliveryClient::new(HttpClientConfig::new("https://crm.example.com/hook"))?;
//!
//! let outcome = engine.execute_with_retry(&client, &json!({ "firstName": "Jane" })).await;
//! println!("delivered: {}, attempts: {}", outcome.is_success(), outcome.attempts());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod circuit;
pub mod client;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod retry;

pub use circuit::{CircuitBreaker, CircuitConfig, CircuitState, CircuitStats};
pub use client::{AttemptOptions, DeliveryClient, DeliveryFuture, HttpClientConfig, HttpDeliveryClient};
pub use engine::{DeliveryFailure, DeliveryOutcome, EngineConfig, RetryEngine};
pub use error::{ConfigError, DeliveryError, ErrorKind};
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use queue::{ErrorQueue, QueuedDelivery, DEFAULT_MAX_QUEUE_SIZE};
pub use retry::{fast_policy, RetryPolicy};
