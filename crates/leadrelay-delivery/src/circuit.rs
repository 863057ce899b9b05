//! Circuit breaker guarding the CRM destination.
//!
//! ```text
//!   ┌──────────────┐  failures >= threshold   ┌──────────────┐
//!   │    CLOSED    │ ───────────────────────▶ │     OPEN     │
//!   │ calls flow   │                          │ calls short- │
//!   │              │ ◀─────────────────────── │ circuit      │
//!   └──────────────┘  success, or first call  └──────────────┘
//!                     after cooldown
//! ```
//!
//! There is no half-open probing: once the cooldown has elapsed the next
//! call resets the breaker and proceeds normally.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use leadrelay_core::Clock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open after the last failure that opened
    /// it.
    pub cooldown: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown: Duration::from_secs(60) }
    }
}

impl CircuitConfig {
    /// Checks that the breaker can ever open.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCircuit`] for a zero threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidCircuit(
                "failure threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected without reaching the destination.
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
        }
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitStats {
    /// Current position.
    pub state: CircuitState,
    /// Failures recorded since the last reset.
    pub failure_count: u32,
    /// When the breaker last opened or was refreshed while open.
    pub last_failure_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerState {
    is_open: bool,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

impl BreakerState {
    const fn closed() -> Self {
        Self { is_open: false, failure_count: 0, last_failure_at: None }
    }
}

/// Single-destination circuit breaker shared by every delivery flow of an
/// engine.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    state: Mutex<BreakerState>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(config: CircuitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, state: Mutex::new(BreakerState::closed()), clock }
    }

    /// Breaker thresholds.
    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Whether a call may proceed.
    ///
    /// An open breaker whose cooldown has elapsed is reset here, so the call
    /// that observes the elapsed cooldown is allowed through.
    pub async fn should_allow_request(&self) -> bool {
        let mut state = self.state.lock().await;
        if !state.is_open {
            return true;
        }

        let cooled_down = state
            .last_failure_at
            .map_or(true, |at| self.clock.now().saturating_duration_since(at) >= self.config.cooldown);

        if cooled_down {
            *state = BreakerState::closed();
            info!("circuit breaker cooldown elapsed, closing");
        }
        cooled_down
    }

    /// Counts a failed attempt, opening the breaker at the threshold.
    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.failure_count = state.failure_count.saturating_add(1);

        if state.failure_count >= self.config.failure_threshold {
            if !state.is_open {
                warn!(
                    failure_count = state.failure_count,
                    cooldown_ms = u64::try_from(self.config.cooldown.as_millis()).unwrap_or(u64::MAX),
                    "circuit breaker opened"
                );
            }
            state.is_open = true;
            state.last_failure_at = Some(self.clock.now());
        }
    }

    /// Resets the breaker after a successful delivery.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.is_open || state.failure_count > 0 {
            if state.is_open {
                info!("circuit breaker closed after successful delivery");
            }
            *state = BreakerState::closed();
        }
    }

    /// Current position without applying the cooldown.
    pub async fn state(&self) -> CircuitState {
        if self.state.lock().await.is_open {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Point-in-time statistics.
    pub async fn stats(&self) -> CircuitStats {
        let state = self.state.lock().await;
        CircuitStats {
            state: if state.is_open { CircuitState::Open } else { CircuitState::Closed },
            failure_count: state.failure_count,
            last_failure_at: state.last_failure_at,
        }
    }

    /// Forces the breaker into `target` (for operators and tests).
    pub async fn force_state(&self, target: CircuitState) {
        let mut state = self.state.lock().await;
        match target {
            CircuitState::Closed => *state = BreakerState::closed(),
            CircuitState::Open => {
                state.is_open = true;
                state.failure_count = state.failure_count.max(self.config.failure_threshold);
                state.last_failure_at = Some(self.clock.now());
            },
        }
    }
}
