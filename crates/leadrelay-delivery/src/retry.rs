//! Exponential backoff with jitter and per-attempt timeouts.
//!
//! Attempt `n` (zero-based) waits `base * exponential_base^n` before the
//! next attempt, randomized by up to `±jitter_factor` of that value and
//! capped at `max_delay`.

use std::{collections::BTreeSet, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ErrorKind};

/// Shortest per-attempt timeout.
pub const BASE_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra timeout granted per previous attempt.
pub const ATTEMPT_TIMEOUT_STEP: Duration = Duration::from_secs(5);

/// Longest per-attempt timeout.
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Retry policy for CRM delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is this plus one.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound on any delay.
    pub max_delay: Duration,

    /// Growth factor per attempt.
    pub exponential_base: f64,

    /// Jitter as a fraction of the unjittered delay (0.0 to 1.0).
    pub jitter_factor: f64,

    /// Kinds retried in addition to the default-retryable ones.
    pub retryable_kinds: BTreeSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter_factor: 0.1, // ±10% randomization
            retryable_kinds: BTreeSet::new(),
        }
    }
}

impl RetryPolicy {
    /// Checks that the policy values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPolicy`] for a growth factor below one,
    /// jitter outside `[0, 1]`, or a maximum delay shorter than the base.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.exponential_base.is_finite() || self.exponential_base < 1.0 {
            return Err(ConfigError::InvalidPolicy(format!(
                "exponential base must be at least 1.0, got {}",
                self.exponential_base
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidPolicy(format!(
                "jitter factor must be within 0.0..=1.0, got {}",
                self.jitter_factor
            )));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::InvalidPolicy(format!(
                "max delay {:?} is shorter than base delay {:?}",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }

    /// Whether a failure of this kind is retried: default-retryable kinds
    /// plus the allow-list.
    pub fn is_retryable(&self, kind: &ErrorKind) -> bool {
        kind.is_retryable_by_default() || self.retryable_kinds.contains(kind)
    }

    /// Delay after a failed `attempt`, ignoring jitter.
    pub fn unjittered_delay(&self, attempt: u32) -> Duration {
        self.backoff_delay_with(attempt, 0.0)
    }

    /// Delay after a failed `attempt` with a random jitter draw.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let unit = rand::rng().random_range(-1.0..=1.0);
        self.backoff_delay_with(attempt, unit)
    }

    /// Delay after a failed `attempt` with jitter scaled by `unit`, which is
    /// clamped to `[-1, 1]`.
    pub fn backoff_delay_with(&self, attempt: u32, unit: f64) -> Duration {
        let max_ms = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw_ms = self.base_delay.as_secs_f64() * 1000.0 * self.exponential_base.powi(exponent);

        if !raw_ms.is_finite() {
            return self.max_delay;
        }

        let jitter_ms = raw_ms * self.jitter_factor * unit.clamp(-1.0, 1.0);
        let delay_ms = (raw_ms + jitter_ms).min(max_ms).max(0.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay_ms = delay_ms.round() as u64;
        Duration::from_millis(delay_ms)
    }

    /// Timeout for `attempt`: ten seconds plus five per previous attempt,
    /// capped at one minute.
    pub fn attempt_timeout(attempt: u32) -> Duration {
        BASE_ATTEMPT_TIMEOUT
            .saturating_add(ATTEMPT_TIMEOUT_STEP.saturating_mul(attempt))
            .min(MAX_ATTEMPT_TIMEOUT)
    }
}

/// Policy that retries quickly, for tests and local development.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        jitter_factor: 0.0,
        ..RetryPolicy::default()
    }
}
