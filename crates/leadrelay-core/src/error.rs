//! Relay error taxonomy with stable codes.
//!
//! These are the failures the relay surfaces to webhook callers. Per-field
//! mapping problems and individual delivery attempt failures have their own
//! types in the mapping and delivery crates; they only become a
//! `RelayError` once the relay decides to reject or fail a request.

use thiserror::Error;

/// Result type alias using `RelayError`.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay-level errors with codes for client disambiguation.
#[derive(Debug, Error)]
pub enum RelayError {
    // Request errors (E1001-E1007)
    /// HMAC signature missing or invalid (E1001).
    #[error("[E1001] Invalid signature: {reason}")]
    InvalidSignature {
        /// Why validation failed
        reason: String,
    },

    /// Request carried no usable payload (E1002).
    #[error("[E1002] Empty payload: request body contained no lead fields")]
    EmptyPayload,

    /// Mapped lead failed validation (E1003).
    #[error("[E1003] Validation failed: {error_count} field error(s)")]
    ValidationFailed {
        /// Number of field errors reported by the mapper
        error_count: usize,
    },

    /// Payload exceeds the configured size limit (E1004).
    #[error("[E1004] Payload too large: {size_bytes} bytes exceeds {limit_bytes} byte limit")]
    PayloadTooLarge {
        /// Size of the rejected payload
        size_bytes: usize,
        /// Configured limit
        limit_bytes: usize,
    },

    /// Body is not valid JSON (E1005).
    #[error("[E1005] Malformed payload: {reason}")]
    MalformedPayload {
        /// Parser message
        reason: String,
    },

    /// Caller exceeded the webhook rate limit (E1006).
    #[error("[E1006] Rate limit exceeded: retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the caller may send again
        retry_after_secs: u64,
    },

    /// Operator route called without valid credentials (E1007).
    #[error("[E1007] Unauthorized: {reason}")]
    Unauthorized {
        /// Why the credentials were refused
        reason: String,
    },

    // Delivery errors (E2001-E2002)
    /// Forwarding to the CRM failed after all attempts (E2001).
    #[error("[E2001] Delivery failed: {kind} after {attempts} attempt(s)")]
    DeliveryFailed {
        /// Classified kind of the last failure
        kind: String,
        /// Attempts made
        attempts: u32,
    },

    /// Forwarding blocked by the open circuit breaker (E2002).
    #[error("[E2002] Circuit open: CRM deliveries temporarily blocked")]
    CircuitOpen,

    // System errors (E3001)
    /// Invalid configuration detected at startup (E3001).
    #[error("[E3001] Configuration error: {0}")]
    Configuration(String),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// Returns the stable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature { .. } => "E1001",
            Self::EmptyPayload => "E1002",
            Self::ValidationFailed { .. } => "E1003",
            Self::PayloadTooLarge { .. } => "E1004",
            Self::MalformedPayload { .. } => "E1005",
            Self::RateLimited { .. } => "E1006",
            Self::Unauthorized { .. } => "E1007",
            Self::DeliveryFailed { .. } => "E2001",
            Self::CircuitOpen => "E2002",
            Self::Configuration(_) => "E3001",
            Self::Serialization(_) => "E9999",
        }
    }

    /// HTTP status code the relay answers with for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSignature { .. } | Self::Unauthorized { .. } => 401,
            Self::RateLimited { .. } => 429,
            Self::EmptyPayload | Self::MalformedPayload { .. } => 400,
            Self::ValidationFailed { .. } => 422,
            Self::PayloadTooLarge { .. } => 413,
            Self::DeliveryFailed { .. } => 502,
            Self::CircuitOpen => 503,
            Self::Configuration(_) | Self::Serialization(_) => 500,
        }
    }
}
