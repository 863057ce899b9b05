//! Delivery failures and their classification.
//!
//! A [`DeliveryClient`](crate::DeliveryClient) raises a [`DeliveryError`] for
//! a single failed attempt. The engine classifies it into an [`ErrorKind`],
//! which decides retry eligibility and is the key used in metrics.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Failure of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Connection could not be established or was reset.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// Attempt exceeded its timeout.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// Destination answered with a non-success status.
    #[error("HTTP {status_code}: {body}")]
    Http {
        /// HTTP status code
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// Success response that could not be decoded.
    #[error("failed to parse JSON response: {message}")]
    Parse {
        /// Decoder message
        message: String,
    },

    /// Request blocked by a cross-origin policy.
    #[error("CORS request blocked: {message}")]
    Cors {
        /// Policy message
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX) }
    }

    /// Creates an error from a non-success HTTP response.
    pub fn http(status_code: u16, body: impl Into<String>) -> Self {
        Self::Http { status_code, body: body.into() }
    }

    /// Creates a response parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    /// Creates a CORS error.
    pub fn cors(message: impl Into<String>) -> Self {
        Self::Cors { message: message.into() }
    }

    /// Creates an unclassified error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other { message: message.into() }
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Classified failure kind.
///
/// Displays as the stable code used in metrics and failure results, e.g.
/// `503_SERVER_ERROR` or `NETWORK_ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Connection failure.
    Network,
    /// Attempt timed out on our side. A 504 answer is `ServerError(504)`.
    Timeout,
    /// Destination answered 408.
    RequestTimeout,
    /// Destination answered 5xx.
    ServerError(u16),
    /// Destination answered 429.
    RateLimited,
    /// Destination answered 4xx other than 408 and 429.
    ClientError(u16),
    /// Undecodable success response.
    JsonParse,
    /// Cross-origin rejection.
    Cors,
    /// Unclassified failure.
    Unknown,
    /// Delivery short-circuited by the open breaker.
    CircuitBreakerOpen,
    /// Queued delivery dropped after too many queue passes.
    QueueRetriesExhausted,
}

impl ErrorKind {
    /// Classifies a delivery failure.
    pub fn classify(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::Network { .. } => Self::Network,
            DeliveryError::Timeout { .. } => Self::Timeout,
            DeliveryError::Http { status_code, .. } => match *status_code {
                status if status >= 500 => Self::ServerError(status),
                429 => Self::RateLimited,
                408 => Self::RequestTimeout,
                status @ 400..=499 => Self::ClientError(status),
                _ => Self::Unknown,
            },
            DeliveryError::Parse { .. } => Self::JsonParse,
            DeliveryError::Cors { .. } => Self::Cors,
            DeliveryError::Other { .. } => Self::Unknown,
        }
    }

    /// Retry eligibility before any caller allow-list is applied.
    ///
    /// Network failures, timeouts, server errors and rate limiting are
    /// transient; everything else is not.
    pub fn is_retryable_by_default(&self) -> bool {
        match self {
            Self::Network
            | Self::Timeout
            | Self::RequestTimeout
            | Self::ServerError(_)
            | Self::RateLimited => true,

            Self::ClientError(_)
            | Self::JsonParse
            | Self::Cors
            | Self::Unknown
            | Self::CircuitBreakerOpen
            | Self::QueueRetriesExhausted => false,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "NETWORK_ERROR"),
            Self::Timeout => write!(f, "504_TIMEOUT"),
            Self::RequestTimeout => write!(f, "408_TIMEOUT"),
            Self::ServerError(status) => write!(f, "{status}_SERVER_ERROR"),
            Self::RateLimited => write!(f, "429_RATE_LIMITED"),
            Self::ClientError(status) => write!(f, "{status}_CLIENT_ERROR"),
            Self::JsonParse => write!(f, "JSON_PARSE_ERROR"),
            Self::Cors => write!(f, "CORS_ERROR"),
            Self::Unknown => write!(f, "UNKNOWN_ERROR"),
            Self::CircuitBreakerOpen => write!(f, "CIRCUIT_BREAKER_OPEN"),
            Self::QueueRetriesExhausted => write!(f, "MAX_QUEUE_RETRIES_EXCEEDED"),
        }
    }
}

impl FromStr for ErrorKind {
    type Err = ConfigError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let kind = match code {
            "NETWORK_ERROR" => Self::Network,
            "504_TIMEOUT" => Self::Timeout,
            "408_TIMEOUT" => Self::RequestTimeout,
            "429_RATE_LIMITED" => Self::RateLimited,
            "JSON_PARSE_ERROR" => Self::JsonParse,
            "CORS_ERROR" => Self::Cors,
            "UNKNOWN_ERROR" => Self::Unknown,
            "CIRCUIT_BREAKER_OPEN" => Self::CircuitBreakerOpen,
            "MAX_QUEUE_RETRIES_EXCEEDED" => Self::QueueRetriesExhausted,
            other => {
                let parsed = other
                    .strip_suffix("_SERVER_ERROR")
                    .and_then(|status| status.parse::<u16>().ok())
                    .filter(|status| (500..=599).contains(status))
                    .map(Self::ServerError)
                    .or_else(|| {
                        other
                            .strip_suffix("_CLIENT_ERROR")
                            .and_then(|status| status.parse::<u16>().ok())
                            .filter(|status| (400..=499).contains(status))
                            .map(Self::ClientError)
                    });
                return parsed.ok_or_else(|| ConfigError::UnknownErrorKind(other.to_string()));
            },
        };
        Ok(kind)
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

/// Invalid engine configuration. Raised at construction only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Allow-list entry that is not a known error code.
    #[error("unknown error kind '{0}'")]
    UnknownErrorKind(String),

    /// Retry policy values out of range.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// Circuit breaker values out of range.
    #[error("invalid circuit breaker configuration: {0}")]
    InvalidCircuit(String),

    /// Fallback queue bound out of range.
    #[error("invalid queue configuration: {0}")]
    InvalidQueue(String),

    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_statuses_classified() {
        assert_eq!(ErrorKind::classify(&DeliveryError::http(500, "")), ErrorKind::ServerError(500));
        assert_eq!(ErrorKind::classify(&DeliveryError::http(504, "")), ErrorKind::ServerError(504));
        assert_eq!(ErrorKind::classify(&DeliveryError::http(429, "")), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::classify(&DeliveryError::http(408, "")), ErrorKind::RequestTimeout);
        assert_eq!(ErrorKind::classify(&DeliveryError::http(401, "")), ErrorKind::ClientError(401));
        assert_eq!(ErrorKind::classify(&DeliveryError::http(302, "")), ErrorKind::Unknown);
    }

    #[test]
    fn non_http_failures_classified() {
        assert_eq!(ErrorKind::classify(&DeliveryError::network("refused")), ErrorKind::Network);
        assert_eq!(
            ErrorKind::classify(&DeliveryError::timeout(Duration::from_secs(10))),
            ErrorKind::Timeout
        );
        assert_eq!(ErrorKind::classify(&DeliveryError::parse("eof")), ErrorKind::JsonParse);
        assert_eq!(ErrorKind::classify(&DeliveryError::cors("blocked")), ErrorKind::Cors);
        assert_eq!(ErrorKind::classify(&DeliveryError::other("boom")), ErrorKind::Unknown);
    }

    #[test]
    fn default_retryability() {
        assert!(ErrorKind::Network.is_retryable_by_default());
        assert!(ErrorKind::Timeout.is_retryable_by_default());
        assert!(ErrorKind::RequestTimeout.is_retryable_by_default());
        assert!(ErrorKind::ServerError(503).is_retryable_by_default());
        assert!(ErrorKind::RateLimited.is_retryable_by_default());

        assert!(!ErrorKind::ClientError(401).is_retryable_by_default());
        assert!(!ErrorKind::JsonParse.is_retryable_by_default());
        assert!(!ErrorKind::Cors.is_retryable_by_default());
        assert!(!ErrorKind::Unknown.is_retryable_by_default());
    }

    #[test]
    fn codes_round_trip_through_display() {
        for kind in [
            ErrorKind::Network,
            ErrorKind::Timeout,
            ErrorKind::RequestTimeout,
            ErrorKind::ServerError(503),
            ErrorKind::RateLimited,
            ErrorKind::ClientError(404),
            ErrorKind::JsonParse,
            ErrorKind::Cors,
            ErrorKind::Unknown,
            ErrorKind::CircuitBreakerOpen,
            ErrorKind::QueueRetriesExhausted,
        ] {
            assert_eq!(kind.to_string().parse::<ErrorKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_codes_rejected() {
        assert!("502_BAD_GATEWAY".parse::<ErrorKind>().is_err());
        assert!("404_SERVER_ERROR".parse::<ErrorKind>().is_err());
        assert_eq!(
            "TEAPOT".parse::<ErrorKind>(),
            Err(ConfigError::UnknownErrorKind("TEAPOT".into()))
        );
    }

    #[test]
    fn error_display_format() {
        assert_eq!(
            DeliveryError::timeout(Duration::from_secs(10)).to_string(),
            "request timeout after 10000ms"
        );
        assert_eq!(DeliveryError::http(503, "down").to_string(), "HTTP 503: down");
        assert_eq!(ErrorKind::ServerError(503).to_string(), "503_SERVER_ERROR");
    }
}
