//! The seam between the retry engine and the network.
//!
//! [`DeliveryClient`] performs exactly one attempt. Closures of the shape
//! `Fn(Value, AttemptOptions) -> impl Future<Output = Result<Value,
//! DeliveryError>>` implement it, which keeps engine tests free of HTTP.
//! [`HttpDeliveryClient`] is the production implementation that POSTs JSON
//! to a fixed URL.

use std::{collections::BTreeMap, future::Future, pin::Pin, time::Duration};

use serde_json::{json, Value};
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{ConfigError, DeliveryError};

/// Longest response body kept on an HTTP error.
const MAX_ERROR_BODY_CHARS: usize = 1024;

/// Per-attempt parameters handed to a [`DeliveryClient`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptOptions {
    /// Zero-based attempt number.
    pub attempt: u32,
    /// Time budget for this attempt.
    pub timeout: Duration,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
}

/// Boxed future returned by [`DeliveryClient::deliver`].
pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, DeliveryError>> + Send + 'a>>;

/// Performs one delivery attempt.
///
/// Implementations return the decoded success body, or a [`DeliveryError`]
/// carrying the HTTP status for non-2xx responses.
pub trait DeliveryClient: Send + Sync {
    /// Sends `payload` once.
    fn deliver<'a>(&'a self, payload: &'a Value, options: AttemptOptions) -> DeliveryFuture<'a>;
}

impl<F, Fut> DeliveryClient for F
where
    F: Fn(Value, AttemptOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, DeliveryError>> + Send + 'static,
{
    fn deliver<'a>(&'a self, payload: &'a Value, options: AttemptOptions) -> DeliveryFuture<'a> {
        Box::pin(self(payload.clone(), options))
    }
}

/// Configuration for [`HttpDeliveryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Destination URL.
    pub url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl HttpClientConfig {
    /// Configuration for `url` with the default user agent.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: concat!("leadrelay/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: BTreeMap::new(),
        }
    }
}

/// POSTs JSON payloads to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpDeliveryClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the URL does not parse or the
    /// underlying client cannot be built.
    pub fn new(config: HttpClientConfig) -> Result<Self, ConfigError> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| ConfigError::HttpClient(format!("invalid URL '{}': {e}", config.url)))?;

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Destination URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    async fn send(&self, payload: &Value, options: AttemptOptions) -> Result<Value, DeliveryError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .timeout(options.timeout)
            .header("X-Delivery-Attempt", (options.attempt + 1).to_string())
            .json(payload);

        for (name, value) in self.config.headers.iter().chain(options.headers.iter()) {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "request failed");
            if e.is_timeout() {
                DeliveryError::timeout(options.timeout)
            } else if e.is_connect() {
                DeliveryError::network(format!("connection failed: {e}"))
            } else {
                DeliveryError::network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::timeout(options.timeout)
            } else {
                DeliveryError::network(format!("failed to read response body: {e}"))
            }
        })?;

        debug!(status = status.as_u16(), body_bytes = body.len(), "received response");

        if !status.is_success() {
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(DeliveryError::http(status.as_u16(), body));
        }

        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({})))
    }
}

impl DeliveryClient for HttpDeliveryClient {
    fn deliver<'a>(&'a self, payload: &'a Value, options: AttemptOptions) -> DeliveryFuture<'a> {
        let span = info_span!("crm_request", url = %self.config.url, attempt = options.attempt);
        Box::pin(self.send(payload, options).instrument(span))
    }
}
