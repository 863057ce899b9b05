//! Relay configuration.

use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use leadrelay_delivery::{
    CircuitConfig, EngineConfig, ErrorKind, HttpClientConfig, RetryPolicy, DEFAULT_MAX_QUEUE_SIZE,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "leadrelay.toml";

/// Relay configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`leadrelay.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Environment variable names are the field names in upper case, e.g.
/// `CRM_WEBHOOK_URL` or `MAX_RETRIES`.
///
/// # Example
///
/// ```no_run
/// use leadrelay_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
/// println!("Relay will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Server
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Whole-request timeout in seconds, forwarding included.
    ///
    /// Environment variable: `REQUEST_TIMEOUT` or `REQUEST_TIMEOUT_SECONDS`
    pub request_timeout_seconds: u64,
    /// Largest accepted webhook body.
    pub max_payload_bytes: usize,
    /// Webhook requests allowed per client address in each window. Zero
    /// disables rate limiting.
    pub rate_limit_max: u32,
    /// Rate limit window, in milliseconds.
    pub rate_limit_window_ms: u64,

    // Relay
    /// CRM endpoint leads are forwarded to.
    pub crm_webhook_url: Option<String>,
    /// Whether valid leads are forwarded at all.
    pub forward_to_crm: bool,
    /// Shared secret for inbound HMAC signatures. Unset disables checking.
    pub webhook_secret: Option<String>,
    /// Bearer token for the metrics reset and queue routes. Falls back to
    /// `webhook_secret`; with neither set those routes refuse every call.
    pub admin_token: Option<String>,
    /// User agent sent to the CRM.
    pub user_agent: String,

    // Retry
    /// Retries after the first delivery attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Upper bound on any retry delay, in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Backoff growth factor.
    pub retry_exponential_base: f64,
    /// Jitter as a fraction of the delay (0.0 to 1.0).
    pub retry_jitter_factor: f64,
    /// Error codes retried in addition to the transient ones, e.g.
    /// `JSON_PARSE_ERROR`.
    pub retryable_error_kinds: Vec<String>,

    // Circuit breaker
    /// Failures that open the breaker.
    pub circuit_breaker_threshold: u32,
    /// How long the breaker stays open, in milliseconds.
    pub circuit_breaker_cooldown_ms: u64,

    // Fallback queue
    /// Whether failed deliveries are queued for reprocessing.
    pub fallback_queue: bool,
    /// Queue passes before a delivery is dropped.
    pub max_queue_retries: u32,
    /// Largest fallback queue; the oldest delivery is dropped beyond it.
    pub max_queue_size: usize,
    /// Pause between queue items, in milliseconds.
    pub queue_item_delay_ms: u64,

    // Logging
    /// Log filter directive.
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let circuit = CircuitConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_seconds: 120,
            max_payload_bytes: 1024 * 1024,
            rate_limit_max: 100,
            rate_limit_window_ms: 15 * 60 * 1000,
            crm_webhook_url: None,
            forward_to_crm: true,
            webhook_secret: None,
            admin_token: None,
            user_agent: concat!("leadrelay/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: retry.max_retries,
            retry_base_delay_ms: duration_ms(retry.base_delay),
            retry_max_delay_ms: duration_ms(retry.max_delay),
            retry_exponential_base: retry.exponential_base,
            retry_jitter_factor: retry.jitter_factor,
            retryable_error_kinds: Vec::new(),
            circuit_breaker_threshold: circuit.failure_threshold,
            circuit_breaker_cooldown_ms: duration_ms(circuit.cooldown),
            fallback_queue: true,
            max_queue_retries: 3,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            queue_item_delay_ms: 1000,
            rust_log: "info,leadrelay=debug,tower_http=debug".to_string(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Config {
    /// Loads configuration from defaults, `leadrelay.toml`, and the
    /// environment, then validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Like [`Config::load`] with an explicit file path.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_from(path: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::raw().only(&Self::ENV_KEYS).map(|key| {
                if key.as_str() == "request_timeout" {
                    "request_timeout_seconds".into()
                } else {
                    key.into()
                }
            }));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    const ENV_KEYS: [&'static str; 25] = [
        "host",
        "port",
        "request_timeout",
        "request_timeout_seconds",
        "max_payload_bytes",
        "rate_limit_max",
        "rate_limit_window_ms",
        "crm_webhook_url",
        "forward_to_crm",
        "webhook_secret",
        "admin_token",
        "user_agent",
        "max_retries",
        "retry_base_delay_ms",
        "retry_max_delay_ms",
        "retry_exponential_base",
        "retry_jitter_factor",
        "retryable_error_kinds",
        "circuit_breaker_threshold",
        "circuit_breaker_cooldown_ms",
        "fallback_queue",
        "max_queue_retries",
        "max_queue_size",
        "queue_item_delay_ms",
        "rust_log",
    ];

    /// Rejects values the relay cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("port must be non-zero");
        }
        if self.request_timeout_seconds == 0 {
            bail!("request_timeout_seconds must be non-zero");
        }
        if self.max_payload_bytes == 0 {
            bail!("max_payload_bytes must be non-zero");
        }
        if self.rate_limit_max > 0 && self.rate_limit_window_ms == 0 {
            bail!("rate_limit_window_ms must be non-zero when rate limiting is enabled");
        }
        if let Some(url) = &self.crm_webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("crm_webhook_url must be an http(s) URL, got '{url}'");
            }
        }
        self.to_engine_config()?.validate().context("invalid delivery settings")?;
        Ok(())
    }

    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a socket address.
    pub fn server_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    /// Whether leads will actually be forwarded.
    pub fn forwarding_enabled(&self) -> bool {
        self.forward_to_crm && self.crm_webhook_url.is_some()
    }

    /// Whole-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Rate limit window.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    /// Retry engine settings.
    ///
    /// # Errors
    ///
    /// Returns an error if an allow-listed error code is unknown.
    pub fn to_engine_config(&self) -> Result<EngineConfig> {
        let retryable_kinds = self
            .retryable_error_kinds
            .iter()
            .map(|code| code.trim().parse::<ErrorKind>())
            .collect::<Result<_, _>>()
            .context("invalid retryable_error_kinds")?;

        Ok(EngineConfig {
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
                exponential_base: self.retry_exponential_base,
                jitter_factor: self.retry_jitter_factor,
                retryable_kinds,
            },
            circuit: CircuitConfig {
                failure_threshold: self.circuit_breaker_threshold,
                cooldown: Duration::from_millis(self.circuit_breaker_cooldown_ms),
            },
            fallback_queue: self.fallback_queue,
            max_queue_retries: self.max_queue_retries,
            max_queue_size: self.max_queue_size,
            queue_item_delay: Duration::from_millis(self.queue_item_delay_ms),
        })
    }

    /// CRM client settings, when a URL is configured.
    pub fn to_client_config(&self) -> Option<HttpClientConfig> {
        self.crm_webhook_url.as_ref().map(|url| {
            let mut config = HttpClientConfig::new(url.clone());
            config.user_agent.clone_from(&self.user_agent);
            config
        })
    }
}
