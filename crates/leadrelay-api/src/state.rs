//! Shared application state for request handlers.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use leadrelay_core::{Clock, LeadSource, RealClock};
use leadrelay_delivery::{DeliveryClient, HttpDeliveryClient, RetryEngine};
use leadrelay_mapping::FieldMapper;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{config::Config, middleware::WebhookRateLimiter};

/// Distinct custom sources counted by name; later ones count as `other`.
const MAX_TRACKED_SOURCES: usize = 50;

/// Longest custom source name counted by name.
const MAX_SOURCE_NAME_LEN: usize = 64;

/// Bucket for custom sources past the tracking limits.
const OVERFLOW_SOURCE: &str = "other";

/// Request-handling settings derived from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Shared secret for inbound signatures.
    pub webhook_secret: Option<String>,
    /// Whether valid leads are forwarded.
    pub forward_to_crm: bool,
    /// Largest accepted webhook body.
    pub max_payload_bytes: usize,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Bearer token guarding operator routes that change state.
    pub admin_token: Option<String>,
    /// Webhook requests per client per window; zero disables the limit.
    pub rate_limit_max: u32,
    /// Rate limit window.
    pub rate_limit_window: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            forward_to_crm: true,
            max_payload_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(120),
            admin_token: None,
            rate_limit_max: 0,
            rate_limit_window: Duration::from_secs(15 * 60),
        }
    }
}

/// Inbound request counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayCounters {
    /// Webhook requests received.
    pub total_requests: u64,
    /// Requests whose lead mapped cleanly.
    pub successful_requests: u64,
    /// Requests rejected before forwarding.
    pub failed_requests: u64,
    /// Leads handed to the CRM successfully.
    pub forwarded_requests: u64,
    /// Successfully mapped leads per source.
    pub by_source: BTreeMap<String, u64>,
    /// Start of the counting window.
    pub last_reset: DateTime<Utc>,
}

impl RelayCounters {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            forwarded_requests: 0,
            by_source: BTreeMap::new(),
            last_reset: now,
        }
    }
}

/// Counter key for `source`.
///
/// Known sources always count under their own name. Custom names come from
/// the request path, so they only get their own entry while few and short.
fn source_key(by_source: &BTreeMap<String, u64>, source: &LeadSource) -> String {
    let name = source.as_str();
    if !matches!(source, LeadSource::Other(_)) || by_source.contains_key(name) {
        return name.to_string();
    }

    let custom = by_source
        .keys()
        .filter(|key| {
            let parsed: LeadSource = key.parse().unwrap_or_else(|e| match e {});
            matches!(parsed, LeadSource::Other(_)) && key.as_str() != OVERFLOW_SOURCE
        })
        .count();
    if custom >= MAX_TRACKED_SOURCES || name.len() > MAX_SOURCE_NAME_LEN {
        OVERFLOW_SOURCE.to_string()
    } else {
        name.to_string()
    }
}

/// Thread-safe relay counters.
#[derive(Debug)]
pub struct RelayStats {
    counters: Mutex<RelayCounters>,
}

impl RelayStats {
    /// Creates zeroed counters starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { counters: Mutex::new(RelayCounters::new(now)) }
    }

    pub(crate) async fn record_received(&self) {
        self.counters.lock().await.total_requests += 1;
    }

    pub(crate) async fn record_rejected(&self) {
        self.counters.lock().await.failed_requests += 1;
    }

    pub(crate) async fn record_mapped(&self, source: &LeadSource) {
        let mut counters = self.counters.lock().await;
        counters.successful_requests += 1;
        let key = source_key(&counters.by_source, source);
        *counters.by_source.entry(key).or_default() += 1;
    }

    pub(crate) async fn record_forwarded(&self) {
        self.counters.lock().await.forwarded_requests += 1;
    }

    /// Copy of the current counters.
    pub async fn snapshot(&self) -> RelayCounters {
        self.counters.lock().await.clone()
    }

    /// Zeroes the counters.
    pub async fn reset(&self, now: DateTime<Utc>) {
        *self.counters.lock().await = RelayCounters::new(now);
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Field mapper applied to every inbound lead.
    pub mapper: Arc<FieldMapper>,
    /// Retry engine wrapping CRM delivery.
    pub engine: Arc<RetryEngine>,
    /// CRM client, absent when no CRM URL is configured.
    pub crm_client: Option<Arc<dyn DeliveryClient>>,
    /// Request-handling settings.
    pub settings: Arc<RelaySettings>,
    /// Inbound counters.
    pub stats: Arc<RelayStats>,
    /// Per-client webhook limiter, absent when limiting is off.
    pub rate_limiter: Option<Arc<WebhookRateLimiter>>,
    /// Clock for timestamps and uptime.
    pub clock: Arc<dyn Clock>,
    /// Process start, for uptime.
    pub started_at: DateTime<Utc>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .field("forwarding", &self.crm_client.is_some())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assembles state from explicit parts.
    pub fn new(
        mapper: FieldMapper,
        engine: RetryEngine,
        crm_client: Option<Arc<dyn DeliveryClient>>,
        settings: RelaySettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_utc();
        let rate_limiter =
            WebhookRateLimiter::new(settings.rate_limit_max, settings.rate_limit_window)
                .map(Arc::new);
        Self {
            mapper: Arc::new(mapper),
            engine: Arc::new(engine),
            crm_client,
            settings: Arc::new(settings),
            stats: Arc::new(RelayStats::new(now)),
            rate_limiter,
            clock,
            started_at: now,
        }
    }

    /// Builds the production state on the real clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine settings are invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(RealClock::new());
        let engine = RetryEngine::with_clock(config.to_engine_config()?, clock.clone())
            .context("failed to build retry engine")?;

        let crm_client = match config.to_client_config() {
            Some(client_config) => {
                let client = HttpDeliveryClient::new(client_config)
                    .context("failed to build CRM client")?;
                Some(Arc::new(client) as Arc<dyn DeliveryClient>)
            },
            None => None,
        };

        let webhook_secret = config.webhook_secret.clone().filter(|secret| !secret.is_empty());
        let admin_token = config
            .admin_token
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| webhook_secret.clone());
        let settings = RelaySettings {
            webhook_secret,
            forward_to_crm: config.forward_to_crm,
            max_payload_bytes: config.max_payload_bytes,
            request_timeout: config.request_timeout(),
            admin_token,
            rate_limit_max: config.rate_limit_max,
            rate_limit_window: config.rate_limit_window(),
        };

        Ok(Self::new(FieldMapper::new(), engine, crm_client, settings, clock))
    }

    /// Whether valid leads will be forwarded.
    pub fn forwarding_enabled(&self) -> bool {
        self.settings.forward_to_crm && self.crm_client.is_some()
    }

    /// Time since the state was built.
    pub fn uptime(&self) -> Duration {
        (self.clock.now_utc() - self.started_at).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use leadrelay_core::TestClock;

    use super::*;

    #[tokio::test]
    async fn counters_track_sources() {
        let stats = RelayStats::new(Utc::now());
        stats.record_received().await;
        stats.record_received().await;
        stats.record_received().await;
        stats.record_mapped(&LeadSource::Yelp).await;
        stats.record_mapped(&LeadSource::Yelp).await;
        stats.record_rejected().await;
        stats.record_forwarded().await;

        let counters = stats.snapshot().await;
        assert_eq!(counters.total_requests, 3);
        assert_eq!(counters.successful_requests, 2);
        assert_eq!(counters.failed_requests, 1);
        assert_eq!(counters.forwarded_requests, 1);
        assert_eq!(counters.by_source.get("yelp"), Some(&2));

        stats.reset(Utc::now()).await;
        let counters = stats.snapshot().await;
        assert_eq!(counters.total_requests, 0);
        assert!(counters.by_source.is_empty());
    }

    #[tokio::test]
    async fn custom_sources_overflow_into_other() {
        let stats = RelayStats::new(Utc::now());
        for i in 0..MAX_TRACKED_SOURCES + 20 {
            stats.record_mapped(&LeadSource::Other(format!("src{i}"))).await;
        }
        stats.record_mapped(&LeadSource::Other("x".repeat(MAX_SOURCE_NAME_LEN + 1))).await;
        stats.record_mapped(&LeadSource::Other("src0".into())).await;
        stats.record_mapped(&LeadSource::Facebook).await;

        let counters = stats.snapshot().await;
        assert_eq!(counters.by_source.len(), MAX_TRACKED_SOURCES + 2);
        assert_eq!(counters.by_source.get("other"), Some(&21));
        assert_eq!(counters.by_source.get("src0"), Some(&2));
        assert_eq!(counters.by_source.get("facebook"), Some(&1));
        assert_eq!(counters.successful_requests, MAX_TRACKED_SOURCES as u64 + 23);
    }

    #[test]
    fn from_config_without_crm_url_disables_forwarding() {
        let state = AppState::from_config(&Config::default()).unwrap();
        assert!(state.crm_client.is_none());
        assert!(!state.forwarding_enabled());
    }

    #[test]
    fn from_config_with_crm_url_builds_client() {
        let config = Config {
            crm_webhook_url: Some("http://localhost:9/hook".into()),
            webhook_secret: Some(String::new()),
            ..Config::default()
        };
        let state = AppState::from_config(&config).unwrap();
        assert!(state.forwarding_enabled());
        assert_eq!(state.settings.webhook_secret, None);
        assert_eq!(state.settings.admin_token, None);
    }

    #[test]
    fn admin_token_falls_back_to_webhook_secret() {
        let config = Config { webhook_secret: Some("shared".into()), ..Config::default() };
        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.settings.admin_token.as_deref(), Some("shared"));
        assert!(state.rate_limiter.is_some());

        let config = Config {
            webhook_secret: Some("shared".into()),
            admin_token: Some("ops".into()),
            rate_limit_max: 0,
            ..Config::default()
        };
        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.settings.admin_token.as_deref(), Some("ops"));
        assert!(state.rate_limiter.is_none());
    }

    #[test]
    fn uptime_follows_clock() {
        let clock = TestClock::new();
        let state = AppState::new(
            FieldMapper::new(),
            RetryEngine::new(Default::default()).unwrap(),
            None,
            RelaySettings::default(),
            Arc::new(clock.clone()),
        );
        clock.advance(Duration::from_secs(90));
        assert_eq!(state.uptime(), Duration::from_secs(90));
    }
}
