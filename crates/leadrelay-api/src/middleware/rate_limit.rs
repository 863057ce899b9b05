//! Per-client rate limit on the lead webhooks.
//!
//! Each client address gets a burst of `max` requests that refills evenly
//! over the window. The address comes from the accepted connection; requests
//! without one (in-process callers) share a single bucket.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::Response,
};
use governor::{clock::Clock as _, DefaultKeyedRateLimiter, Quota, RateLimiter};
use leadrelay_core::RelayError;
use tracing::warn;

use crate::{handlers::error_response, AppState};

/// Tracked addresses above which idle buckets are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

/// Keyed token-bucket limiter for webhook callers.
pub struct WebhookRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    max: NonZeroU32,
    window: Duration,
}

impl std::fmt::Debug for WebhookRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookRateLimiter")
            .field("max", &self.max)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl WebhookRateLimiter {
    /// Allows `max` requests per `window` for each client address.
    ///
    /// Returns `None` when `max` is zero, which disables limiting.
    pub fn new(max: u32, window: Duration) -> Option<Self> {
        let max = NonZeroU32::new(max)?;
        let period = (window / max.get()).max(Duration::from_millis(1));
        let quota = Quota::with_period(period)?.allow_burst(max);
        Some(Self { limiter: RateLimiter::keyed(quota), max, window })
    }

    /// Takes one request from `client`'s budget.
    ///
    /// # Errors
    ///
    /// Returns how long the client must wait when the budget is spent.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter
            .check_key(&client)
            .map_err(|not_until| not_until.wait_time_from(self.limiter.clock().now()))
    }
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip())
}

/// Answers 429 with `Retry-After` once a client exceeds its budget.
pub async fn limit_webhooks(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(limiter) = &state.rate_limiter else {
        return next.run(req).await;
    };

    let client = client_ip(&req);
    if let Err(wait) = limiter.check(client) {
        let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        warn!(%client, retry_after_secs, "webhook rate limit exceeded");

        let mut response = error_response(&RelayError::RateLimited { retry_after_secs });
        response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        return response;
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_per_client() {
        let limiter = WebhookRateLimiter::new(2, Duration::from_secs(60)).unwrap();
        let first = IpAddr::from([10, 0, 0, 1]);
        let second = IpAddr::from([10, 0, 0, 2]);

        assert!(limiter.check(first).is_ok());
        assert!(limiter.check(first).is_ok());
        let wait = limiter.check(first).unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(30));

        assert!(limiter.check(second).is_ok());
    }

    #[test]
    fn zero_max_disables_limiting() {
        assert!(WebhookRateLimiter::new(0, Duration::from_secs(60)).is_none());
    }
}
