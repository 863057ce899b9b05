//! Request middleware for the relay routes.
//!
//! Operator routes that change state sit behind [`auth::require_admin`];
//! lead webhooks sit behind [`rate_limit::limit_webhooks`].

pub mod auth;
pub mod rate_limit;

pub use rate_limit::WebhookRateLimiter;
