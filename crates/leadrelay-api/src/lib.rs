//! Lead relay HTTP API.
//!
//! Receives lead webhooks from website forms, Yelp, Facebook, Google and
//! forwarded emails, maps them to one contact schema, scores them and
//! forwards them to a CRM through the retry engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod email;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;

pub use config::Config;
pub use server::{create_router, start_server};
pub use state::{AppState, RelayCounters, RelaySettings, RelayStats};
