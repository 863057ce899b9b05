//! Lead relay service.
//!
//! Loads configuration, builds the mapper and the retry engine, and serves
//! webhooks until CTRL+C or SIGTERM.

use anyhow::{Context, Result};
use leadrelay_api::{AppState, Config};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log)?;

    info!("Starting lead relay");
    info!(
        host = %config.host,
        port = config.port,
        crm_configured = config.crm_webhook_url.is_some(),
        forward_to_crm = config.forward_to_crm,
        signatures = config.webhook_secret.is_some(),
        max_retries = config.max_retries,
        rate_limit_max = config.rate_limit_max,
        "Configuration loaded"
    );

    if config.forward_to_crm && config.crm_webhook_url.is_none() {
        warn!("CRM_WEBHOOK_URL not set; leads will be mapped but not forwarded");
    }

    let addr = config.server_addr()?;
    let state = AppState::from_config(&config)?;

    if state.settings.admin_token.is_none() {
        warn!("ADMIN_TOKEN and WEBHOOK_SECRET not set; queue and metrics reset routes are disabled");
    }

    leadrelay_api::start_server(state, addr).await.context("HTTP server failed")?;

    info!("Lead relay shutdown complete");
    Ok(())
}

/// Installs the global subscriber.
///
/// `RUST_LOG` directives win over the configured ones; `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing(configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .context("Invalid log filter directives")?;

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_file(true).with_line_number(true))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };
    installed.context("Failed to install tracing subscriber")
}
