//! HTTP server setup and request routing.
//!
//! Middleware, outermost first: request id, tracing, whole-request timeout.
//! Webhook routes add a per-client rate limit; the operator routes that
//! change state require the admin token.
//!
//! On CTRL+C or SIGTERM the server stops accepting connections and lets
//! in-flight requests finish. The fallback queue lives in memory, so any
//! leads still queued at that point are lost; the count is logged.

use std::net::SocketAddr;

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::{self as axum_middleware, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use leadrelay_core::RequestId;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    handlers::{self, create_error_response},
    middleware::{auth::require_admin, rate_limit::limit_webhooks},
    AppState,
};

/// Response header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Creates the router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use leadrelay_api::{create_router, AppState, Config};
///
/// let state = AppState::from_config(&Config::default()).unwrap();
/// let app = create_router(state);
/// ```
pub fn create_router(state: AppState) -> Router {
    let timeout = state.settings.request_timeout;

    let webhook_routes = Router::new()
        .route("/webhook", post(handlers::webhook))
        .route("/webhook/email", post(handlers::email_webhook))
        .route("/webhook/{source}", post(handlers::source_webhook))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), limit_webhooks));

    let admin_routes = Router::new()
        .route("/metrics/reset", post(handlers::reset_metrics))
        .route("/queue", delete(handlers::clear_queue))
        .route("/queue/process", post(handlers::process_queue))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_admin));

    let ops_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::get_metrics))
        .route("/schema", get(handlers::get_schema));

    Router::new()
        .merge(webhook_routes)
        .merge(admin_routes)
        .merge(ops_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Assigns a [`RequestId`] to every request and echoes it as `X-Request-Id`.
async fn inject_request_id(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    req.extensions_mut().insert(request_id);

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

async fn not_found() -> Response {
    create_error_response(
        StatusCode::NOT_FOUND,
        "E0404",
        "Endpoint not found. Available endpoints: POST /webhook, POST /webhook/{source}, \
         POST /webhook/email, GET /health, GET /metrics, POST /metrics/reset, GET /schema, \
         POST /queue/process, DELETE /queue",
    )
}

/// Serves the relay on `addr` until CTRL+C or SIGTERM.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let engine = state.engine.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "lead relay listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stranded = engine.queue_size().await;
    if stranded > 0 {
        warn!(queue_size = stranded, "shutting down with undelivered leads in the fallback queue");
    }
    info!("HTTP server stopped");
    Ok(())
}

/// Resolves on the first shutdown signal.
async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let signal = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                warn!(%error, "CTRL+C handler unavailable");
            }
            "SIGINT"
        },
        () = sigterm => "SIGTERM",
    };

    info!(signal, "draining in-flight requests");
}
