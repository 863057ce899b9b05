//! Forwarded email intake.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::HeaderMap,
    response::Response,
    Extension,
};
use leadrelay_core::{LeadSource, RelayError, RequestId};
use serde_json::Value;
use tracing::warn;

use super::{
    error_response,
    webhook::{process_lead, read_verified, Inbound},
};
use crate::{email::parse_forwarded_email, AppState};

/// JSON keys that may carry the email text when the body is JSON.
const TEXT_KEYS: [&str; 4] = ["text", "content", "body", "email"];

/// `POST /webhook/email`: raw forwarded email text.
///
/// Accepts `text/plain` bodies, or a JSON object carrying the text under
/// `text`, `content`, `body` or `email`. The parsed record is attributed to
/// Yelp, whose lead notifications arrive this way.
pub async fn email_webhook(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    let request_id = request_id.map(|Extension(id)| id).unwrap_or_default();
    state.stats.record_received().await;

    let text = match read_verified(&state, &headers, body).await {
        Ok(bytes) => email_text(&bytes),
        Err(error) => Err(error),
    };
    let text = match text {
        Ok(text) => text,
        Err(error) => {
            warn!(code = error.code(), error = %error, "email webhook rejected");
            state.stats.record_rejected().await;
            return error_response(&error);
        },
    };

    let record = parse_forwarded_email(&text);
    process_lead(&state, record, Inbound { source: LeadSource::Yelp, request_id, started }).await
}

fn email_text(body: &[u8]) -> Result<String, RelayError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| RelayError::MalformedPayload { reason: e.to_string() })?;

    let from_json = serde_json::from_str::<Value>(text).ok().and_then(|value| {
        TEXT_KEYS
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    let text = from_json.unwrap_or_else(|| text.to_string());

    if text.trim().is_empty() {
        return Err(RelayError::EmptyPayload);
    }
    Ok(text)
}
