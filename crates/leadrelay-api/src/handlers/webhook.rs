//! Inbound lead webhooks.
//!
//! Every source goes through [`process_lead`]: signature check, payload
//! extraction, annotation, mapping, scoring and forwarding to the CRM.

use std::{collections::BTreeMap, time::Instant};

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use leadrelay_core::{score_lead, LeadSource, Priority, RawRecord, RelayError, RequestId};
use leadrelay_delivery::{DeliveryOutcome, ErrorKind};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn, Instrument};

use super::{error_response, ErrorDetail};
use crate::{
    crypto::{signature_from_headers, verify_signature},
    AppState,
};

/// Successful or forwarded-with-failure webhook response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// Whether the lead was accepted and, if forwarding ran, delivered.
    pub success: bool,
    /// Summary for humans.
    pub message: String,
    /// Request identifier, also sent as `X-Request-Id`.
    pub request_id: String,
    /// Source the lead was attributed to.
    pub source: String,
    /// Handling time in milliseconds.
    pub duration_ms: u64,
    /// Mapping summary.
    pub data: MappedSummary,
    /// Delivery result, when forwarding ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded: Option<DeliveryOutcome>,
    /// Why delivery failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Fields produced by the mapper and its warnings.
#[derive(Debug, Serialize)]
pub struct MappedSummary {
    /// Canonical fields emitted.
    pub mapped: Vec<String>,
    /// Non-fatal mapping warnings.
    pub warnings: Vec<String>,
    /// Lead score, 0 to 100.
    pub score: u32,
    /// Priority bucket for the score.
    pub priority: Priority,
}

/// How the inbound request asked to be handled.
#[derive(Debug)]
pub(crate) struct Inbound {
    pub source: LeadSource,
    pub request_id: RequestId,
    pub started: Instant,
}

/// `POST /webhook`: source taken from the payload, `unknown` if absent.
pub async fn webhook(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    let request_id = request_id.map(|Extension(id)| id).unwrap_or_default();

    let record = match accept(&state, &headers, body, &query).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    let source = record
        .get("source")
        .and_then(Value::as_str)
        .map_or(LeadSource::Other("unknown".into()), |s| s.parse().unwrap_or_else(|e| match e {}));

    process_lead(&state, record, Inbound { source, request_id, started }).await
}

/// `POST /webhook/{source}`.
pub async fn source_webhook(
    State(state): State<AppState>,
    Path(source): Path<String>,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    let request_id = request_id.map(|Extension(id)| id).unwrap_or_default();
    let source: LeadSource = source.parse().unwrap_or_else(|e| match e {});

    let record = match accept(&state, &headers, body, &query).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    process_lead(&state, record, Inbound { source, request_id, started }).await
}

/// Reads the body, checks the signature, then extracts the raw record.
async fn accept(
    state: &AppState,
    headers: &HeaderMap,
    body: Body,
    query: &BTreeMap<String, String>,
) -> Result<RawRecord, Response> {
    state.stats.record_received().await;

    let result = match read_verified(state, headers, body).await {
        Ok(bytes) => extract_payload(&bytes, BodyFormat::from_headers(headers), query),
        Err(error) => Err(error),
    };
    if let Err(error) = &result {
        warn!(code = error.code(), error = %error, "webhook rejected");
        state.stats.record_rejected().await;
    }
    result.map_err(|error| error_response(&error))
}

/// Buffers the body up to the size limit and checks its signature.
///
/// Shared by every inbound route.
pub(crate) async fn read_verified(
    state: &AppState,
    headers: &HeaderMap,
    body: Body,
) -> Result<Bytes, RelayError> {
    let limit = state.settings.max_payload_bytes;
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    if let Some(size) = declared.filter(|size| *size > limit) {
        return Err(RelayError::PayloadTooLarge { size_bytes: size, limit_bytes: limit });
    }

    let bytes = to_bytes(body, limit).await.map_err(|_| RelayError::PayloadTooLarge {
        size_bytes: declared.unwrap_or(limit.saturating_add(1)),
        limit_bytes: limit,
    })?;

    if let Some(secret) = &state.settings.webhook_secret {
        let signature = signature_from_headers(headers).ok_or_else(|| {
            RelayError::InvalidSignature { reason: "signature header missing".into() }
        })?;
        verify_signature(&bytes, signature, secret)
            .map_err(|e| RelayError::InvalidSignature { reason: e.to_string() })?;
    }

    Ok(bytes)
}

/// Encoding of a webhook body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Form,
}

impl BodyFormat {
    /// Form posts are recognized by content type; anything else is read as
    /// JSON.
    fn from_headers(headers: &HeaderMap) -> Self {
        let is_form = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| {
                mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded")
            });
        if is_form {
            Self::Form
        } else {
            Self::Json
        }
    }
}

/// Parses the body as a JSON object or form fields, falling back to query
/// parameters when it carries nothing.
fn extract_payload(
    body: &[u8],
    format: BodyFormat,
    query: &BTreeMap<String, String>,
) -> Result<RawRecord, RelayError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else if format == BodyFormat::Form {
        Some(form_record(body)?).filter(|record| !record.is_empty())
    } else {
        let value = serde_json::from_slice::<Value>(body)
            .map_err(|e| RelayError::MalformedPayload { reason: e.to_string() })?;
        match value {
            Value::Object(map) if !map.is_empty() => Some(map),
            Value::Object(_) | Value::Null => None,
            _ => return Err(RelayError::EmptyPayload),
        }
    };

    if let Some(record) = from_body {
        return Ok(record);
    }
    if query.is_empty() {
        return Err(RelayError::EmptyPayload);
    }
    Ok(query.iter().map(|(key, value)| (key.clone(), Value::String(value.clone()))).collect())
}

/// Decodes form fields into a record. Repeated keys collect into an array.
fn form_record(body: &[u8]) -> Result<RawRecord, RelayError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| RelayError::MalformedPayload { reason: e.to_string() })?;

    let mut record = RawRecord::new();
    for (key, value) in pairs {
        match record.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            },
            None => {
                record.insert(key, Value::String(value));
            },
        }
    }
    Ok(record)
}

/// Maps, scores and forwards one accepted lead.
pub(crate) async fn process_lead(state: &AppState, raw: RawRecord, inbound: Inbound) -> Response {
    let span = info_span!(
        "webhook",
        request_id = %inbound.request_id,
        source = %inbound.source,
    );
    process_lead_inner(state, raw, inbound).instrument(span).await
}

async fn process_lead_inner(state: &AppState, mut raw: RawRecord, inbound: Inbound) -> Response {
    let Inbound { source, request_id, started } = inbound;
    info!("webhook received");

    // Test submissions are only delivered on request.
    let forward_requested =
        source != LeadSource::Test || raw.get("forward").and_then(Value::as_bool) == Some(true);

    raw.insert("source".into(), Value::String(source.to_string()));
    raw.insert("receivedAt".into(), Value::String(state.clock.now_utc().to_rfc3339()));
    raw.insert("requestId".into(), Value::String(request_id.to_string()));

    let mut result = state.mapper.map(&raw);
    if !result.is_valid() {
        let errors = result.errors();
        warn!(errors = errors.len(), "lead failed validation");
        state.stats.record_rejected().await;

        let error = RelayError::ValidationFailed { error_count: errors.len() };
        let body = json!({
            "error": { "code": error.code(), "message": error.to_string() },
            "errors": errors,
            "requestId": request_id.to_string(),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
    }

    let assessment = score_lead(&result.record);
    result.record.entry("leadScore").or_insert_with(|| json!(assessment.score));
    result.record.insert("priority".into(), json!(assessment.priority));
    debug!(
        fields = result.metadata.mapped_fields.len(),
        warnings = result.metadata.warnings.len(),
        score = assessment.score,
        "lead mapped"
    );
    state.stats.record_mapped(&source).await;

    let forwarded = match &state.crm_client {
        Some(client) if state.settings.forward_to_crm && forward_requested => {
            let headers = BTreeMap::from([("X-Request-ID".to_string(), request_id.to_string())]);
            let payload = Value::Object(result.record.clone());
            let outcome = state.engine.execute_with_options(client.as_ref(), &payload, headers).await;
            if outcome.is_success() {
                state.stats.record_forwarded().await;
            }
            Some(outcome)
        },
        _ => None,
    };

    let (status, error) = match &forwarded {
        None => (StatusCode::OK, None),
        Some(outcome) if outcome.is_success() => (StatusCode::OK, None),
        Some(outcome) if outcome.is_queued() => (StatusCode::ACCEPTED, None),
        Some(outcome) => match outcome.failure() {
            Some(failure) if failure.kind == ErrorKind::CircuitBreakerOpen => {
                (StatusCode::SERVICE_UNAVAILABLE, Some(RelayError::CircuitOpen))
            },
            failure => {
                let error = RelayError::DeliveryFailed {
                    kind: failure.map_or(ErrorKind::Unknown, |f| f.kind).to_string(),
                    attempts: outcome.attempts(),
                };
                (StatusCode::BAD_GATEWAY, Some(error))
            },
        },
    };

    let message = match status {
        StatusCode::OK if forwarded.is_some() => "Lead processed and forwarded",
        StatusCode::OK => "Lead processed",
        StatusCode::ACCEPTED => "Lead processed; delivery failed and was queued for retry",
        _ => "Lead processed; delivery failed",
    };

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(status = status.as_u16(), duration_ms, "webhook handled");

    let response = WebhookResponse {
        success: status == StatusCode::OK,
        message: message.to_string(),
        request_id: request_id.to_string(),
        source: source.to_string(),
        duration_ms,
        data: MappedSummary {
            mapped: result.metadata.mapped_fields,
            warnings: result.metadata.warnings,
            score: assessment.score,
            priority: assessment.priority,
        },
        forwarded,
        error: error.map(|e| ErrorDetail { code: e.code().to_string(), message: e.to_string() }),
    };

    (status, Json(response)).into_response()
}
