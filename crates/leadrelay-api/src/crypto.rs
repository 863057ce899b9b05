//! HMAC-SHA256 signatures for inbound webhooks.
//!
//! Lead sources sign the raw request body with a shared secret and send the
//! result in one of several headers, either as `sha256=<hex>` or as bare hex.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Headers probed for a signature, in order.
pub const SIGNATURE_HEADERS: [&str; 3] =
    ["x-webhook-signature", "x-hub-signature-256", "x-signature"];

/// Signature validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No signature header was sent.
    #[error("signature header missing")]
    Missing,

    /// The header value is not hex of the right length.
    #[error("invalid signature format: {0}")]
    InvalidFormat(String),

    /// The signature does not match the body.
    #[error("signature mismatch")]
    Mismatch,

    /// The configured secret is empty.
    #[error("secret key is empty")]
    EmptySecret,
}

/// Signs `body` with `secret`, returning `sha256=<hex>`.
///
/// # Example
///
/// ```
/// use leadrelay_api::crypto::{sign, verify_signature};
///
/// let signature = sign(b"{\"email\":\"a@b.co\"}", "secret");
/// assert!(signature.starts_with("sha256="));
/// assert!(verify_signature(b"{\"email\":\"a@b.co\"}", &signature, "secret").is_ok());
/// ```
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = keyed(secret.as_bytes());
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Checks a signature header value against the body.
///
/// The comparison is constant time.
///
/// # Errors
///
/// Returns [`SignatureError`] when the secret is empty, the value is not a
/// 32-byte hex digest, or the digest does not match.
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }

    let digest = parse_signature(signature)?;
    let mut mac = keyed(secret.as_bytes());
    mac.update(body);
    mac.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
}

/// Returns the first non-empty signature header, if any.
pub fn signature_from_headers(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn parse_signature(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let hex_part = signature.trim();
    let hex_part = hex_part.strip_prefix("sha256=").unwrap_or(hex_part);

    if hex_part.len() != 64 {
        return Err(SignatureError::InvalidFormat(format!(
            "expected 64 hex characters, got {}",
            hex_part.len()
        )));
    }

    hex::decode(hex_part).map_err(|e| SignatureError::InvalidFormat(e.to_string()))
}

fn keyed(secret: &[u8]) -> HmacSha256 {
    match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    }
}
