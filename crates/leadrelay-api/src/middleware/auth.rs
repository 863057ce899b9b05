//! Bearer token check for operator routes.
//!
//! Clearing the queue, reprocessing it and resetting metrics change relay
//! state, so they need `Authorization: Bearer <admin token>`. Tokens are
//! compared by SHA-256 digest.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use leadrelay_core::RelayError;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{handlers::error_response, AppState};

/// Extracts the token from `Authorization: Bearer <token>`.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

fn check(headers: &HeaderMap, expected: Option<&str>) -> Result<(), RelayError> {
    let Some(expected) = expected else {
        return Err(RelayError::Unauthorized { reason: "no admin token configured".into() });
    };
    let presented = extract_bearer(headers).ok_or_else(|| RelayError::Unauthorized {
        reason: "missing bearer token".into(),
    })?;
    if token_matches(presented, expected) {
        Ok(())
    } else {
        Err(RelayError::Unauthorized { reason: "invalid bearer token".into() })
    }
}

/// Rejects requests without the configured admin token.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(error) = check(req.headers(), state.settings.admin_token.as_deref()) {
        warn!(path = %req.uri().path(), error = %error, "operator request refused");
        return error_response(&error);
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn bearer(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extract_bearer_token() {
        assert_eq!(extract_bearer(&bearer("Bearer ops-token")), Some("ops-token"));
        assert_eq!(extract_bearer(&bearer("Basic b3BzOnRva2Vu")), None);
        assert_eq!(extract_bearer(&bearer("Bearer ")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn check_requires_matching_token() {
        assert!(check(&bearer("Bearer ops-token"), Some("ops-token")).is_ok());

        let wrong = check(&bearer("Bearer nope"), Some("ops-token")).unwrap_err();
        assert_eq!(wrong.code(), "E1007");
        assert!(check(&HeaderMap::new(), Some("ops-token")).is_err());
    }

    #[test]
    fn unconfigured_token_refuses_everything() {
        let err = check(&bearer("Bearer anything"), None).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
