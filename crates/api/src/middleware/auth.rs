//! Credential extractor for the prediction service.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use imagerelay_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Prediction-service token supplied by the caller.
///
/// Read from the `Authorization` header (`Bearer <token>` or
/// `Token <token>`). When the header is absent the server-configured
/// token is used, if there is one; otherwise the request is rejected with
/// `MISSING_CREDENTIAL`.
#[derive(Clone)]
pub struct ReplicateToken(pub String);

impl std::fmt::Debug for ReplicateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReplicateToken(<redacted>)")
    }
}

impl FromRequestParts<AppState> for ReplicateToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        if let Some(token) = header.and_then(parse_authorization) {
            return Ok(ReplicateToken(token.to_string()));
        }

        state
            .config
            .replicate
            .api_token
            .clone()
            .map(ReplicateToken)
            .ok_or_else(|| {
                AppError::Core(CoreError::MissingCredential(
                    "Missing Authorization header. Expected: Bearer <replicate token>".into(),
                ))
            })
    }
}

/// Pull the token out of an `Authorization` value. Accepts `Bearer` and
/// `Token` schemes (case-insensitive) or a bare token.
pub fn parse_authorization(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if is_scheme(scheme) => rest.trim(),
        Some(_) => return None,
        None if is_scheme(value) => return None,
        None => value,
    };
    (!token.is_empty()).then_some(token)
}

/// A scheme with no credential after it, e.g. `Bearer` once trailing
/// whitespace has been stripped from the header.
fn is_scheme(value: &str) -> bool {
    value.eq_ignore_ascii_case("bearer") || value.eq_ignore_ascii_case("token")
}
