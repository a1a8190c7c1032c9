//! API Middleware
//!
//! Session authentication and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::AppError;

use super::routes::AppState;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

const BEARER_PREFIX: &str = "Bearer ";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Token from `Authorization: Bearer <token>`.
///
/// `Ok(None)` when the header is absent; any other scheme or an empty token
/// is rejected rather than ignored.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let invalid = || AppError::InvalidHeader(AUTHORIZATION.to_string());

    let token = value
        .to_str()
        .map_err(|_| invalid())?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(invalid)?;
    Ok(Some(token))
}

// =========================================================================
// Session middleware
// =========================================================================

/// Resolve the bearer token into an [`OperationContext`].
///
/// The context carries the stored user and role; the core still re-verifies
/// it on every call. Unknown or expired tokens are rejected here. Requests
/// without a token pass through for the public routes.
/// `X-Correlation-Id` is propagated when valid, generated otherwise, and
/// echoed on the response.
///
/// [`OperationContext`]: crate::domain::OperationContext
pub async fn context_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let correlation_id = header_str(request.headers(), CORRELATION_HEADER)
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .unwrap_or_else(Uuid::new_v4);

    let token = bearer_token(request.headers())
        .map_err(IntoResponse::into_response)?
        .map(str::to_owned);

    if let Some(token) = token {
        let context = state
            .wallet
            .authenticate(&token)
            .await
            .map_err(|e| AppError::from(e).into_response())?;
        request
            .extensions_mut()
            .insert(context.with_correlation_id(correlation_id));
    }

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    Ok(response)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request logging middleware
// =========================================================================

/// Request logging middleware. Bodies are never logged.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let correlation_id = header_str(response.headers(), CORRELATION_HEADER).map(str::to_string);
    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        headers.insert("x-correlation-id", "abc-123".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let auth = masked.iter().find(|(k, _)| k == "authorization");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let correlation = masked.iter().find(|(k, _)| k == "x-correlation-id");

        assert_eq!(auth.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(correlation.unwrap().1, "abc-123");
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).unwrap().is_none());

        headers.insert(AUTHORIZATION, "Bearer abc123 ".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer ", "abc123"] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value.parse().unwrap());
            assert!(
                matches!(bearer_token(&headers), Err(AppError::InvalidHeader(_))),
                "{}",
                value
            );
        }
    }
}
