//! Shared-token authentication for the `/v1` API.
//!
//! When `gateway.auth_token` is configured every request must carry it in the
//! `token` header. Without a configured token the API is open, which is only
//! sensible on a loopback bind.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::app::AppState;

pub const TOKEN_HEADER: &str = "token";

pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.config.gateway.auth_token.as_deref() {
        if let Err(reason) = verify_token(request.headers(), expected) {
            warn!(path = %request.uri().path(), reason = %reason, "request rejected");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"code": "unauthorized", "message": reason}})),
            )
                .into_response();
        }
    }
    next.run(request).await
}

fn verify_token(headers: &HeaderMap, expected: &str) -> Result<(), String> {
    let presented = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing token header".to_string())?;

    if presented.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err("token mismatch".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_must_match_exactly() {
        let mut headers = HeaderMap::new();
        assert!(verify_token(&headers, "s3cret").is_err());
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("s3cre"));
        assert!(verify_token(&headers, "s3cret").is_err());
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("s3cret!"));
        assert!(verify_token(&headers, "s3cret").is_err());
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("s3creT"));
        assert!(verify_token(&headers, "s3cret").is_err());
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(verify_token(&headers, "s3cret").is_ok());
    }
}
