pub mod checkins;
pub mod health;

use axum::{http::StatusCode, Json};
use checkin_core::CheckinError;
use serde_json::{json, Value};
use tracing::{error, warn};

pub type ApiError = (StatusCode, Json<Value>);

/// Map a domain error to its HTTP status and `{"error": {code, message}}` body.
pub fn error_response(err: &CheckinError) -> ApiError {
    let status = match err {
        CheckinError::Validation(_)
        | CheckinError::MalformedDate { .. }
        | CheckinError::NoEligibleLegs { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CheckinError::Lookup(_) | CheckinError::TimezoneResolution { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(code = err.code(), "request failed: {err}");
    } else {
        warn!(code = err.code(), "request rejected: {err}");
    }
    (
        status,
        Json(json!({"error": {"code": err.code(), "message": err.to_string()}})),
    )
}
