//! Check-in scheduling endpoints.
//!
//! `PUT /v1/checkin-service/checkin` schedules every remaining leg of a
//! reservation; `GET /v1/checkin-service/users/{user_id}/checkins` lists what
//! is scheduled for a user.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use checkin_core::{CheckinError, Reservation};
use checkin_scheduler::{LegReport, LegStatus, Trigger, TriggerStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{error_response, ApiError};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckinRequest {
    pub data: CheckinRequestData,
}

#[derive(Debug, Deserialize)]
pub struct CheckinRequestData {
    pub user_id: String,
    #[serde(flatten)]
    pub reservation: Reservation,
}

#[derive(Debug, Serialize)]
struct LegView<'a> {
    departure_airport_code: &'a str,
    departure_local: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    timezone: &'a str,
    #[serde(flatten)]
    status: &'a LegStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkin_available_epoch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkin_boot_epoch: Option<i64>,
}

impl<'a> From<&'a LegReport> for LegView<'a> {
    fn from(report: &'a LegReport) -> Self {
        Self {
            departure_airport_code: &report.leg.departure_airport_code,
            departure_local: &report.leg.departure_local,
            timezone: &report.leg.timezone,
            status: &report.status,
            checkin_available_epoch: report.window.map(|w| w.available_epoch()),
            checkin_boot_epoch: report.window.map(|w| w.boot_epoch()),
        }
    }
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

#[derive(Debug, Serialize)]
struct TriggerView<'a> {
    confirmation_number: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    status: TriggerStatus,
    departure_timezone: &'a str,
    checkin_available_epoch: i64,
    checkin_boot_epoch: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'a str>,
}

impl<'a> From<&'a Trigger> for TriggerView<'a> {
    fn from(trigger: &'a Trigger) -> Self {
        let reservation = &trigger.payload.reservation;
        Self {
            confirmation_number: &reservation.confirmation_code,
            first_name: &reservation.first_name,
            last_name: &reservation.last_name,
            status: trigger.status,
            departure_timezone: &trigger.payload.departure_timezone,
            checkin_available_epoch: trigger.payload.checkin_available_epoch,
            checkin_boot_epoch: trigger.fire_at.timestamp(),
            last_error: trigger.last_error.as_deref(),
        }
    }
}

/// PUT /v1/checkin-service/checkin
pub async fn schedule_checkin(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CheckinRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) =
        body.map_err(|e| error_response(&CheckinError::Validation(e.body_text())))?;
    let CheckinRequestData {
        user_id,
        reservation,
    } = request.data;

    info!(
        user_id = %user_id,
        confirmation = %reservation.confirmation_code,
        "check-in requested"
    );

    let reports = state
        .scheduler
        .schedule_reservation(&user_id, &reservation)
        .await
        .map_err(|e| error_response(&CheckinError::from(e)))?;

    let legs: Vec<LegView<'_>> = reports.iter().map(LegView::from).collect();
    Ok(Json(json!({"data": {"legs": legs}})))
}

/// GET /v1/checkin-service/users/{user_id}/checkins
pub async fn list_checkins(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let triggers = state
        .scheduler
        .list_for_user(&user_id)
        .map_err(|e| error_response(&CheckinError::from(e)))?;
    let data: Vec<TriggerView<'_>> = triggers.iter().map(TriggerView::from).collect();
    Ok(Json(json!({"data": data})))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use checkin_client::{ClientError, ReservationLookup, RetryPolicy, TimezoneResolver};
    use checkin_core::config::CheckinConfig;
    use checkin_core::{LegDeparture, Reservation};
    use checkin_scheduler::{SqliteTriggerStore, TriggerKeyBuilder, TriggerScheduler};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::app::{build_router, AppState};

    enum Lookup {
        Legs(Vec<LegDeparture>),
        Down,
    }

    #[async_trait]
    impl ReservationLookup for Lookup {
        async fn lookup_legs(&self, _r: &Reservation) -> Result<Vec<LegDeparture>, ClientError> {
            match self {
                Lookup::Legs(legs) => Ok(legs.clone()),
                Lookup::Down => Err(ClientError::Api {
                    status: 503,
                    message: "maintenance".into(),
                }),
            }
        }
    }

    struct UtcZone;

    #[async_trait]
    impl TimezoneResolver for UtcZone {
        async fn resolve(&self, _code: &str) -> Result<String, ClientError> {
            Ok("UTC".into())
        }
    }

    struct AustinOnly;

    #[async_trait]
    impl TimezoneResolver for AustinOnly {
        async fn resolve(&self, code: &str) -> Result<String, ClientError> {
            match code {
                "AUS" => Ok("UTC".into()),
                other => Err(ClientError::NotFound(format!("timezone for airport {other}"))),
            }
        }
    }

    fn leg_in(offset: Duration) -> LegDeparture {
        leg_at("AUS", offset)
    }

    fn leg_at(code: &str, offset: Duration) -> LegDeparture {
        let at = Utc::now() + offset;
        LegDeparture {
            departure_airport_code: code.into(),
            departure_date: at.format("%Y-%m-%d").to_string(),
            departure_time: at.format("%H:%M").to_string(),
        }
    }

    fn router(lookup: Lookup, auth_token: Option<&str>) -> Router {
        router_with_zones(lookup, auth_token, Arc::new(UtcZone))
    }

    fn router_with_zones(
        lookup: Lookup,
        auth_token: Option<&str>,
        timezones: Arc<dyn TimezoneResolver>,
    ) -> Router {
        let mut config = CheckinConfig::default();
        config.gateway.auth_token = auth_token.map(String::from);
        let store =
            SqliteTriggerStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap();
        let scheduler = TriggerScheduler::new(
            Arc::new(store),
            Arc::new(lookup),
            timezones,
            TriggerKeyBuilder::new(config.scheduler.namespace.clone()),
            RetryPolicy::once(),
        );
        build_router(Arc::new(AppState::new(config, scheduler)))
    }

    fn checkin_request(body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("PUT")
            .uri("/v1/checkin-service/checkin")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("token", token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn valid_body() -> Value {
        json!({"data": {
            "user_id": "u1",
            "confirmation_number": "ABC123",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }})
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn schedule_then_list() {
        let app = router(Lookup::Legs(vec![leg_in(Duration::days(3))]), None);

        let (status, body) = send(&app, checkin_request(valid_body(), None)).await;
        assert_eq!(status, StatusCode::OK);
        let legs = body["data"]["legs"].as_array().unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0]["status"], "added");
        assert_eq!(legs[0]["timezone"], "UTC");
        let available = legs[0]["checkin_available_epoch"].as_i64().unwrap();
        let boot = legs[0]["checkin_boot_epoch"].as_i64().unwrap();
        assert_eq!(available - boot, 300);

        let (_, again) = send(&app, checkin_request(valid_body(), None)).await;
        assert_eq!(again["data"]["legs"][0]["status"], "already_scheduled");

        let list = Request::builder()
            .uri("/v1/checkin-service/users/u1/checkins")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, list).await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["confirmation_number"], "ABC123");
        assert_eq!(data[0]["status"], "pending");
        assert_eq!(data[0]["checkin_available_epoch"].as_i64(), Some(available));
    }

    #[tokio::test]
    async fn unknown_airport_is_reported_per_leg() {
        let legs = vec![
            leg_at("AUS", Duration::days(3)),
            leg_at("XYZ", Duration::days(4)),
        ];
        let app = router_with_zones(Lookup::Legs(legs), None, Arc::new(AustinOnly));

        let (status, body) = send(&app, checkin_request(valid_body(), None)).await;
        assert_eq!(status, StatusCode::OK);
        let legs = body["data"]["legs"].as_array().unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0]["status"], "added");
        assert_eq!(legs[1]["departure_airport_code"], "XYZ");
        assert_eq!(legs[1]["status"], "failed");
        assert!(legs[1]["error"].as_str().unwrap().contains("XYZ"));
        assert!(legs[1].get("timezone").is_none());
        assert!(legs[1].get("checkin_available_epoch").is_none());
    }

    #[tokio::test]
    async fn missing_fields_are_invalid_parameters() {
        let app = router(Lookup::Legs(vec![]), None);
        let body = json!({"data": {"user_id": "u1", "confirmation_number": "ABC123"}});
        let (status, body) = send(&app, checkin_request(body, None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "invalid_parameters");
    }

    #[tokio::test]
    async fn only_past_legs_is_reported_distinctly() {
        let app = router(Lookup::Legs(vec![leg_in(Duration::hours(3))]), None);
        let (status, body) = send(&app, checkin_request(valid_body(), None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "no_future_legs");
    }

    #[tokio::test]
    async fn lookup_outage_is_bad_gateway() {
        let app = router(Lookup::Down, None);
        let (status, body) = send(&app, checkin_request(valid_body(), None)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "lookup_failed");
    }

    #[tokio::test]
    async fn token_is_required_when_configured() {
        let app = router(Lookup::Legs(vec![leg_in(Duration::days(3))]), Some("s3cret"));

        let (status, _) = send(&app, checkin_request(valid_body(), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, checkin_request(valid_body(), Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, checkin_request(valid_body(), Some("s3cret"))).await;
        assert_eq!(status, StatusCode::OK);

        // Health stays open.
        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, health).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn bad_user_id_in_path_is_rejected() {
        let app = router(Lookup::Legs(vec![]), None);
        let list = Request::builder()
            .uri("/v1/checkin-service/users/no%20spaces/checkins")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, list).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "invalid_parameters");
    }
}
