use async_trait::async_trait;
use checkin_core::{LegDeparture, Reservation};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ProbeFailure};
use crate::headers::HeaderSet;

const READY_CHECK_PATH: &str = "mobile-air-operations/v1/mobile-air-operations/page/check-in";
const VIEW_RESERVATION_PATH: &str =
    "mobile-air-booking/v1/mobile-air-booking/page/view-reservation";

/// Max characters of a remote error body kept in logs and errors.
const MAX_MESSAGE_CHARS: usize = 300;

/// The exact request needed to finalize check-in, as handed out by the ready-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinAction {
    /// Path under `/mobile-air-operations`, always starting with `/`.
    pub href: String,
    pub body: Value,
}

/// Structurally valid ready-check response. Consumed once by the committer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyData {
    pub action: CheckinAction,
    pub page: Value,
}

/// Successful commit response page.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitResult {
    pub page: Value,
}

/// Remote check-in endpoint.
#[async_trait]
pub trait CheckinApi: Send + Sync {
    /// One readiness probe. Never retried internally.
    async fn ready_check(
        &self,
        reservation: &Reservation,
        headers: &HeaderSet,
    ) -> Result<ReadyData, ProbeFailure>;

    /// The single finalizing request.
    async fn commit(
        &self,
        action: &CheckinAction,
        headers: &HeaderSet,
    ) -> Result<CommitResult, ClientError>;
}

/// Reservation lookup: the departures of every leg on a booking.
#[async_trait]
pub trait ReservationLookup: Send + Sync {
    async fn lookup_legs(
        &self,
        reservation: &Reservation,
    ) -> Result<Vec<LegDeparture>, ClientError>;
}

/// reqwest-backed client for the mobile check-in API.
pub struct SouthwestClient {
    client: reqwest::Client,
    base_url: String,
    headers: std::sync::Arc<dyn crate::headers::HeaderProvider>,
}

impl SouthwestClient {
    /// `headers` is used for reservation lookups; probes and commits take theirs per call.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        headers: std::sync::Arc<dyn crate::headers::HeaderProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers,
        }
    }

    /// `{base}/{path}/{confirmation}?first-name=..&last-name=..`
    fn reservation_url(&self, path: &str, reservation: &Reservation) -> Result<Url, String> {
        let mut url =
            Url::parse(&format!("{}/{}", self.base_url, path)).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| "base URL cannot have path segments".to_string())?
            .push(&reservation.confirmation_code);
        url.query_pairs_mut()
            .append_pair("first-name", &reservation.first_name)
            .append_pair("last-name", &reservation.last_name);
        Ok(url)
    }
}

#[async_trait]
impl CheckinApi for SouthwestClient {
    async fn ready_check(
        &self,
        reservation: &Reservation,
        headers: &HeaderSet,
    ) -> Result<ReadyData, ProbeFailure> {
        let url = self
            .reservation_url(READY_CHECK_PATH, reservation)
            .map_err(ProbeFailure::Transport)?;
        let header_map = headers
            .to_header_map()
            .map_err(|e| ProbeFailure::Transport(e.to_string()))?;

        let resp = self
            .client
            .get(url)
            .headers(header_map)
            .send()
            .await
            .map_err(|e| ProbeFailure::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProbeFailure::NotReady {
                status,
                message: truncate_message(&text),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProbeFailure::Malformed(e.to_string()))?;
        parse_ready_data(body).map_err(ProbeFailure::Malformed)
    }

    async fn commit(
        &self,
        action: &CheckinAction,
        headers: &HeaderSet,
    ) -> Result<CommitResult, ClientError> {
        let url = format!("{}/mobile-air-operations{}", self.base_url, action.href);

        info!(href = %action.href, "posting check-in");

        let resp = self
            .client
            .post(&url)
            .headers(headers.to_header_map()?)
            .json(&action.body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %truncate_message(&text), "check-in commit rejected");
            return Err(ClientError::Api {
                status,
                message: truncate_message(&text),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        let page = extract_page(&body)
            .cloned()
            .ok_or_else(|| ClientError::Parse("commit response has no page object".into()))?;
        Ok(CommitResult { page })
    }
}

#[async_trait]
impl ReservationLookup for SouthwestClient {
    async fn lookup_legs(
        &self,
        reservation: &Reservation,
    ) -> Result<Vec<LegDeparture>, ClientError> {
        let url = self
            .reservation_url(VIEW_RESERVATION_PATH, reservation)
            .map_err(ClientError::Parse)?;
        let headers = self.headers.headers(reservation).await?;

        debug!(confirmation = %reservation.confirmation_code, "looking up reservation");

        let resp = self
            .client
            .get(url)
            .headers(headers.to_header_map()?)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 404 {
            return Err(ClientError::NotFound(reservation.confirmation_code.clone()));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status,
                message: truncate_message(&text),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        parse_bounds(&body)
    }
}

/// Responses wrap their payload in a single `*Page` object (e.g. `checkInViewReservationPage`).
pub fn extract_page(body: &Value) -> Option<&Value> {
    body.as_object()?
        .iter()
        .find(|(key, _)| key.ends_with("Page"))
        .map(|(_, value)| value)
}

/// Validate a ready-check body: the page must carry `_links.checkIn.{href, body}`.
pub fn parse_ready_data(body: Value) -> Result<ReadyData, String> {
    let page = extract_page(&body)
        .cloned()
        .ok_or_else(|| "response has no page object".to_string())?;

    let link = page
        .get("_links")
        .and_then(|links| links.get("checkIn"))
        .ok_or_else(|| "page has no _links.checkIn".to_string())?;

    let href = link
        .get("href")
        .and_then(Value::as_str)
        .filter(|href| href.starts_with('/'))
        .ok_or_else(|| "checkIn.href missing or not an absolute path".to_string())?
        .to_string();

    let action_body = link
        .get("body")
        .filter(|b| b.is_object())
        .cloned()
        .ok_or_else(|| "checkIn.body missing or not an object".to_string())?;

    Ok(ReadyData {
        action: CheckinAction {
            href,
            body: action_body,
        },
        page,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bound {
    departure_airport: Airport,
    departure_date: String,
    departure_time: String,
}

#[derive(Debug, Deserialize)]
struct Airport {
    code: String,
}

pub fn parse_bounds(body: &Value) -> Result<Vec<LegDeparture>, ClientError> {
    let page = extract_page(body)
        .ok_or_else(|| ClientError::Parse("reservation response has no page object".into()))?;
    let bounds = page
        .get("bounds")
        .cloned()
        .ok_or_else(|| ClientError::Parse("reservation page has no bounds".into()))?;
    let bounds: Vec<Bound> =
        serde_json::from_value(bounds).map_err(|e| ClientError::Parse(e.to_string()))?;

    Ok(bounds
        .into_iter()
        .map(|b| LegDeparture {
            departure_airport_code: b.departure_airport.code,
            departure_date: b.departure_date,
            departure_time: b.departure_time,
        })
        .collect())
}

fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
    out.push('…');
    out
}
