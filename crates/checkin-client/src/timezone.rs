use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ClientError;

/// Airport code → IANA timezone name.
#[async_trait]
pub trait TimezoneResolver: Send + Sync {
    async fn resolve(&self, airport_code: &str) -> Result<String, ClientError>;
}

/// Looks airports up through the OpenFlights search endpoint.
pub struct OpenFlightsResolver {
    client: reqwest::Client,
    url: String,
}

impl OpenFlightsResolver {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TimezoneResolver for OpenFlightsResolver {
    async fn resolve(&self, airport_code: &str) -> Result<String, ClientError> {
        let code = normalize_code(airport_code)?;
        let form = [
            ("iata", code.as_str()),
            ("country", "ALL"),
            ("db", "airports"),
            ("iatafilter", "true"),
            ("action", "SEARCH"),
            ("offset", "0"),
        ];

        debug!(airport = %code, "resolving airport timezone");

        let resp = self.client.post(&self.url).form(&form).send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status,
                message: text,
            });
        }
        let text = resp.text().await?;
        parse_openflights(&code, &text)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    airports: Vec<AirportRow>,
}

#[derive(Debug, Deserialize)]
struct AirportRow {
    tz_id: Option<String>,
}

pub fn parse_openflights(code: &str, body: &str) -> Result<String, ClientError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| ClientError::Parse(e.to_string()))?;
    parsed
        .airports
        .into_iter()
        .next()
        .and_then(|row| row.tz_id)
        .filter(|tz| !tz.trim().is_empty())
        .ok_or_else(|| ClientError::NotFound(format!("timezone for airport {code}")))
}

/// Checks configured overrides, then a process-wide cache, then the inner resolver.
pub struct CachedTimezoneResolver {
    inner: Arc<dyn TimezoneResolver>,
    overrides: BTreeMap<String, String>,
    cache: DashMap<String, String>,
}

impl CachedTimezoneResolver {
    pub fn new(inner: Arc<dyn TimezoneResolver>, overrides: BTreeMap<String, String>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(code, tz)| (code.to_ascii_uppercase(), tz))
            .collect();
        Self {
            inner,
            overrides,
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl TimezoneResolver for CachedTimezoneResolver {
    async fn resolve(&self, airport_code: &str) -> Result<String, ClientError> {
        let code = normalize_code(airport_code)?;
        if let Some(tz) = self.overrides.get(&code) {
            return Ok(tz.clone());
        }
        if let Some(tz) = self.cache.get(&code) {
            return Ok(tz.value().clone());
        }
        let tz = self.inner.resolve(&code).await?;
        info!(airport = %code, timezone = %tz, "airport timezone resolved");
        self.cache.insert(code, tz.clone());
        Ok(tz)
    }
}

fn normalize_code(airport_code: &str) -> Result<String, ClientError> {
    let code = airport_code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ClientError::Parse(format!(
            "invalid airport code: {airport_code:?}"
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingResolver {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TimezoneResolver for CountingResolver {
        async fn resolve(&self, _code: &str) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("America/Chicago".to_string())
        }
    }

    #[test]
    fn openflights_first_airport_wins() {
        let body = r#"{"status":1,"airports":[{"iata":"DEN","tz_id":"America/Denver"},{"tz_id":"UTC"}]}"#;
        assert_eq!(parse_openflights("DEN", body).unwrap(), "America/Denver");
    }

    #[test]
    fn openflights_empty_result_is_not_found() {
        let err = parse_openflights("ZZZ", r#"{"status":0,"airports":[]}"#).unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn cache_and_overrides_skip_remote() {
        let inner = Arc::new(CountingResolver {
            calls: AtomicU32::new(0),
        });
        let mut overrides = BTreeMap::new();
        overrides.insert("den".to_string(), "America/Denver".to_string());
        let resolver = CachedTimezoneResolver::new(inner.clone(), overrides);

        assert_eq!(resolver.resolve("DEN").await.unwrap(), "America/Denver");
        assert_eq!(resolver.resolve("mdw").await.unwrap(), "America/Chicago");
        assert_eq!(resolver.resolve("MDW").await.unwrap(), "America/Chicago");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_codes_are_rejected() {
        let resolver = CachedTimezoneResolver::new(
            Arc::new(CountingResolver {
                calls: AtomicU32::new(0),
            }),
            BTreeMap::new(),
        );
        assert!(resolver.resolve("DENVER").await.is_err());
        assert!(resolver.resolve("").await.is_err());
    }
}
