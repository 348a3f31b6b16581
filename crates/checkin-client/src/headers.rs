//! Header acquisition for the remote check-in API.
//!
//! The ready-check only needs the public "basic" headers. The commit request may
//! need headers captured by an external browser session; those are supplied by
//! the operator and layered over the basic set by [`StaticHeaderProvider`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use checkin_core::Reservation;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Ordered header name → value map. Opaque to the race and the committer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet(BTreeMap<String, String>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries from `other` win on conflicts.
    pub fn merged_with(mut self, other: &HeaderSet) -> Self {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn to_header_map(&self) -> Result<HeaderMap, ClientError> {
        let mut map = HeaderMap::with_capacity(self.0.len());
        for (name, value) in &self.0 {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::InvalidHeader(name.to_string()))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl From<BTreeMap<String, String>> for HeaderSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut set = HeaderSet::new();
        for (k, v) in map {
            set.insert(k, v);
        }
        set
    }
}

/// Source of authenticated headers for a reservation.
///
/// Implementations may be slow (browser automation); callers only await the result.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn headers(&self, reservation: &Reservation) -> Result<HeaderSet, ClientError>;
}

/// Builds the public mobile-web headers from the API key published in `config.js`.
///
/// The key is scraped again on every call so a rotated key is picked up by
/// the next check-in.
pub struct BasicHeaderProvider {
    client: reqwest::Client,
    config_js_url: String,
    channel_id: String,
}

impl BasicHeaderProvider {
    pub fn new(client: reqwest::Client, config_js_url: String, channel_id: String) -> Self {
        Self {
            client,
            config_js_url,
            channel_id,
        }
    }

    async fn fetch_api_key(&self) -> Result<String, ClientError> {
        debug!(url = %self.config_js_url, "fetching API key");
        let resp = self.client.get(&self.config_js_url).send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status,
                message: text,
            });
        }
        let body = resp.text().await?;
        parse_api_key(&body)
            .ok_or_else(|| ClientError::Parse("API_KEY not found in config.js".into()))
    }
}

#[async_trait]
impl HeaderProvider for BasicHeaderProvider {
    fn name(&self) -> &str {
        "basic"
    }

    async fn headers(&self, _reservation: &Reservation) -> Result<HeaderSet, ClientError> {
        let api_key = self.fetch_api_key().await?;
        Ok(basic_headers(&api_key, &self.channel_id))
    }
}

/// Operator-supplied headers layered over another provider's output.
pub struct StaticHeaderProvider {
    headers: HeaderSet,
    base: Arc<dyn HeaderProvider>,
}

impl StaticHeaderProvider {
    pub fn layered_over(headers: HeaderSet, base: Arc<dyn HeaderProvider>) -> Self {
        Self { headers, base }
    }
}

#[async_trait]
impl HeaderProvider for StaticHeaderProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn headers(&self, reservation: &Reservation) -> Result<HeaderSet, ClientError> {
        match self.base.headers(reservation).await {
            Ok(basic) => Ok(basic.merged_with(&self.headers)),
            Err(e) => {
                warn!(
                    provider = %self.base.name(),
                    error = %e,
                    "base headers unavailable, using static set only"
                );
                Ok(self.headers.clone())
            }
        }
    }
}

pub fn basic_headers(api_key: &str, channel_id: &str) -> HeaderSet {
    let mut set = HeaderSet::new();
    set.insert("content-type", "application/json");
    set.insert("accept", "*/*");
    set.insert("x-api-key", api_key);
    set.insert(
        "x-user-experience-id",
        uuid::Uuid::new_v4().to_string().to_uppercase(),
    );
    set.insert("x-channel-id", channel_id);
    set
}

/// Extract the value of `API_KEY:"..."` from the mobile site's config script.
pub fn parse_api_key(script: &str) -> Option<String> {
    const MARKER: &str = "API_KEY:\"";
    let start = script.find(MARKER)? + MARKER.len();
    let rest = &script[start..];
    let end = rest.find('"')?;
    let key = &rest[..end];
    if key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(key.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl HeaderProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        async fn headers(&self, _r: &Reservation) -> Result<HeaderSet, ClientError> {
            Err(ClientError::Parse("no key".into()))
        }
    }

    struct FixedProvider(HeaderSet);

    #[async_trait]
    impl HeaderProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn headers(&self, _r: &Reservation) -> Result<HeaderSet, ClientError> {
            Ok(self.0.clone())
        }
    }

    fn reservation() -> Reservation {
        Reservation::new("ABC123", "Ada", "Lovelace")
    }

    #[test]
    fn api_key_is_scraped_from_config_js() {
        let js = r#"var a={ENV:"prod",API_KEY:"l7xx0a43088fe6254712b10787646d1b298e",OTHER:"x"};"#;
        assert_eq!(
            parse_api_key(js).as_deref(),
            Some("l7xx0a43088fe6254712b10787646d1b298e")
        );
        assert!(parse_api_key("var a = {};").is_none());
        assert!(parse_api_key(r#"API_KEY:"bad key""#).is_none());
    }

    #[test]
    fn basic_headers_have_fresh_experience_id() {
        let a = basic_headers("k", "MWEB");
        let b = basic_headers("k", "MWEB");
        assert_eq!(a.get("X-API-Key"), Some("k"));
        assert_eq!(a.get("x-channel-id"), Some("MWEB"));
        assert_ne!(a.get("x-user-experience-id"), b.get("x-user-experience-id"));
    }

    #[test]
    fn header_set_converts_and_rejects_bad_names() {
        let mut set = HeaderSet::new();
        set.insert("X-Api-Key", "abc");
        assert_eq!(set.to_header_map().unwrap().get("x-api-key").unwrap(), "abc");

        set.insert("bad header", "v");
        assert!(set.to_header_map().is_err());
    }

    #[tokio::test]
    async fn static_headers_override_base() {
        let mut base = HeaderSet::new();
        base.insert("x-api-key", "basic");
        base.insert("accept", "*/*");
        let mut extra = HeaderSet::new();
        extra.insert("x-api-key", "captured");
        extra.insert("ee30zvqlwf-a", "token");

        let provider =
            StaticHeaderProvider::layered_over(extra, Arc::new(FixedProvider(base)));
        let headers = provider.headers(&reservation()).await.unwrap();
        assert_eq!(headers.get("x-api-key"), Some("captured"));
        assert_eq!(headers.get("accept"), Some("*/*"));
        assert_eq!(headers.get("EE30ZVQLWF-A"), Some("token"));
    }

    #[tokio::test]
    async fn static_headers_survive_base_failure() {
        let mut extra = HeaderSet::new();
        extra.insert("x-api-key", "captured");
        let provider = StaticHeaderProvider::layered_over(extra, Arc::new(FailingProvider));
        let headers = provider.headers(&reservation()).await.unwrap();
        assert_eq!(headers.len(), 1);
    }
}
