use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_NAMESPACE: &str = "checkin-";
pub const DEFAULT_CADENCE_MS: u64 = 250;
pub const DEFAULT_ATTEMPT_LIMIT: u32 = 80; // ~20 s of coverage at the default cadence
pub const DEFAULT_EARLY_START_SECS: u64 = 5; // tolerate remote clock skew
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_BASE_URL: &str = "https://mobile.southwest.com/api";
pub const DEFAULT_CONFIG_JS_URL: &str = "https://mobile.southwest.com/js/config.js";
pub const DEFAULT_OPENFLIGHTS_URL: &str = "https://openflights.org/php/apsearch.php";

/// Top-level config (checkin.toml + CHECKIN_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckinConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub timezones: TimezoneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret expected in the `token` request header. `None` disables auth.
    pub auth_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Prefix shared by every trigger key; scopes listing and dedup.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// How often the dispatcher looks for due triggers.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Tuning for the ready-check race and the wait before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    #[serde(default = "default_attempt_limit")]
    pub attempt_limit: u32,
    /// Start probing this many seconds before the nominal check-in instant.
    #[serde(default = "default_early_start_secs")]
    pub early_start_secs: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            cadence_ms: DEFAULT_CADENCE_MS,
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
            early_start_secs: DEFAULT_EARLY_START_SECS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }
}

/// Fixed-backoff retry policy for reservation and timezone lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Page the public API key is scraped from.
    #[serde(default = "default_config_js_url")]
    pub config_js_url: String,
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
    /// Headers captured by an external browser session, used for the commit request.
    /// Empty means the basic headers are used for both ready-check and commit.
    #[serde(default)]
    pub commit_headers: BTreeMap<String, String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            config_js_url: default_config_js_url(),
            channel_id: default_channel_id(),
            commit_headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneConfig {
    #[serde(default = "default_openflights_url")]
    pub openflights_url: String,
    /// Airport code → IANA zone, consulted before any remote lookup.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            openflights_url: default_openflights_url(),
            overrides: BTreeMap::new(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_cadence_ms() -> u64 {
    DEFAULT_CADENCE_MS
}
fn default_attempt_limit() -> u32 {
    DEFAULT_ATTEMPT_LIMIT
}
fn default_early_start_secs() -> u64 {
    DEFAULT_EARLY_START_SECS
}
fn default_heartbeat_secs() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_config_js_url() -> String {
    DEFAULT_CONFIG_JS_URL.to_string()
}
fn default_channel_id() -> String {
    "MWEB".to_string()
}
fn default_openflights_url() -> String {
    DEFAULT_OPENFLIGHTS_URL.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.checkin/checkin.db", home)
}

impl CheckinConfig {
    /// Load config from a TOML file with CHECKIN_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g. `CHECKIN_RACE__CADENCE_MS=200`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CheckinConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CHECKIN_").split("__"))
            .extract()
            .map_err(|e| crate::error::CheckinError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the race or the dispatcher degenerate.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CheckinError;

        if self.race.cadence_ms == 0 {
            return Err(CheckinError::Config("race.cadence_ms must be > 0".into()));
        }
        if self.race.attempt_limit == 0 {
            return Err(CheckinError::Config("race.attempt_limit must be > 0".into()));
        }
        if self.scheduler.poll_interval_ms == 0 {
            return Err(CheckinError::Config(
                "scheduler.poll_interval_ms must be > 0".into(),
            ));
        }
        if self.lookup.retry_attempts == 0 {
            return Err(CheckinError::Config(
                "lookup.retry_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.checkin/checkin.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recommended_race_tuning() {
        let config = CheckinConfig::default();
        assert_eq!(config.race.cadence_ms, 250);
        assert_eq!(config.race.attempt_limit, 80);
        assert_eq!(config.race.early_start_secs, 5);
        assert_eq!(config.scheduler.namespace, "checkin-");
        assert!(config.gateway.auth_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: CheckinConfig = Figment::new()
            .merge(Toml::string(
                r#"
                [race]
                cadence_ms = 100

                [timezones.overrides]
                DEN = "America/Denver"
                "#,
            ))
            .extract()
            .unwrap();
        assert_eq!(config.race.cadence_ms, 100);
        assert_eq!(config.race.attempt_limit, 80);
        assert_eq!(config.gateway.port, DEFAULT_PORT);
        assert_eq!(
            config.timezones.overrides.get("DEN").map(String::as_str),
            Some("America/Denver")
        );
    }

    #[test]
    fn zero_attempt_limit_is_rejected() {
        let mut config = CheckinConfig::default();
        config.race.attempt_limit = 0;
        assert!(config.validate().is_err());
    }
}
