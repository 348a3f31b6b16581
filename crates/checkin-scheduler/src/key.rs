//! Deterministic trigger keys.
//!
//! Format: `{namespace}{user_id}-{digest}` where `digest` is the first 8 bytes,
//! hex encoded, of SHA-256 over the JSON array
//!
//! ```text
//! [FIRST_NAME, LAST_NAME, CONFIRMATION_CODE, available_at_epoch_seconds]
//! ```
//!
//! Text fields are trimmed and upper-cased (the remote treats them
//! case-insensitively) and the instant is truncated to whole seconds, so the
//! same leg always maps to the same key no matter how the caller spelled it.

use checkin_core::{CheckinError, Reservation};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::Result;

const DIGEST_BYTES: usize = 8;
const MAX_USER_ID_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct TriggerKeyBuilder {
    namespace: String,
}

impl TriggerKeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn build_key(
        &self,
        user_id: &str,
        reservation: &Reservation,
        available_at: DateTime<Utc>,
    ) -> Result<String> {
        let prefix = self.user_prefix(user_id)?;
        Ok(format!("{prefix}{}", leg_digest(reservation, available_at)?))
    }

    /// Every key for `user_id` starts with this string.
    pub fn user_prefix(&self, user_id: &str) -> Result<String> {
        validate_user_id(user_id)?;
        Ok(format!("{}{}-", self.namespace, user_id))
    }
}

pub fn validate_user_id(user_id: &str) -> Result<()> {
    let ok = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(CheckinError::Validation(format!(
            "user_id must be 1-{MAX_USER_ID_LEN} characters of [A-Za-z0-9._-]"
        ))
        .into())
    }
}

fn leg_digest(reservation: &Reservation, available_at: DateTime<Utc>) -> Result<String> {
    let fields = (
        normalize(&reservation.first_name),
        normalize(&reservation.last_name),
        normalize(&reservation.confirmation_code),
        available_at.timestamp(),
    );
    let encoded = serde_json::to_string(&fields).map_err(CheckinError::from)?;
    let digest = Sha256::digest(encoded.as_bytes());
    Ok(hex::encode(&digest[..DIGEST_BYTES]))
}

fn normalize(field: &str) -> String {
    field.trim().to_uppercase()
}
