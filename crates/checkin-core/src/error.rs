use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckinError {
    /// Malformed caller input, rejected before any remote call is made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Reservation or airport lookup failed after the caller's retries.
    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Unknown timezone: {zone}")]
    TimezoneResolution { zone: String },

    #[error("Malformed departure date-time {input:?}: {reason}")]
    MalformedDate { input: String, reason: String },

    /// Every leg of the reservation has already passed its check-in instant.
    #[error("No eligible legs for reservation {confirmation_code}")]
    NoEligibleLegs { confirmation_code: String },

    /// No probe returned ready data within the attempt limit.
    #[error("Check-in never became ready after {attempts} attempts (last failure: {last_failure})")]
    RaceExhausted { attempts: u32, last_failure: String },

    /// The finalizing check-in request failed. Never retried.
    #[error("Check-in commit failed: {0}")]
    Commit(String),

    #[error("Trigger store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckinError {
    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            CheckinError::Validation(_) => "invalid_parameters",
            CheckinError::Lookup(_) => "lookup_failed",
            CheckinError::TimezoneResolution { .. } => "timezone_unresolved",
            CheckinError::MalformedDate { .. } => "malformed_date",
            CheckinError::NoEligibleLegs { .. } => "no_future_legs",
            CheckinError::RaceExhausted { .. } => "race_exhausted",
            CheckinError::Commit(_) => "commit_failed",
            CheckinError::Store(_) => "store_error",
            CheckinError::Config(_) => "config_error",
            CheckinError::Serialization(_) => "serialization_error",
            CheckinError::Io(_) => "io_error",
            CheckinError::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_distinguish_lookup_from_no_legs() {
        let lookup = CheckinError::Lookup("timeout".into());
        let none = CheckinError::NoEligibleLegs {
            confirmation_code: "ABC123".into(),
        };
        assert_ne!(lookup.code(), none.code());
    }

    #[test]
    fn race_exhausted_message_names_attempts() {
        let err = CheckinError::RaceExhausted {
            attempts: 80,
            last_failure: "not ready".into(),
        };
        assert!(err.to_string().contains("80 attempts"));
        assert_eq!(err.code(), "race_exhausted");
    }
}
