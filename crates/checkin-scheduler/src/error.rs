use checkin_core::CheckinError;
use thiserror::Error;

/// Errors that can occur within the trigger scheduling subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A trigger with this key already exists.
    #[error("Trigger already exists: {key}")]
    Duplicate { key: String },

    #[error("Trigger not found: {key}")]
    TriggerNotFound { key: String },

    /// A stored row could not be decoded.
    #[error("Corrupt trigger {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Trigger store lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Core(#[from] CheckinError),
}

impl From<SchedulerError> for CheckinError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::Core(inner) => inner,
            other => CheckinError::Store(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
