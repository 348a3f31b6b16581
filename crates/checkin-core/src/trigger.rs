//! Trigger payload shared between the trigger scheduler, the dispatcher and the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CheckinError, Result};
use crate::types::{CheckinWindow, Reservation};

/// Stored as a JSON string in the `triggers.payload` column and handed to the
/// executor when the trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub reservation: Reservation,
    /// 24 hours before scheduled departure, in epoch seconds.
    pub checkin_available_epoch: i64,
    /// IANA zone of the departure airport, kept for display and logging.
    pub departure_timezone: String,
}

impl TriggerPayload {
    pub fn new(reservation: Reservation, window: &CheckinWindow, timezone: &str) -> Self {
        Self {
            reservation,
            checkin_available_epoch: window.available_epoch(),
            departure_timezone: timezone.to_string(),
        }
    }

    pub fn available_at(&self) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(self.checkin_available_epoch, 0).ok_or_else(|| {
            CheckinError::Validation(format!(
                "checkin_available_epoch out of range: {}",
                self.checkin_available_epoch
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.reservation.validate()?;
        self.available_at()?;
        Ok(())
    }
}
