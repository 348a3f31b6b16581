use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CheckinError, Result};

/// Identifies a booking with the remote system. Immutable once scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(rename = "confirmation_number")]
    pub confirmation_code: String,
    pub first_name: String,
    pub last_name: String,
}

impl Reservation {
    pub fn new(
        confirmation_code: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            confirmation_code: confirmation_code.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Copy with surrounding whitespace removed from every field.
    pub fn trimmed(&self) -> Self {
        Self {
            confirmation_code: self.confirmation_code.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("confirmation_number", &self.confirmation_code)?;
        require_text("first_name", &self.first_name)?;
        require_text("last_name", &self.last_name)?;
        Ok(())
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {})",
            self.confirmation_code, self.first_name, self.last_name
        )
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CheckinError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().any(char::is_control) {
        return Err(CheckinError::Validation(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}

/// A departure as reported by the reservation lookup, before its timezone is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegDeparture {
    pub departure_airport_code: String,
    /// `YYYY-MM-DD`, local to the departure airport.
    pub departure_date: String,
    /// `HH:MM`, local to the departure airport.
    pub departure_time: String,
}

impl LegDeparture {
    pub fn local_date_time(&self) -> String {
        format!("{} {}", self.departure_date, self.departure_time)
    }

    /// Attach the resolved IANA zone of the departure airport.
    pub fn with_timezone(self, timezone: impl Into<String>) -> FlightLeg {
        let departure_local = self.local_date_time();
        FlightLeg {
            departure_airport_code: self.departure_airport_code,
            departure_local,
            timezone: timezone.into(),
        }
    }
}

/// One journey segment with its departure timezone resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightLeg {
    pub departure_airport_code: String,
    /// Local departure date-time, e.g. `2024-01-02 10:00`.
    pub departure_local: String,
    /// IANA zone name, e.g. `America/Denver`.
    pub timezone: String,
}

/// When check-in opens for a leg and when the system should wake up for it.
///
/// Invariant: `boot_at < available_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinWindow {
    pub available_at: DateTime<Utc>,
    pub boot_at: DateTime<Utc>,
}

impl CheckinWindow {
    pub fn available_epoch(&self) -> i64 {
        self.available_at.timestamp()
    }

    pub fn boot_epoch(&self) -> i64 {
        self.boot_at.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_uses_wire_field_names() {
        let r = Reservation::new("ABC123", "Ada", "Lovelace");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["confirmation_number"], "ABC123");
        assert_eq!(json["first_name"], "Ada");
        assert!(json.get("confirmation_code").is_none());
    }

    #[test]
    fn blank_fields_fail_validation() {
        assert!(Reservation::new("ABC123", "Ada", "Lovelace").validate().is_ok());
        assert!(Reservation::new("  ", "Ada", "Lovelace").validate().is_err());
        assert!(Reservation::new("ABC123", "", "Lovelace").validate().is_err());
        assert!(Reservation::new("ABC123", "Ada", "Love\nlace").validate().is_err());
    }

    #[test]
    fn departure_becomes_leg_with_zone() {
        let dep = LegDeparture {
            departure_airport_code: "DEN".into(),
            departure_date: "2024-01-02".into(),
            departure_time: "10:00".into(),
        };
        let leg = dep.with_timezone("America/Denver");
        assert_eq!(leg.departure_local, "2024-01-02 10:00");
        assert_eq!(leg.timezone, "America/Denver");
    }
}
