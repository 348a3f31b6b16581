use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::{CheckinError, Result};
use crate::types::{CheckinWindow, FlightLeg};

/// The airline opens check-in this long before departure.
pub const CHECKIN_OPENS_BEFORE_DEPARTURE: Duration = Duration::hours(24);

/// Wake-up lead ahead of the check-in instant (trigger latency, header acquisition).
pub const BOOT_LEAD: Duration = Duration::minutes(5);

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Compute the check-in window for a departure given as a local date-time in `timezone`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant. A local
/// time inside a DST gap does not exist and is reported as `MalformedDate`.
pub fn compute_window(departure_local: &str, timezone: &str) -> Result<CheckinWindow> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| CheckinError::TimezoneResolution {
            zone: timezone.to_string(),
        })?;

    let naive = parse_local(departure_local)?;

    let departure = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(CheckinError::MalformedDate {
                input: departure_local.to_string(),
                reason: format!("local time does not exist in {timezone}"),
            })
        }
    };

    let window = window_for_departure(departure.with_timezone(&Utc));
    debug!(
        departure_local,
        timezone,
        available_at = %window.available_at,
        boot_at = %window.boot_at,
        "computed check-in window"
    );
    Ok(window)
}

pub fn compute_leg_window(leg: &FlightLeg) -> Result<CheckinWindow> {
    compute_window(&leg.departure_local, &leg.timezone)
}

/// Window for an absolute departure instant.
pub fn window_for_departure(departure: DateTime<Utc>) -> CheckinWindow {
    let available_at = departure - CHECKIN_OPENS_BEFORE_DEPARTURE;
    CheckinWindow {
        available_at,
        boot_at: available_at - BOOT_LEAD,
    }
}

/// A leg is worth scheduling only while its check-in instant is still ahead.
pub fn is_eligible(window: &CheckinWindow, now: DateTime<Utc>) -> bool {
    window.available_at > now
}

fn parse_local(input: &str) -> Result<NaiveDateTime> {
    let trimmed = input.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| CheckinError::MalformedDate {
            input: input.to_string(),
            reason: "expected YYYY-MM-DD HH:MM".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn denver_example() {
        let w = compute_window("2024-01-02T10:00", "America/Denver").unwrap();
        assert_eq!(w.available_at, utc("2024-01-01T10:00:00-07:00"));
        assert_eq!(w.boot_at, utc("2024-01-01T09:55:00-07:00"));
    }

    #[test]
    fn space_and_t_separators_agree() {
        let a = compute_window("2024-06-15 07:45", "America/Los_Angeles").unwrap();
        let b = compute_window("2024-06-15T07:45:00", "America/Los_Angeles").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn offsets_are_exact_for_many_zones() {
        for zone in ["UTC", "Asia/Tokyo", "Europe/London", "America/Phoenix", "Pacific/Honolulu"] {
            let w = compute_window("2025-02-20 18:30", zone).unwrap();
            let tz: Tz = zone.parse().unwrap();
            let departure = tz
                .with_ymd_and_hms(2025, 2, 20, 18, 30, 0)
                .single()
                .unwrap()
                .with_timezone(&Utc);
            assert_eq!(w.available_at, departure - Duration::hours(24));
            assert_eq!(w.boot_at, w.available_at - Duration::minutes(5));
            assert!(w.boot_at < w.available_at);
        }
    }

    #[test]
    fn window_spanning_dst_change_is_absolute_24h() {
        // Departure just after spring-forward: 24 real hours earlier is 09:00 MST.
        let w = compute_window("2024-03-10 10:00", "America/Denver").unwrap();
        assert_eq!(w.available_at, utc("2024-03-09T16:00:00Z"));
        assert_eq!(w.available_at, utc("2024-03-09T09:00:00-07:00"));
    }

    #[test]
    fn ambiguous_local_time_takes_earlier_instant() {
        let w = compute_window("2024-11-03 01:30", "America/Denver").unwrap();
        // 01:30 MDT (-06:00) is the earlier of the two 01:30s.
        assert_eq!(w.available_at, utc("2024-11-02T07:30:00Z"));
    }

    #[test]
    fn nonexistent_local_time_is_malformed() {
        let err = compute_window("2024-03-10 02:30", "America/Denver").unwrap_err();
        assert!(matches!(err, CheckinError::MalformedDate { .. }));
    }

    #[test]
    fn unknown_zone_is_timezone_error() {
        let err = compute_window("2024-01-02 10:00", "Mars/Olympus").unwrap_err();
        assert!(matches!(err, CheckinError::TimezoneResolution { .. }));
    }

    #[test]
    fn garbage_date_is_malformed() {
        let err = compute_window("next tuesday", "UTC").unwrap_err();
        assert!(matches!(err, CheckinError::MalformedDate { .. }));
    }

    #[test]
    fn past_windows_are_not_eligible() {
        let w = window_for_departure(utc("2024-01-02T17:00:00Z"));
        assert!(is_eligible(&w, utc("2024-01-01T16:59:59Z")));
        assert!(!is_eligible(&w, utc("2024-01-01T17:00:00Z")));
    }
}
