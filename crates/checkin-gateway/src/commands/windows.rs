use checkin_core::config::CheckinConfig;
use checkin_core::window::{compute_leg_window, is_eligible};
use checkin_scheduler::scheduler::resolve_legs;
use chrono::Utc;

use crate::cli::ReservationArgs;
use crate::services::Services;

/// Print every leg's check-in window without scheduling anything.
pub async fn execute(args: ReservationArgs, config: &CheckinConfig) -> anyhow::Result<()> {
    let reservation = args.reservation();
    reservation.validate()?;

    let services = Services::build(config)?;
    let legs = resolve_legs(
        services.client.as_ref(),
        services.timezones.as_ref(),
        Services::retry_policy(config),
        &reservation,
    )
    .await?;
    let now = Utc::now();
    for resolved in legs {
        let leg = match resolved {
            Ok(leg) => leg,
            Err(unresolved) => {
                let departure = unresolved.departure;
                println!(
                    "{} {}  error: {}",
                    departure.departure_airport_code,
                    departure.local_date_time(),
                    unresolved.error
                );
                continue;
            }
        };
        match compute_leg_window(&leg) {
            Ok(window) => println!(
                "{} {} ({})  check-in opens {}  boot {}{}",
                leg.departure_airport_code,
                leg.departure_local,
                leg.timezone,
                window.available_at.to_rfc3339(),
                window.boot_at.to_rfc3339(),
                if is_eligible(&window, now) { "" } else { "  [past]" }
            ),
            Err(e) => println!(
                "{} {} ({})  error: {e}",
                leg.departure_airport_code, leg.departure_local, leg.timezone
            ),
        }
    }
    Ok(())
}
