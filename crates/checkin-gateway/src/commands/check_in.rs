use anyhow::Context;
use checkin_core::config::CheckinConfig;
use checkin_core::window::window_for_departure;
use checkin_core::TriggerPayload;
use chrono::Utc;

use crate::cli::ReservationArgs;
use crate::services::Services;

/// Run the executor immediately for a reservation, skipping the schedule.
pub async fn execute(args: ReservationArgs, config: &CheckinConfig) -> anyhow::Result<()> {
    let reservation = args.reservation();
    reservation.validate()?;

    let services = Services::build(config)?;
    let executor = services.executor(config)?;

    // Treat check-in as open right now so the race starts without waiting.
    let window = window_for_departure(Utc::now() + chrono::Duration::hours(24));
    let payload = TriggerPayload::new(reservation, &window, "UTC");

    let report = executor
        .execute(&payload)
        .await
        .context("check-in failed")?;

    println!(
        "Checked in {} (probe #{} of {} issued, race took {} ms)",
        report.confirmation_code,
        report.winning_index,
        report.probes_issued,
        report.race_elapsed.as_millis()
    );
    println!("{}", serde_json::to_string_pretty(&report.result.page)?);
    Ok(())
}
