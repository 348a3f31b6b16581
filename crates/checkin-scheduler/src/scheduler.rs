use std::sync::Arc;

use checkin_client::{retry_fixed, ClientError, ReservationLookup, RetryPolicy, TimezoneResolver};
use checkin_core::window::{compute_leg_window, is_eligible};
use checkin_core::{CheckinError, CheckinWindow, FlightLeg, Reservation, TriggerPayload};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SchedulerError},
    key::TriggerKeyBuilder,
    store::TriggerStore,
    types::{
        LegReport, LegSchedule, LegStatus, ResolvedLeg, ScheduleOutcome, Trigger, UnresolvedLeg,
    },
};

/// Turns reservations into persisted, deduplicated triggers.
pub struct TriggerScheduler {
    store: Arc<dyn TriggerStore>,
    lookup: Arc<dyn ReservationLookup>,
    timezones: Arc<dyn TimezoneResolver>,
    keys: TriggerKeyBuilder,
    retry: RetryPolicy,
}

impl TriggerScheduler {
    pub fn new(
        store: Arc<dyn TriggerStore>,
        lookup: Arc<dyn ReservationLookup>,
        timezones: Arc<dyn TimezoneResolver>,
        keys: TriggerKeyBuilder,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            lookup,
            timezones,
            keys,
            retry,
        }
    }

    /// Schedule one leg. Scheduling the same leg again is a no-op reported as
    /// `AlreadyScheduled`; past legs are not filtered here.
    pub fn schedule_leg(
        &self,
        user_id: &str,
        reservation: &Reservation,
        leg: &FlightLeg,
    ) -> Result<LegSchedule> {
        let window = compute_leg_window(leg)?;
        self.schedule_window(user_id, reservation, leg, window)
    }

    /// Look up every leg of `reservation`, drop those whose check-in already
    /// opened, and schedule the rest independently.
    ///
    /// Fails with `NoEligibleLegs` when nothing is left to schedule, and with
    /// `Lookup` when the reservation itself cannot be fetched. A leg whose
    /// airport timezone or date cannot be resolved is reported as failed and
    /// the other legs are still scheduled.
    pub async fn schedule_reservation(
        &self,
        user_id: &str,
        reservation: &Reservation,
    ) -> Result<Vec<LegReport>> {
        self.keys.user_prefix(user_id)?;
        let reservation = reservation.trimmed();
        reservation.validate()?;

        let legs = self.resolve_legs(&reservation).await?;
        let now = Utc::now();

        let mut reports = Vec::with_capacity(legs.len());
        for resolved in legs {
            let leg = match resolved {
                Ok(leg) => leg,
                Err(UnresolvedLeg { departure, error }) => {
                    warn!(airport = %departure.departure_airport_code, "leg skipped: {error}");
                    reports.push(LegReport {
                        leg: departure.with_timezone(""),
                        window: None,
                        status: LegStatus::Failed {
                            error: error.to_string(),
                        },
                    });
                    continue;
                }
            };
            let window = match compute_leg_window(&leg) {
                Ok(w) => w,
                Err(e) => {
                    warn!(airport = %leg.departure_airport_code, "leg skipped: {e}");
                    reports.push(LegReport {
                        leg,
                        window: None,
                        status: LegStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                    continue;
                }
            };
            if !is_eligible(&window, now) {
                debug!(
                    airport = %leg.departure_airport_code,
                    available_at = %window.available_at,
                    "leg already past its check-in instant"
                );
                continue;
            }

            let status = match self.schedule_window(user_id, &reservation, &leg, window) {
                Ok(scheduled) => scheduled.outcome.into(),
                Err(e) => {
                    warn!(airport = %leg.departure_airport_code, "failed to schedule leg: {e}");
                    LegStatus::Failed {
                        error: CheckinError::from(e).to_string(),
                    }
                }
            };
            reports.push(LegReport {
                leg,
                window: Some(window),
                status,
            });
        }

        if reports.is_empty() {
            return Err(CheckinError::NoEligibleLegs {
                confirmation_code: reservation.confirmation_code.clone(),
            }
            .into());
        }
        info!(
            user_id,
            confirmation = %reservation.confirmation_code,
            legs = reports.len(),
            "reservation scheduled"
        );
        Ok(reports)
    }

    /// Every trigger owned by `user_id`.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Trigger>> {
        let prefix = self.keys.user_prefix(user_id)?;
        self.store.list_by_prefix(&prefix)
    }

    /// Fetch the reservation's departures and attach each airport's timezone.
    pub async fn resolve_legs(&self, reservation: &Reservation) -> Result<Vec<ResolvedLeg>> {
        resolve_legs(
            self.lookup.as_ref(),
            self.timezones.as_ref(),
            self.retry,
            reservation,
        )
        .await
    }

    fn schedule_window(
        &self,
        user_id: &str,
        reservation: &Reservation,
        leg: &FlightLeg,
        window: CheckinWindow,
    ) -> Result<LegSchedule> {
        let key = self.keys.build_key(user_id, reservation, window.available_at)?;

        if self.store.exists(&key)? {
            debug!(%key, "trigger already exists");
            return Ok(already_scheduled(key, window));
        }

        let payload = TriggerPayload::new(reservation.clone(), &window, &leg.timezone);
        let trigger = Trigger::new(key.clone(), user_id, window.boot_at, payload, Utc::now());
        match self.store.create(&trigger) {
            Ok(()) => Ok(LegSchedule {
                outcome: ScheduleOutcome::Added,
                key,
                window,
            }),
            // Lost a race with a concurrent request for the same leg.
            Err(SchedulerError::Duplicate { .. }) => Ok(already_scheduled(key, window)),
            Err(e) => Err(e),
        }
    }
}

fn already_scheduled(key: String, window: CheckinWindow) -> LegSchedule {
    LegSchedule {
        outcome: ScheduleOutcome::AlreadyScheduled,
        key,
        window,
    }
}

/// Look up `reservation`'s departures and resolve each departure airport's zone,
/// retrying both lookups with `retry`.
///
/// Only the reservation lookup is fatal; a zone that cannot be resolved is
/// returned as an [`UnresolvedLeg`] in that departure's slot.
pub async fn resolve_legs(
    lookup: &dyn ReservationLookup,
    timezones: &dyn TimezoneResolver,
    retry: RetryPolicy,
    reservation: &Reservation,
) -> Result<Vec<ResolvedLeg>> {
    let departures = retry_fixed(retry, "reservation lookup", || {
        lookup.lookup_legs(reservation)
    })
    .await
    .map_err(lookup_failed)?;

    let mut legs = Vec::with_capacity(departures.len());
    for departure in departures {
        let code = departure.departure_airport_code.clone();
        match retry_fixed(retry, "timezone lookup", || timezones.resolve(&code)).await {
            Ok(timezone) => legs.push(Ok(departure.with_timezone(timezone))),
            Err(e) => legs.push(Err(UnresolvedLeg {
                departure,
                error: CheckinError::Lookup(e.to_string()),
            })),
        }
    }
    Ok(legs)
}

fn lookup_failed(e: ClientError) -> SchedulerError {
    CheckinError::Lookup(e.to_string()).into()
}
