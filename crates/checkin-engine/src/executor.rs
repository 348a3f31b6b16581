use std::sync::Arc;
use std::time::Duration;

use checkin_client::{CheckinApi, CommitResult, HeaderProvider, HeaderSet};
use checkin_core::config::RaceConfig;
use checkin_core::{CheckinError, Reservation, Result, TriggerPayload};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::commit::CheckinCommitter;
use crate::heartbeat::wait_with_heartbeat;
use crate::race::PollRace;

/// What one executed check-in looked like.
#[derive(Debug)]
pub struct CheckinReport {
    pub confirmation_code: String,
    pub available_at: DateTime<Utc>,
    /// Time spent sleeping before the race started.
    pub waited: Duration,
    pub heartbeats: u32,
    pub winning_index: u32,
    pub probes_issued: u32,
    pub race_elapsed: Duration,
    pub result: CommitResult,
}

/// Runs one fired trigger to completion: headers, wait, race, commit.
pub struct Executor {
    api: Arc<dyn CheckinApi>,
    probe_headers: Arc<dyn HeaderProvider>,
    commit_headers: Arc<dyn HeaderProvider>,
    race: PollRace,
    early_start: Duration,
    heartbeat: Duration,
}

impl Executor {
    pub fn new(
        api: Arc<dyn CheckinApi>,
        probe_headers: Arc<dyn HeaderProvider>,
        commit_headers: Arc<dyn HeaderProvider>,
        config: &RaceConfig,
    ) -> Result<Self> {
        Ok(Self {
            api,
            probe_headers,
            commit_headers,
            race: PollRace::from_config(config)?,
            early_start: Duration::from_secs(config.early_start_secs),
            heartbeat: Duration::from_secs(config.heartbeat_secs),
        })
    }

    #[instrument(skip_all, fields(confirmation = %payload.reservation.confirmation_code))]
    pub async fn execute(&self, payload: &TriggerPayload) -> Result<CheckinReport> {
        payload.validate()?;
        let available_at = payload.available_at()?;
        let reservation = &payload.reservation;

        // Acquisition can be slow, so it happens before the wait.
        let probe_headers = acquire(self.probe_headers.as_ref(), reservation).await?;
        let commit_headers = acquire(self.commit_headers.as_ref(), reservation).await?;

        let (waited, heartbeats) = self
            .wait_for(available_at, &reservation.confirmation_code)
            .await;

        info!(
            attempts = self.race.attempts().count(),
            horizon_ms = self.race.horizon().as_millis() as u64,
            "starting ready-check race"
        );
        let api = Arc::clone(&self.api);
        let probe_reservation = reservation.clone();
        let shared_headers = Arc::new(probe_headers);
        let win = self
            .race
            .run(move |_index| {
                let api = Arc::clone(&api);
                let reservation = probe_reservation.clone();
                let headers = Arc::clone(&shared_headers);
                async move { api.ready_check(&reservation, &headers).await }
            })
            .await?;

        let (winning_index, probes_issued, race_elapsed) = (win.index, win.issued, win.elapsed);
        let result = CheckinCommitter::new(Arc::clone(&self.api))
            .commit(win.data, &commit_headers)
            .await?;

        info!(
            winning_index,
            probes_issued,
            race_ms = race_elapsed.as_millis() as u64,
            "check-in complete"
        );
        Ok(CheckinReport {
            confirmation_code: reservation.confirmation_code.clone(),
            available_at,
            waited,
            heartbeats,
            winning_index,
            probes_issued,
            race_elapsed,
            result,
        })
    }

    /// Sleep until `early_start` before `available_at`, if that is still ahead.
    async fn wait_for(&self, available_at: DateTime<Utc>, label: &str) -> (Duration, u32) {
        let early =
            chrono::Duration::from_std(self.early_start).unwrap_or(chrono::Duration::zero());
        let start_at = available_at - early;
        let remaining = match (start_at - Utc::now()).to_std() {
            Ok(d) if !d.is_zero() => d,
            _ => return (Duration::ZERO, 0),
        };
        info!(remaining_secs = remaining.as_secs(), "waiting for check-in to open");
        let beats = wait_with_heartbeat(Instant::now() + remaining, self.heartbeat, label).await;
        (remaining, beats)
    }
}

async fn acquire(provider: &dyn HeaderProvider, reservation: &Reservation) -> Result<HeaderSet> {
    provider.headers(reservation).await.map_err(|e| {
        CheckinError::Lookup(format!("{} header acquisition failed: {e}", provider.name()))
    })
}
