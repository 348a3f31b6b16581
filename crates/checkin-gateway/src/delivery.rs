//! Fired-trigger delivery: Dispatcher → Executor, one task per trigger.

use std::sync::Arc;

use checkin_engine::Executor;
use checkin_scheduler::{RunOutcome, Trigger, TriggerStore};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Receive fired triggers until the channel closes, running each on its own task
/// and recording the outcome on the trigger.
///
/// Returns once the channel is closed and every check-in it started has
/// recorded its outcome.
pub async fn run(
    mut fired_rx: mpsc::Receiver<Trigger>,
    store: Arc<dyn TriggerStore>,
    executor: Arc<Executor>,
) {
    info!("delivery loop started");
    let tracker = TaskTracker::new();
    while let Some(trigger) = fired_rx.recv().await {
        let store = Arc::clone(&store);
        let executor = Arc::clone(&executor);
        tracker.spawn(async move {
            let outcome = execute(&executor, &trigger).await;
            if let Err(e) = store.finish(&trigger.key, &outcome) {
                error!(key = %trigger.key, "failed to record trigger outcome: {e}");
            }
        });
    }

    tracker.close();
    if !tracker.is_empty() {
        info!(in_flight = tracker.len(), "waiting for running check-ins");
    }
    tracker.wait().await;
    info!("delivery loop stopped");
}

async fn execute(executor: &Executor, trigger: &Trigger) -> RunOutcome {
    info!(
        key = %trigger.key,
        confirmation = %trigger.payload.reservation.confirmation_code,
        "executing check-in"
    );
    match executor.execute(&trigger.payload).await {
        Ok(report) => {
            info!(
                key = %trigger.key,
                winning_index = report.winning_index,
                probes_issued = report.probes_issued,
                "check-in succeeded"
            );
            RunOutcome::Completed
        }
        Err(e) => {
            warn!(key = %trigger.key, code = e.code(), "check-in failed: {e}");
            RunOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use checkin_client::{
        CheckinAction, CheckinApi, ClientError, CommitResult, HeaderProvider, HeaderSet,
        ProbeFailure, ReadyData,
    };
    use checkin_core::config::RaceConfig;
    use checkin_core::window::window_for_departure;
    use checkin_core::{Reservation, TriggerPayload};
    use checkin_scheduler::{SqliteTriggerStore, TriggerStatus};
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    struct Api {
        open: bool,
        latency: Duration,
    }

    #[async_trait]
    impl CheckinApi for Api {
        async fn ready_check(
            &self,
            _r: &Reservation,
            _h: &HeaderSet,
        ) -> Result<ReadyData, ProbeFailure> {
            tokio::time::sleep(self.latency).await;
            if !self.open {
                return Err(ProbeFailure::NotReady {
                    status: 400,
                    message: "too early".into(),
                });
            }
            Ok(ReadyData {
                action: CheckinAction {
                    href: "/v1/check-in".into(),
                    body: json!({}),
                },
                page: json!({}),
            })
        }

        async fn commit(
            &self,
            _a: &CheckinAction,
            _h: &HeaderSet,
        ) -> Result<CommitResult, ClientError> {
            Ok(CommitResult { page: json!({}) })
        }
    }

    struct NoHeaders;

    #[async_trait]
    impl HeaderProvider for NoHeaders {
        fn name(&self) -> &str {
            "none"
        }

        async fn headers(&self, _r: &Reservation) -> Result<HeaderSet, ClientError> {
            Ok(HeaderSet::new())
        }
    }

    fn executor(open: bool, latency: Duration) -> Arc<Executor> {
        let config = RaceConfig {
            cadence_ms: 1,
            attempt_limit: 3,
            early_start_secs: 0,
            heartbeat_secs: 30,
        };
        let headers: Arc<dyn HeaderProvider> = Arc::new(NoHeaders);
        let api = Arc::new(Api { open, latency });
        Arc::new(Executor::new(api, headers.clone(), headers, &config).unwrap())
    }

    fn claimed_trigger(store: &SqliteTriggerStore) -> Trigger {
        let now = Utc::now();
        // Check-in opened a moment ago: no wait before the race.
        let departure = now + chrono::Duration::hours(24) - chrono::Duration::seconds(1);
        let window = window_for_departure(departure);
        let reservation = Reservation::new("ABC123", "Ada", "Lovelace");
        let payload = TriggerPayload::new(reservation, &window, "UTC");
        let trigger = Trigger::new("checkin-u1-x".into(), "u1", window.boot_at, payload, now);
        store.create(&trigger).unwrap();
        let mut claimed = store.claim_due(now).unwrap();
        assert_eq!(claimed.len(), 1);
        claimed.remove(0)
    }

    /// Sends one trigger, closes the channel and waits for the loop to return.
    async fn deliver_one(open: bool, latency: Duration) -> Trigger {
        let store = Arc::new(
            SqliteTriggerStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap(),
        );
        let trigger = claimed_trigger(&store);

        let (tx, rx) = mpsc::channel(1);
        let delivery = tokio::spawn(run(rx, store.clone(), executor(open, latency)));
        tx.send(trigger).await.unwrap();
        drop(tx);
        delivery.await.unwrap();

        store.get("checkin-u1-x").unwrap().unwrap()
    }

    #[tokio::test]
    async fn successful_run_completes_trigger() {
        let trigger = deliver_one(true, Duration::ZERO).await;
        assert_eq!(trigger.status, TriggerStatus::Completed);
        assert!(trigger.last_error.is_none());
    }

    #[tokio::test]
    async fn closing_the_channel_waits_for_running_check_ins() {
        // The check-in is still in its race when the channel closes.
        let trigger = deliver_one(true, Duration::from_millis(50)).await;
        assert_eq!(trigger.status, TriggerStatus::Completed);
    }

    #[tokio::test]
    async fn exhausted_race_fails_trigger_with_reason() {
        let trigger = deliver_one(false, Duration::ZERO).await;
        assert_eq!(trigger.status, TriggerStatus::Failed);
        assert!(trigger.last_error.unwrap().contains("never became ready"));
    }
}
