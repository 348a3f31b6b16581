use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::{error::Result, store::TriggerStore, types::Trigger};

/// Drives fired triggers out of the store at poll-interval precision.
///
/// Claimed triggers go to the delivery loop over `fired_tx`; the tick loop
/// never blocks on a slow consumer.
pub struct Dispatcher {
    store: Arc<dyn TriggerStore>,
    fired_tx: mpsc::Sender<Trigger>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TriggerStore>,
        fired_tx: mpsc::Sender<Trigger>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            fired_tx,
            poll_interval,
        }
    }

    /// Main event loop. Polls until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_ms = self.poll_interval.as_millis() as u64, "dispatcher started");
        if let Err(e) = self.store.recover(Utc::now()) {
            error!("startup recovery failed: {e}");
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("dispatcher tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Claim everything due and forward it. Returns how many triggers were delivered.
    pub fn tick(&self) -> Result<usize> {
        let due = self.store.claim_due(Utc::now())?;
        let mut delivered = 0;
        for trigger in due {
            let key = trigger.key.clone();
            debug!(%key, fire_at = %trigger.fire_at, "trigger fired");
            match self.fired_tx.try_send(trigger) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(%key, "delivery channel unavailable, releasing trigger: {e}");
                    self.store.release(&key)?;
                }
            }
        }
        Ok(delivered)
    }
}
