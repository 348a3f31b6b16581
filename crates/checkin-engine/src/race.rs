//! Parallel-burst readiness race.
//!
//! Every probe is scheduled up front, probe `i` sleeping until
//! `start + i * cadence`. The first probe to come back with ready data wins,
//! the shared token is raised so no further request leaves, and probes that
//! are already in flight are detached: they finish on their own and their
//! results are dropped.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use checkin_client::ProbeFailure;
use checkin_core::config::RaceConfig;
use checkin_core::{CheckinError, Result};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One scheduled probe of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollAttempt {
    pub index: u32,
    /// Delay from race start before this probe may issue its request.
    pub offset: Duration,
}

/// The probe that won and what the race cost.
#[derive(Debug)]
pub struct RaceWin<T> {
    pub index: u32,
    pub data: T,
    /// Probes whose request actually left before the race ended.
    pub issued: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRace {
    cadence: Duration,
    attempt_limit: u32,
}

impl PollRace {
    pub fn new(cadence: Duration, attempt_limit: u32) -> Result<Self> {
        if cadence.is_zero() {
            return Err(CheckinError::Validation("race cadence must be > 0".into()));
        }
        if attempt_limit == 0 {
            return Err(CheckinError::Validation(
                "race attempt limit must be > 0".into(),
            ));
        }
        Ok(Self {
            cadence,
            attempt_limit,
        })
    }

    pub fn from_config(config: &RaceConfig) -> Result<Self> {
        Self::new(Duration::from_millis(config.cadence_ms), config.attempt_limit)
    }

    /// Longest the race can keep issuing requests.
    pub fn horizon(&self) -> Duration {
        self.cadence * (self.attempt_limit - 1)
    }

    pub fn attempts(&self) -> impl Iterator<Item = PollAttempt> + '_ {
        (0..self.attempt_limit).map(|index| PollAttempt {
            index,
            offset: self.cadence * index,
        })
    }

    /// Run the race. `probe(index)` builds the request future for one attempt;
    /// it is only polled once that attempt's offset has elapsed.
    pub async fn run<T, F, Fut>(&self, probe: F) -> Result<RaceWin<T>>
    where
        T: Send + 'static,
        F: Fn(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, ProbeFailure>> + Send + 'static,
    {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let issued = Arc::new(AtomicU32::new(0));
        let mut probes = JoinSet::new();

        for attempt in self.attempts() {
            let token = cancel.clone();
            let issued = Arc::clone(&issued);
            let request = probe(attempt.index);
            probes.spawn(async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return (attempt.index, None),
                    _ = tokio::time::sleep_until(started + attempt.offset) => {}
                }
                issued.fetch_add(1, Ordering::SeqCst);
                (attempt.index, Some(request.await))
            });
        }

        let mut last_failure: Option<String> = None;
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((index, Some(Ok(data)))) => {
                    cancel.cancel();
                    probes.detach_all();
                    let win = RaceWin {
                        index,
                        data,
                        issued: issued.load(Ordering::SeqCst),
                        elapsed: started.elapsed(),
                    };
                    info!(
                        index,
                        issued = win.issued,
                        elapsed_ms = win.elapsed.as_millis() as u64,
                        "ready check won the race"
                    );
                    return Ok(win);
                }
                Ok((index, Some(Err(failure)))) => {
                    match &failure {
                        ProbeFailure::NotReady { .. } => {
                            debug!(index, "probe not ready: {failure}")
                        }
                        _ => warn!(index, "probe failed: {failure}"),
                    }
                    last_failure = Some(failure.to_string());
                }
                Ok((_, None)) => {}
                Err(e) => {
                    warn!("probe task ended abnormally: {e}");
                    last_failure = Some(e.to_string());
                }
            }
        }

        let attempts = issued.load(Ordering::SeqCst);
        warn!(
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "no probe became ready"
        );
        Err(CheckinError::RaceExhausted {
            attempts,
            last_failure: last_failure.unwrap_or_else(|| "no probe completed".to_string()),
        })
    }
}
