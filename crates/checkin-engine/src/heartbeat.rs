use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Sleep until `deadline` while a background task logs the remaining time every
/// `interval`. The heartbeat is cancelled when the sleep ends and can never end
/// it early. Returns how many beats were logged.
pub async fn wait_with_heartbeat(deadline: Instant, interval: Duration, label: &str) -> u32 {
    let stop = CancellationToken::new();
    let heartbeat = tokio::spawn(beat(deadline, interval, label.to_string(), stop.clone()));

    tokio::time::sleep_until(deadline).await;
    stop.cancel();

    match heartbeat.await {
        Ok(beats) => beats,
        Err(e) => {
            warn!(label, "heartbeat task ended abnormally: {e}");
            0
        }
    }
}

async fn beat(
    deadline: Instant,
    interval: Duration,
    label: String,
    stop: CancellationToken,
) -> u32 {
    if interval.is_zero() {
        stop.cancelled().await;
        return 0;
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    let mut beats = 0;
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return beats,
            _ = ticker.tick() => {
                beats += 1;
                let remaining = deadline.saturating_duration_since(Instant::now());
                info!(
                    label = %label,
                    remaining_secs = remaining.as_secs(),
                    "waiting for check-in window"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn beats_until_the_deadline_then_stops() {
        let start = Instant::now();
        let beats = wait_with_heartbeat(
            start + Duration::from_secs(95),
            Duration::from_secs(30),
            "ABC123",
        )
        .await;
        assert_eq!(beats, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(95));
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_returns_immediately() {
        let start = Instant::now();
        let beats = wait_with_heartbeat(start, Duration::from_secs(30), "ABC123").await;
        assert_eq!(beats, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
