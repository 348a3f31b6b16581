use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ClientError;

/// Fixed-delay, bounded-attempt retry for lookups made at the scheduling call site.
///
/// Never used for the readiness probe, which races instead of backing off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

pub async fn retry_fixed<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(what, attempt, "lookup succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.attempts => {
                warn!(what, attempt, err = %e, "lookup failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
