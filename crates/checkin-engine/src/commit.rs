use std::sync::Arc;

use checkin_client::{CheckinApi, CommitResult, HeaderSet, ReadyData};
use checkin_core::{CheckinError, Result};
use tracing::{error, info};

/// Issues the single finalizing request with the action handed out by the ready-check.
pub struct CheckinCommitter {
    api: Arc<dyn CheckinApi>,
}

impl CheckinCommitter {
    pub fn new(api: Arc<dyn CheckinApi>) -> Self {
        Self { api }
    }

    /// Consumes `ready`: an action is committed at most once. Failures are not retried.
    pub async fn commit(&self, ready: ReadyData, headers: &HeaderSet) -> Result<CommitResult> {
        let ReadyData { action, .. } = ready;
        info!(href = %action.href, "committing check-in");
        match self.api.commit(&action, headers).await {
            Ok(result) => {
                info!(href = %action.href, "check-in committed");
                Ok(result)
            }
            Err(e) => {
                error!(href = %action.href, "check-in commit failed: {e}");
                Err(CheckinError::Commit(e.to_string()))
            }
        }
    }
}
