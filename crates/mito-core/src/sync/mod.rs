//! Replays the offline action log once connectivity returns.

use crate::error::Result;
use crate::http::RequestExecutor;
use crate::outbox::{ActionLog, PendingAction};

/// Failed replays allowed before an entry is dropped.
pub const MAX_REPLAY_RETRIES: u32 = 3;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Replayed with a 2xx response and removed from the log.
    pub synced: Vec<PendingAction>,
    /// Failed this pass and kept for the next one (with the bumped count).
    pub retained: Vec<PendingAction>,
    /// Failed past the retry ceiling and removed.
    pub dropped: Vec<PendingAction>,
}

impl SyncReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.synced.is_empty() && self.retained.is_empty() && self.dropped.is_empty()
    }
}

/// Drains the action log through the executor. Not self-scheduling.
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    executor: RequestExecutor,
    action_log: ActionLog,
}

impl SyncCoordinator {
    pub fn new(executor: RequestExecutor) -> Self {
        let action_log = executor.action_log().clone();
        Self {
            executor,
            action_log,
        }
    }

    /// Replay every pending action and return the ones that went through.
    pub async fn sync_all(&self, token: &str) -> Result<Vec<PendingAction>> {
        Ok(self.drain(token).await?.synced)
    }

    /// Replay a snapshot of the log, oldest first.
    ///
    /// Success removes the entry. Any failure (transport error or non-2xx)
    /// bumps `retryCount`; an entry whose count passes
    /// [`MAX_REPLAY_RETRIES`] is removed for good.
    pub async fn drain(&self, token: &str) -> Result<SyncReport> {
        let snapshot = self.action_log.list();
        let mut report = SyncReport::default();
        if snapshot.is_empty() {
            return Ok(report);
        }
        tracing::info!(pending = snapshot.len(), "Syncing pending actions");

        for mut action in snapshot {
            let request = action.to_request().with_bearer(Some(token));
            let outcome = self.executor.replay(&request).await;

            let failure = match outcome {
                Ok(response) if response.is_success() => {
                    self.action_log.remove(&action.id)?;
                    tracing::info!(id = %action.id, "Synced pending action");
                    report.synced.push(action);
                    continue;
                }
                Ok(response) => format!("HTTP {}", response.status),
                Err(error) => error.to_string(),
            };

            let Some(count) = self.action_log.record_failure(&action.id)? else {
                continue;
            };
            action.retry_count = count;
            if count > MAX_REPLAY_RETRIES {
                self.action_log.remove(&action.id)?;
                tracing::warn!(id = %action.id, retry_count = count, "Dropping pending action after repeated failures: {}", failure);
                report.dropped.push(action);
            } else {
                tracing::warn!(id = %action.id, retry_count = count, "Pending action failed to sync: {}", failure);
                report.retained.push(action);
            }
        }

        Ok(report)
    }
}
