//! Background removal of expired session records.
//!
//! A single task alternates between two states: waiting for the interval to
//! elapse, and sweeping. A sweep selects up to [`BATCH_DELETE_LIMIT`] records
//! whose `expires` lies in the past and removes them with one batch delete.
//! The interval is re-armed only once a sweep has settled, so sweeps never
//! overlap and a backlog drains at most one batch per interval.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::{Adapter, Filter, Select, BATCH_DELETE_LIMIT, EXPIRES_ATTRIBUTE};
use crate::error::AdapterError;
use crate::expiry::epoch_millis;

/// Result of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The expiry query failed; nothing was deleted.
    QueryFailed,
    /// No expired records were found.
    Empty,
    /// This many expired records were deleted.
    Deleted(usize),
    /// The batch delete for this many records failed.
    DeleteFailed(usize),
}

/// Runs sweeps against one domain.
#[derive(Debug)]
pub(crate) struct Sweeper<A> {
    adapter: Arc<A>,
    domain: String,
}

impl<A: Adapter> Sweeper<A> {
    pub(crate) fn new(adapter: Arc<A>, domain: String) -> Self {
        Self { adapter, domain }
    }

    fn expired_before(&self, now_ms: i64) -> Select {
        Select {
            domain: self.domain.clone(),
            filter: Filter::LessThan {
                attribute: EXPIRES_ATTRIBUTE.to_string(),
                value: now_ms,
            },
            limit: BATCH_DELETE_LIMIT,
        }
    }

    /// Selects and deletes one batch of expired records.
    ///
    /// Failures are logged and reported in the outcome, never propagated:
    /// the next sweep simply tries again.
    pub(crate) async fn sweep(&self) -> SweepOutcome {
        let select = self.expired_before(epoch_millis(OffsetDateTime::now_utc()));

        let items = match self.adapter.select(&select).await {
            Ok(items) => items,
            Err(e) => {
                warn!(domain = %self.domain, error = %e, "expired session query failed");
                return SweepOutcome::QueryFailed;
            }
        };

        let keys: Vec<String> = items
            .into_iter()
            .take(BATCH_DELETE_LIMIT)
            .map(|item| item.name)
            .collect();
        if keys.is_empty() {
            debug!(domain = %self.domain, "no expired sessions");
            return SweepOutcome::Empty;
        }

        match self.adapter.batch_delete(&self.domain, &keys).await {
            Ok(()) => {
                debug!(domain = %self.domain, deleted = keys.len(), "expired sessions deleted");
                SweepOutcome::Deleted(keys.len())
            }
            Err(e) => {
                warn!(
                    domain = %self.domain,
                    batch = keys.len(),
                    error = %e,
                    "expired session delete failed"
                );
                SweepOutcome::DeleteFailed(keys.len())
            }
        }
    }

    /// Deletes every expired record, one batch at a time, stopping at the first error.
    ///
    /// Stops early, with a warning, when a select returns a key this drain has
    /// already deleted: the store has not caught up with its own deletes yet,
    /// and the leftovers are left to the background sweeps.
    pub(crate) async fn drain(&self) -> Result<usize, AdapterError> {
        let mut deleted: HashSet<String> = HashSet::new();
        loop {
            let select = self.expired_before(epoch_millis(OffsetDateTime::now_utc()));
            let keys: Vec<String> = self
                .adapter
                .select(&select)
                .await?
                .into_iter()
                .take(BATCH_DELETE_LIMIT)
                .map(|item| item.name)
                .collect();
            if keys.is_empty() {
                return Ok(deleted.len());
            }
            if keys.iter().any(|key| deleted.contains(key)) {
                warn!(
                    domain = %self.domain,
                    deleted = deleted.len(),
                    "deleted sessions still selected, stopping drain"
                );
                return Ok(deleted.len());
            }

            self.adapter.batch_delete(&self.domain, &keys).await?;
            let full = keys.len() == BATCH_DELETE_LIMIT;
            deleted.extend(keys);

            if !full {
                return Ok(deleted.len());
            }
        }
    }
}

/// Handle to the recurring cleanup task.
///
/// Dropping the handle cancels the task; [`stop`](Self::stop) also waits
/// for it to finish.
#[derive(Debug)]
pub(crate) struct CleanupScheduler {
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupScheduler {
    /// Spawns the task; the first sweep starts right away.
    pub(crate) fn spawn<A: Adapter>(runtime: &Handle, sweeper: Sweeper<A>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let task = runtime.spawn(run(sweeper, interval, token.clone()));

        Self {
            token,
            task: Mutex::new(Some(task)),
        }
    }

    /// Whether the task is still scheduled and has not exited.
    pub(crate) fn is_running(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancels the task and waits until it has exited.
    ///
    /// A sweep in flight is abandoned. Calling this more than once is harmless.
    pub(crate) async fn stop(&self) {
        self.token.cancel();

        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "cleanup task ended abnormally");
            }
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run<A: Adapter>(sweeper: Sweeper<A>, interval: Duration, token: CancellationToken) {
    debug!(domain = %sweeper.domain, ?interval, "cleanup task started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = sweeper.sweep() => {}
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!(domain = %sweeper.domain, "cleanup task stopped");
}
