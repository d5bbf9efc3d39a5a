// ABOUTME: Sync engine that drains one owner's pending items against the remote acceptor.
// ABOUTME: Enforces a single in-flight sync, applies exponential backoff, and evicts only on acceptance.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use fieldsync_core::{
    BackoffPolicy, EventDispatcher, QueueItem, QueueKind, SyncEventPayload, SyncState,
};
use fieldsync_store::{QueueError, QueueStore};
use serde::Serialize;
use thiserror::Error;

use crate::remote::{RemoteAcceptor, RemoteError};

/// Errors returned by a sync attempt. None of them is fatal to the process;
/// the worst outcome is that items stay pending.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync failed: {reason} (attempt {attempts})")]
    Transient { reason: String, attempts: u32 },

    #[error("a sync is already in progress")]
    ConcurrentSyncRejected,

    #[error("queue persistence failed: {0}")]
    Persistence(#[from] QueueError),

    #[error("no network connection")]
    Offline,
}

impl SyncError {
    pub fn is_fatal(&self) -> bool {
        false
    }

    /// Whether the caller should offer a retry. A rejected concurrent call
    /// needs no retry: the sync already running covers the same items.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::ConcurrentSyncRejected)
    }
}

/// Outcome of a successful sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced_item_count: usize,
}

/// Tunables for the engine.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub backoff: BackoffPolicy,
    /// Upper bound on one remote call. `None` waits for the remote however long
    /// it takes.
    pub remote_timeout: Option<Duration>,
}

/// Releases the in-flight flag on every exit path of a sync.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drains queued items per owner. At most one sync runs at a time; a second
/// call while one is in flight is rejected, never run in parallel.
pub struct SyncEngine {
    queue: Arc<QueueStore>,
    remote: Arc<dyn RemoteAcceptor>,
    dispatcher: EventDispatcher,
    options: SyncOptions,
    in_flight: AtomicBool,
    state: Mutex<SyncState>,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<QueueStore>,
        remote: Arc<dyn RemoteAcceptor>,
        dispatcher: EventDispatcher,
        options: SyncOptions,
    ) -> Self {
        Self {
            queue,
            remote,
            dispatcher,
            options,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(SyncState::new()),
        }
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.queue
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Current sync bookkeeping.
    pub fn state(&self) -> SyncState {
        let mut state = self.lock_state().clone();
        state.is_syncing = self.is_syncing();
        state
    }

    /// Delay the next non-empty sync will wait before calling the remote.
    pub fn next_delay(&self) -> Duration {
        self.lock_state().next_delay(&self.options.backoff)
    }

    /// Submit every pending item owned by `owner` and evict them on acceptance.
    ///
    /// Returns immediately with a zero count, touching no state, when the owner
    /// has nothing pending. Items of other owners are never submitted or evicted.
    pub async fn sync(&self, owner: &str) -> Result<SyncReport, SyncError> {
        let mut candidates = self.queue.items_for_owner(QueueKind::Downtime, owner).await;
        candidates.extend(
            self.queue
                .items_for_owner(QueueKind::Maintenance, owner)
                .await,
        );

        if candidates.is_empty() {
            tracing::debug!(owner, "nothing pending, skipping sync");
            return Ok(SyncReport {
                synced_item_count: 0,
            });
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(owner, "sync already in flight, rejecting");
            return Err(SyncError::ConcurrentSyncRejected);
        };

        let item_count = candidates.len();
        self.dispatcher.notify(SyncEventPayload::SyncStarted {
            owner: owner.to_string(),
            item_count,
        });

        let delay = self.next_delay();
        tracing::info!(
            owner,
            items = item_count,
            delay_ms = delay.as_millis() as u64,
            remote = self.remote.name(),
            "starting sync"
        );
        tokio::time::sleep(delay).await;

        if let Err(e) = self.submit(&candidates).await {
            let reason = e.to_string();
            let attempts = {
                let mut state = self.lock_state();
                state.record_failure(reason.clone());
                state.sync_attempts
            };
            tracing::warn!(owner, attempts, error = %reason, "sync failed, items remain queued");
            self.dispatcher.notify(SyncEventPayload::SyncFailed {
                owner: owner.to_string(),
                reason: reason.clone(),
                attempts,
            });
            return Err(SyncError::Transient { reason, attempts });
        }

        // Only the submitted batch is evicted: items the same owner queued
        // while the remote call was in flight wait for the next sync.
        let submitted: HashSet<&str> = candidates.iter().map(|item| item.id()).collect();
        if let Err(e) = self
            .queue
            .evict(|item| item.is_owned_by(owner) && submitted.contains(item.id()))
            .await
        {
            let reason = e.to_string();
            let attempts = {
                let mut state = self.lock_state();
                state.last_sync_error = Some(reason.clone());
                state.sync_attempts
            };
            tracing::error!(owner, error = %reason, "remote accepted batch but eviction failed");
            self.dispatcher.notify(SyncEventPayload::SyncFailed {
                owner: owner.to_string(),
                reason,
                attempts,
            });
            return Err(SyncError::Persistence(e));
        }

        self.lock_state().record_success(Utc::now());
        tracing::info!(owner, items = item_count, "sync complete");
        self.dispatcher.notify(SyncEventPayload::SyncSucceeded {
            owner: owner.to_string(),
            synced_item_count: item_count,
        });

        Ok(SyncReport {
            synced_item_count: item_count,
        })
    }

    async fn submit(&self, items: &[QueueItem]) -> Result<(), RemoteError> {
        match self.options.remote_timeout {
            Some(limit) => tokio::time::timeout(limit, self.remote.submit(items))
                .await
                .unwrap_or(Err(RemoteError::Timeout)),
            None => self.remote.submit(items).await,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
