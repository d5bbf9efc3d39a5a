// ABOUTME: Per-kind FIFO queues of pending writes, mirrored as whole snapshots into the durable store.
// ABOUTME: A write is applied in memory only after its snapshot has been durably persisted.

use std::sync::Arc;

use fieldsync_core::{
    EventDispatcher, ItemPayload, QueueChange, QueueItem, QueueKind, SyncEventPayload,
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::durable::{DurableStore, StoreError};

/// Errors that can occur in queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// In-memory contents of both queues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Queues {
    pub downtime: Vec<QueueItem>,
    pub maintenance: Vec<QueueItem>,
}

impl Queues {
    pub fn get(&self, kind: QueueKind) -> &Vec<QueueItem> {
        match kind {
            QueueKind::Downtime => &self.downtime,
            QueueKind::Maintenance => &self.maintenance,
        }
    }

    fn get_mut(&mut self, kind: QueueKind) -> &mut Vec<QueueItem> {
        match kind {
            QueueKind::Downtime => &mut self.downtime,
            QueueKind::Maintenance => &mut self.maintenance,
        }
    }

    pub fn len(&self) -> usize {
        self.downtime.len() + self.maintenance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of reading both queues back from the durable store.
#[derive(Debug, Clone, Default)]
pub struct LoadedQueues {
    pub queues: Queues,
    /// Kinds whose stored content was unreadable and was replaced by an empty queue.
    pub recovered: Vec<QueueKind>,
}

/// Canonical set of pending writes for this device.
pub struct QueueStore {
    store: Arc<dyn DurableStore>,
    queues: Mutex<Queues>,
    dispatcher: EventDispatcher,
    tenant_id: String,
}

impl QueueStore {
    /// Create an empty queue store. Call [`load`](Self::load) to pick up
    /// anything persisted by a previous run.
    pub fn new(
        store: Arc<dyn DurableStore>,
        dispatcher: EventDispatcher,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queues: Mutex::new(Queues::default()),
            dispatcher,
            tenant_id: tenant_id.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Replace in-memory contents with what the durable store holds.
    ///
    /// Missing keys yield empty queues. Content that does not parse is logged
    /// and treated as an empty queue. Read failures from the store itself are
    /// returned, since overwriting unreadable-but-intact data would lose it.
    pub async fn load(&self) -> Result<LoadedQueues, QueueError> {
        let mut loaded = LoadedQueues::default();

        for kind in QueueKind::ALL {
            let key = kind.storage_key();
            let items = match self.store.get(key).await? {
                None => Vec::new(),
                Some(raw) => match serde_json::from_str::<Vec<QueueItem>>(&raw) {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::warn!(
                            key,
                            error = %e,
                            "malformed queue data in durable store, starting empty"
                        );
                        loaded.recovered.push(kind);
                        Vec::new()
                    }
                },
            };
            *loaded.queues.get_mut(kind) = items;
        }

        let mut queues = self.queues.lock().await;
        *queues = loaded.queues.clone();
        for kind in QueueKind::ALL {
            self.notify_changed(kind, queues.get(kind).len(), QueueChange::Loaded);
        }
        tracing::info!(
            downtime = queues.downtime.len(),
            maintenance = queues.maintenance.len(),
            "loaded offline queues"
        );

        Ok(loaded)
    }

    /// Append a new item for the payload's kind and persist the whole queue.
    ///
    /// Returns only after the durable write completed. If persisting fails the
    /// in-memory queue is left untouched and the error is returned.
    pub async fn enqueue(&self, payload: impl Into<ItemPayload>) -> Result<QueueItem, QueueError> {
        let item = QueueItem::new(payload.into(), self.tenant_id.as_str());
        let kind = item.kind();

        let mut queues = self.queues.lock().await;
        let mut next = queues.get(kind).clone();
        next.push(item.clone());
        self.persist(kind, &next).await?;
        *queues.get_mut(kind) = next;

        tracing::debug!(
            item_id = item.id(),
            owner = item.owner(),
            queue = %kind,
            "enqueued item"
        );
        self.notify_changed(
            kind,
            queues.get(kind).len(),
            QueueChange::Enqueued {
                item_id: item.id().to_string(),
                owner: item.owner().to_string(),
            },
        );

        Ok(item)
    }

    /// Items of `kind` owned by `owner`, in insertion order.
    pub async fn items_for_owner(&self, kind: QueueKind, owner: &str) -> Vec<QueueItem> {
        let queues = self.queues.lock().await;
        queues
            .get(kind)
            .iter()
            .filter(|item| item.is_owned_by(owner))
            .cloned()
            .collect()
    }

    /// Number of items across both queues owned by `owner`.
    pub async fn pending_count_for_owner(&self, owner: &str) -> usize {
        let queues = self.queues.lock().await;
        QueueKind::ALL
            .iter()
            .map(|kind| {
                queues
                    .get(*kind)
                    .iter()
                    .filter(|item| item.is_owned_by(owner))
                    .count()
            })
            .sum()
    }

    /// Number of items owned by `owner` that concern one machine.
    pub async fn pending_for_machine(&self, owner: &str, machine_id: &str) -> usize {
        let queues = self.queues.lock().await;
        QueueKind::ALL
            .iter()
            .flat_map(|kind| queues.get(*kind).iter())
            .filter(|item| item.is_owned_by(owner) && item.payload.machine_id() == machine_id)
            .count()
    }

    /// Snapshot of both queues.
    pub async fn snapshot(&self) -> Queues {
        self.queues.lock().await.clone()
    }

    /// Remove every item matching `predicate` from both queues and persist the
    /// queues that changed. Returns the number of items removed.
    ///
    /// Each queue is swapped in memory right after its own durable write, so a
    /// failure on the second queue leaves the first one evicted and the second
    /// one intact.
    pub async fn evict<P>(&self, predicate: P) -> Result<usize, QueueError>
    where
        P: Fn(&QueueItem) -> bool,
    {
        let mut queues = self.queues.lock().await;
        let mut removed_total = 0;

        for kind in QueueKind::ALL {
            let current = queues.get(kind);
            let next: Vec<QueueItem> = current
                .iter()
                .filter(|item| !predicate(item))
                .cloned()
                .collect();
            let removed = current.len() - next.len();
            if removed == 0 {
                continue;
            }

            self.persist(kind, &next).await?;
            *queues.get_mut(kind) = next;
            removed_total += removed;

            tracing::debug!(queue = %kind, removed, "evicted items");
            self.notify_changed(kind, queues.get(kind).len(), QueueChange::Evicted { removed });
        }

        Ok(removed_total)
    }

    async fn persist(&self, kind: QueueKind, items: &[QueueItem]) -> Result<(), QueueError> {
        let json = serde_json::to_string(items)?;
        self.store.set(kind.storage_key(), &json).await?;
        Ok(())
    }

    fn notify_changed(&self, kind: QueueKind, len: usize, change: QueueChange) {
        self.dispatcher.notify(SyncEventPayload::QueueChanged {
            queue: kind,
            len,
            change,
        });
    }
}
