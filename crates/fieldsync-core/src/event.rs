// ABOUTME: Event envelope and payload variants describing queue and sync state changes.
// ABOUTME: Events are notifications for the UI layer; they are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::QueueKind;

/// A sequenced, timestamped notification. `seq` is strictly increasing per
/// dispatcher, so subscribers can detect gaps after a lagged receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: SyncEventPayload,
}

/// Why a queue's contents changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum QueueChange {
    Loaded,
    Enqueued { item_id: String, owner: String },
    Evicted { removed: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEventPayload {
    QueueChanged {
        queue: QueueKind,
        len: usize,
        change: QueueChange,
    },
    SyncStarted {
        owner: String,
        item_count: usize,
    },
    SyncSucceeded {
        owner: String,
        synced_item_count: usize,
    },
    SyncFailed {
        owner: String,
        reason: String,
        attempts: u32,
    },
}

impl SyncEventPayload {
    /// Short name of the variant, used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEventPayload::QueueChanged { .. } => "queue_changed",
            SyncEventPayload::SyncStarted { .. } => "sync_started",
            SyncEventPayload::SyncSucceeded { .. } => "sync_succeeded",
            SyncEventPayload::SyncFailed { .. } => "sync_failed",
        }
    }
}
