// ABOUTME: Defines the queued write records (downtime and maintenance) and their payloads.
// ABOUTME: A QueueItem carries an immutable id and owner fixed at creation time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Tenant stamped on records when no other partition is configured.
pub const DEFAULT_TENANT: &str = "demo_tenant";

/// The kinds of write that can be queued. Each kind has its own ordered queue
/// and its own durable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Downtime,
    Maintenance,
}

impl QueueKind {
    pub const ALL: [QueueKind; 2] = [QueueKind::Downtime, QueueKind::Maintenance];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Downtime => "downtime",
            QueueKind::Maintenance => "maintenance",
        }
    }

    /// Durable store key holding the serialized queue for this kind.
    pub fn storage_key(self) -> &'static str {
        match self {
            QueueKind::Downtime => "downtimeQueue",
            QueueKind::Maintenance => "maintenanceQueue",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a photo captured alongside a downtime record. The image itself
/// is owned by the capture layer; only its location travels with the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub uri: String,
    pub taken_at: DateTime<Utc>,
    pub machine_id: String,
}

/// A machine stoppage recorded by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeRecord {
    pub machine_id: String,
    pub parent_reason: String,
    pub child_reason: String,
    /// Combined reason label, `"<parent> → <child>"`.
    pub reason: String,
    pub operator: String,
    pub recorded_at: DateTime<Utc>,
    pub photo: Option<PhotoRef>,
}

impl DowntimeRecord {
    /// Build a record from a two-level reason selection. The combined reason
    /// label is derived from the parent and child labels.
    pub fn new(
        machine_id: impl Into<String>,
        parent_reason: impl Into<String>,
        child_reason: impl Into<String>,
        operator: impl Into<String>,
    ) -> Self {
        let parent_reason = parent_reason.into();
        let child_reason = child_reason.into();
        Self {
            machine_id: machine_id.into(),
            reason: format!("{} → {}", parent_reason, child_reason),
            parent_reason,
            child_reason,
            operator: operator.into(),
            recorded_at: Utc::now(),
            photo: None,
        }
    }

    pub fn with_photo(mut self, uri: impl Into<String>) -> Self {
        self.photo = Some(PhotoRef {
            uri: uri.into(),
            taken_at: Utc::now(),
            machine_id: self.machine_id.clone(),
        });
        self
    }
}

/// A maintenance task marked done on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceCompletion {
    pub task_id: String,
    pub machine_id: String,
    pub title: String,
    pub notes: String,
    pub completed_at: DateTime<Utc>,
    pub completed_by: String,
    /// Operator assigned to the task, when different from the person who closed it.
    pub operator: Option<String>,
}

impl MaintenanceCompletion {
    pub fn new(
        task_id: impl Into<String>,
        machine_id: impl Into<String>,
        title: impl Into<String>,
        completed_by: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            machine_id: machine_id.into(),
            title: title.into(),
            notes: String::new(),
            completed_at: Utc::now(),
            completed_by: completed_by.into(),
            operator: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Domain payload of a queued write. The variant determines which queue the
/// item lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemPayload {
    Downtime(DowntimeRecord),
    Maintenance(MaintenanceCompletion),
}

impl ItemPayload {
    pub fn kind(&self) -> QueueKind {
        match self {
            ItemPayload::Downtime(_) => QueueKind::Downtime,
            ItemPayload::Maintenance(_) => QueueKind::Maintenance,
        }
    }

    /// The user responsible for this payload: the operator for downtime, the
    /// completing user for maintenance (falling back to the assigned operator
    /// when the completing user is blank).
    pub fn owner(&self) -> &str {
        match self {
            ItemPayload::Downtime(record) => &record.operator,
            ItemPayload::Maintenance(done) => {
                if done.completed_by.trim().is_empty() {
                    done.operator.as_deref().unwrap_or_default()
                } else {
                    &done.completed_by
                }
            }
        }
    }

    pub fn machine_id(&self) -> &str {
        match self {
            ItemPayload::Downtime(record) => &record.machine_id,
            ItemPayload::Maintenance(done) => &done.machine_id,
        }
    }
}

impl From<DowntimeRecord> for ItemPayload {
    fn from(record: DowntimeRecord) -> Self {
        ItemPayload::Downtime(record)
    }
}

impl From<MaintenanceCompletion> for ItemPayload {
    fn from(done: MaintenanceCompletion) -> Self {
        ItemPayload::Maintenance(done)
    }
}

/// A pending write awaiting remote acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    id: String,
    owner: String,
    pub enqueued_at: DateTime<Utc>,
    pub synced: bool,
    pub tenant_id: String,
    pub payload: ItemPayload,
}

impl QueueItem {
    /// Create a fresh unsynced item. The id and owner are fixed here and have
    /// no setters.
    pub fn new(payload: ItemPayload, tenant_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(payload.kind(), now),
            owner: payload.owner().to_string(),
            enqueued_at: now,
            synced: false,
            tenant_id: tenant_id.into(),
            payload,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kind(&self) -> QueueKind {
        self.payload.kind()
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

/// `<kind>_<unix millis>_<9 char random suffix>`. The suffix comes from the
/// random half of a ULID.
fn generate_id(kind: QueueKind, at: DateTime<Utc>) -> String {
    let ulid = Ulid::new().to_string().to_lowercase();
    let suffix = &ulid[ulid.len() - 9..];
    format!("{}_{}_{}", kind.as_str(), at.timestamp_millis(), suffix)
}
