// ABOUTME: Core library for fieldsync, containing domain types, sync state, and notifications.
// ABOUTME: Defines queued records, the backoff policy, the connectivity monitor, and the event dispatcher.

pub mod backoff;
pub mod connectivity;
pub mod dispatcher;
pub mod event;
pub mod item;
pub mod session;
pub mod state;

pub use backoff::{BackoffPolicy, backoff_delay};
pub use connectivity::{ConnectivityMonitor, ManualReachability, ReachabilityProbe, Subscription};
pub use dispatcher::EventDispatcher;
pub use event::{QueueChange, SyncEvent, SyncEventPayload};
pub use item::{
    DEFAULT_TENANT, DowntimeRecord, ItemPayload, MaintenanceCompletion, PhotoRef, QueueItem,
    QueueKind,
};
pub use session::{Role, Session};
pub use state::{NetworkStatus, SyncState};
