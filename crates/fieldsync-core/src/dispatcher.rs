// ABOUTME: Broadcast-based event dispatcher for queue and sync notifications.
// ABOUTME: Notify is synchronous and best-effort; subscribers unsubscribe by dropping their receiver.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::event::{SyncEvent, SyncEventPayload};

const CHANNEL_CAPACITY: usize = 256;

/// Cloneable handle to a single event channel. All clones share one sequence
/// counter, so events carry a global order.
#[derive(Clone)]
pub struct EventDispatcher {
    tx: broadcast::Sender<SyncEvent>,
    next_seq: Arc<Mutex<u64>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            next_seq: Arc::new(Mutex::new(1)),
        }
    }

    /// Stamp and broadcast an event. Returns the event that was sent. Having no
    /// subscribers is not an error.
    pub fn notify(&self, payload: SyncEventPayload) -> SyncEvent {
        // Sequence assignment and send happen under one lock so delivery order
        // matches seq order.
        let mut next_seq = match self.next_seq.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let event = SyncEvent {
            seq: *next_seq,
            timestamp: Utc::now(),
            payload,
        };
        *next_seq += 1;

        tracing::debug!(seq = event.seq, kind = event.payload.name(), "dispatching event");
        let _ = self.tx.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`. Lagged receives surface as stream errors.
    pub fn stream(&self) -> BroadcastStream<SyncEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
