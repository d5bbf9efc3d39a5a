// ABOUTME: Application state object wiring the queue, sync engine, connectivity, and session together.
// ABOUTME: Created once at startup and passed by reference to whatever renders the UI.

use std::sync::{Arc, Mutex, RwLock};

use fieldsync_core::{
    ConnectivityMonitor, DowntimeRecord, EventDispatcher, ItemPayload, MaintenanceCompletion,
    NetworkStatus, QueueItem, ReachabilityProbe, Subscription, SyncEvent, SyncState,
};
use fieldsync_store::{DurableStore, QueueError, QueueStore};
use fieldsync_sync::{RemoteAcceptor, SyncEngine, SyncError, SyncOptions, SyncReport};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::session::{SessionContext, SessionError};

/// Errors surfaced by application-level operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("no user is signed in")]
    NotSignedIn,
}

/// Settings that shape how the app is assembled.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub tenant_id: String,
    pub sync: SyncOptions,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tenant_id: fieldsync_core::DEFAULT_TENANT.to_string(),
            sync: SyncOptions::default(),
        }
    }
}

/// Result of recording a write. The write itself succeeded; `auto_sync`
/// carries the outcome of the opportunistic sync, when one was attempted.
#[derive(Debug)]
pub struct EnqueueOutcome {
    pub item: QueueItem,
    pub auto_sync: Option<Result<SyncReport, SyncError>>,
}

/// The running application. Owns every component of the offline write path.
pub struct FieldApp {
    dispatcher: EventDispatcher,
    queue: Arc<QueueStore>,
    engine: SyncEngine,
    connectivity: ConnectivityMonitor,
    network: Arc<RwLock<NetworkStatus>>,
    session: SessionContext,
    network_subscription: Mutex<Option<Subscription>>,
}

/// Type alias for the Arc-wrapped app shared across UI surfaces.
pub type SharedApp = Arc<FieldApp>;

fn read_status(network: &RwLock<NetworkStatus>) -> NetworkStatus {
    match network.read() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn update_status(network: &RwLock<NetworkStatus>, f: impl FnOnce(&mut NetworkStatus)) {
    let mut guard = match network.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard);
}

impl FieldApp {
    /// Assemble the app: reload queues and session from the durable store,
    /// probe connectivity once, and start tracking reachability transitions.
    pub async fn start(
        store: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteAcceptor>,
        probe: Arc<dyn ReachabilityProbe>,
        settings: AppSettings,
    ) -> Result<Self, AppError> {
        let dispatcher = EventDispatcher::new();

        let queue = Arc::new(QueueStore::new(
            Arc::clone(&store),
            dispatcher.clone(),
            settings.tenant_id,
        ));
        let loaded = queue.load().await?;
        if !loaded.recovered.is_empty() {
            tracing::warn!(queues = ?loaded.recovered, "recovered malformed queues as empty");
        }

        let session = SessionContext::new(store);
        session.restore().await?;

        let engine = SyncEngine::new(Arc::clone(&queue), remote, dispatcher.clone(), settings.sync);

        let connectivity = ConnectivityMonitor::new(probe);
        let online = connectivity.check_now().await;
        let network = Arc::new(RwLock::new(NetworkStatus::initial(online)));
        // Seed the monitor so a repeat of the initial state is not a transition.
        connectivity.publish(online);
        let subscription = {
            let network = Arc::clone(&network);
            connectivity.subscribe(move |is_online| {
                update_status(&network, |status| status.observe(is_online));
            })
        };

        tracing::info!(
            online,
            tenant = queue.tenant_id(),
            pending = loaded.queues.len(),
            "field app started"
        );

        Ok(Self {
            dispatcher,
            queue,
            engine,
            connectivity,
            network,
            session,
            network_subscription: Mutex::new(Some(subscription)),
        })
    }

    /// Record a write and, if the connection has been stable, sync its owner.
    ///
    /// The write is durable before anything else happens. The follow-up sync
    /// runs to completion before this returns; its failure does not undo the
    /// write.
    pub async fn enqueue(&self, payload: impl Into<ItemPayload>) -> Result<EnqueueOutcome, AppError> {
        let item = self.queue.enqueue(payload).await?;

        let auto_sync = if self.network_status().allows_auto_sync() {
            let result = self.engine.sync(item.owner()).await;
            match &result {
                Err(e) if !e.is_retryable() => {
                    tracing::debug!(owner = item.owner(), error = %e, "auto-sync skipped");
                }
                Err(e) => {
                    tracing::warn!(owner = item.owner(), error = %e, "auto-sync after enqueue failed");
                }
                Ok(_) => {}
            }
            Some(result)
        } else {
            tracing::debug!(item_id = item.id(), "offline or recently offline, leaving item queued");
            None
        };

        Ok(EnqueueOutcome { item, auto_sync })
    }

    /// Record downtime for the signed-in operator.
    pub async fn record_downtime(
        &self,
        machine_id: &str,
        parent_reason: &str,
        child_reason: &str,
        photo_uri: Option<&str>,
    ) -> Result<EnqueueOutcome, AppError> {
        let user = self.session.user_id().await.ok_or(AppError::NotSignedIn)?;
        let mut record = DowntimeRecord::new(machine_id, parent_reason, child_reason, user);
        if let Some(uri) = photo_uri {
            record = record.with_photo(uri);
        }
        self.enqueue(record).await
    }

    /// Mark a maintenance task complete as the signed-in user.
    pub async fn complete_maintenance(
        &self,
        task_id: &str,
        machine_id: &str,
        title: &str,
        notes: &str,
    ) -> Result<EnqueueOutcome, AppError> {
        let user = self.session.user_id().await.ok_or(AppError::NotSignedIn)?;
        let done = MaintenanceCompletion::new(task_id, machine_id, title, user).with_notes(notes);
        self.enqueue(done).await
    }

    /// Manual sync for `owner`. Refused while offline.
    pub async fn trigger_sync(&self, owner: &str) -> Result<SyncReport, SyncError> {
        if !self.is_online() {
            tracing::info!(owner, "sync requested while offline");
            return Err(SyncError::Offline);
        }
        self.engine.sync(owner).await
    }

    pub async fn pending_count_for_owner(&self, owner: &str) -> usize {
        self.queue.pending_count_for_owner(owner).await
    }

    /// Pending count for the signed-in user; zero when signed out.
    pub async fn pending_count(&self) -> usize {
        match self.session.user_id().await {
            Some(user) => self.queue.pending_count_for_owner(&user).await,
            None => 0,
        }
    }

    pub async fn pending_for_machine(&self, owner: &str, machine_id: &str) -> usize {
        self.queue.pending_for_machine(owner, machine_id).await
    }

    pub fn network_status(&self) -> NetworkStatus {
        read_status(&self.network)
    }

    pub fn is_online(&self) -> bool {
        self.network_status().is_online
    }

    pub fn was_offline(&self) -> bool {
        self.network_status().was_offline
    }

    /// Clear the latched offline flag. Left to the UI: the engine never clears it.
    pub fn reset_was_offline(&self) {
        update_status(&self.network, NetworkStatus::reset_was_offline);
    }

    /// Whether to show the "tap to sync" affordance. Hidden when the
    /// signed-in user has nothing pending.
    pub async fn sync_prompt_visible(&self) -> bool {
        let status = self.network_status();
        if !(status.was_offline && status.is_online) || self.engine.is_syncing() {
            return false;
        }
        self.pending_count().await > 0
    }

    /// Feed a reachability report from the platform source.
    pub fn report_connectivity(&self, is_online: bool) {
        self.connectivity.publish(is_online);
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn sync_state(&self) -> SyncState {
        self.engine.state()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.dispatcher.subscribe()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.queue
    }

    /// Stop tracking connectivity. Safe to call more than once.
    pub fn shutdown(&self) {
        let subscription = match self.network_subscription.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            tracing::info!("field app shut down");
        }
        self.connectivity.shutdown();
    }
}
