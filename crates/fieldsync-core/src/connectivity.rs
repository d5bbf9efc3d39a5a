// ABOUTME: Connectivity monitor: one-shot reachability probe plus callback subscriptions.
// ABOUTME: Subscriptions are guards that deregister on unsubscribe() or drop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;

/// Platform reachability source.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probe whose answer is set by hand. Used by the binary (no platform
/// integration) and by tests to script transitions.
#[derive(Debug, Clone)]
pub struct ManualReachability {
    online: Arc<AtomicBool>,
}

impl ManualReachability {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityProbe for ManualReachability {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback>,
    last_observed: Option<bool>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Observes reachability and fans transitions out to subscribers.
///
/// The platform source calls [`publish`](Self::publish) on every reachability
/// report; subscribers are only invoked when the value changes (the first
/// report always counts as a change).
pub struct ConnectivityMonitor {
    probe: Arc<dyn ReachabilityProbe>,
    registry: Arc<Mutex<Registry>>,
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self {
            probe,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Probe reachability right now. Independent of subscriptions.
    pub async fn check_now(&self) -> bool {
        self.probe.is_reachable().await
    }

    /// Register a callback for reachability transitions.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, Arc::new(callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Report a reachability observation. Returns true when it was a transition
    /// and subscribers were notified.
    pub fn publish(&self, is_online: bool) -> bool {
        let callbacks: Vec<Callback> = {
            let mut registry = lock(&self.registry);
            if registry.last_observed == Some(is_online) {
                return false;
            }
            registry.last_observed = Some(is_online);
            registry.callbacks.values().cloned().collect()
        };

        tracing::info!(
            online = is_online,
            subscribers = callbacks.len(),
            "network status changed"
        );
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        for callback in callbacks {
            callback(is_online);
        }
        true
    }

    /// Last value passed to `publish`, if any.
    pub fn last_observed(&self) -> Option<bool> {
        lock(&self.registry).last_observed
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).callbacks.len()
    }

    /// Drop every subscription. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut registry = lock(&self.registry);
        if !registry.callbacks.is_empty() {
            tracing::debug!(count = registry.callbacks.len(), "clearing connectivity subscriptions");
        }
        registry.callbacks.clear();
    }
}

/// Handle for one registered callback. Deregisters when `unsubscribe` is
/// called or the handle is dropped, whichever comes first.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    fn release(&self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).callbacks.remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<bool>>>, impl Fn(bool) + Send + Sync + 'static) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |online| sink.lock().unwrap().push(online))
    }

    #[tokio::test]
    async fn check_now_reads_probe_without_subscribers() {
        let probe = ManualReachability::new(false);
        let monitor = ConnectivityMonitor::new(Arc::new(probe.clone()));
        assert!(!monitor.check_now().await);
        probe.set(true);
        assert!(monitor.check_now().await);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_receive_each_transition_once() {
        let monitor = ConnectivityMonitor::new(Arc::new(ManualReachability::new(true)));
        let (seen_a, cb_a) = recorder();
        let (seen_b, cb_b) = recorder();
        let _a = monitor.subscribe(cb_a);
        let _b = monitor.subscribe(cb_b);
        assert_eq!(monitor.last_observed(), None);

        assert!(monitor.publish(true));
        assert_eq!(monitor.last_observed(), Some(true));
        assert!(!monitor.publish(true), "repeat report is not a transition");
        assert!(monitor.publish(false));
        assert!(monitor.publish(true));
        assert_eq!(monitor.last_observed(), Some(true));

        assert_eq!(*seen_a.lock().unwrap(), vec![true, false, true]);
        assert_eq!(*seen_b.lock().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn unsubscribe_and_drop_deregister() {
        let monitor = ConnectivityMonitor::new(Arc::new(ManualReachability::new(true)));
        let (seen, cb) = recorder();
        let sub = monitor.subscribe(cb);
        {
            let (_other_seen, other) = recorder();
            let _scoped = monitor.subscribe(other);
            assert_eq!(monitor.subscriber_count(), 2);
        }
        assert_eq!(monitor.subscriber_count(), 1);

        monitor.publish(false);
        sub.unsubscribe();
        monitor.publish(true);

        assert_eq!(*seen.lock().unwrap(), vec![false]);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let monitor = ConnectivityMonitor::new(Arc::new(ManualReachability::new(true)));
        monitor.shutdown();

        let (seen, cb) = recorder();
        let sub = monitor.subscribe(cb);
        monitor.shutdown();
        monitor.shutdown();
        monitor.publish(false);

        assert!(seen.lock().unwrap().is_empty());
        // Dropping a handle after shutdown is harmless.
        drop(sub);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[test]
    fn subscription_outliving_monitor_is_harmless() {
        let monitor = ConnectivityMonitor::new(Arc::new(ManualReachability::new(true)));
        let (_seen, cb) = recorder();
        let sub = monitor.subscribe(cb);
        drop(monitor);
        sub.unsubscribe();
    }
}
