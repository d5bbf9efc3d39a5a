// ABOUTME: Defines the RemoteAcceptor trait that every upstream adapter implements.
// ABOUTME: Also provides SimulatedRemote, a stand-in backend with optional fault injection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fieldsync_core::QueueItem;
use rand::Rng;

/// Errors an upstream can report for a batch. All are recoverable from the
/// queue's point of view: the batch stays pending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Network timeout")]
    Timeout,

    #[error("Rejected by remote: {0}")]
    Rejected(String),

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Trait that upstream adapters implement. A call either accepts the whole
/// batch or fails it; partial acceptance is not modelled.
#[async_trait]
pub trait RemoteAcceptor: Send + Sync {
    async fn submit(&self, items: &[QueueItem]) -> Result<(), RemoteError>;

    /// Adapter name for logging.
    fn name(&self) -> &str;
}

/// Backend used when no real upstream is wired in. Accepts every batch after
/// a fixed latency, except that with `fault_rate > 0` it times out at random.
/// It never fails twice in a row, so a retry after an induced fault succeeds.
pub struct SimulatedRemote {
    latency: Duration,
    fault_rate: f64,
    last_failed: AtomicBool,
}

impl Default for SimulatedRemote {
    fn default() -> Self {
        Self::new(Duration::ZERO, 0.0)
    }
}

impl SimulatedRemote {
    /// `fault_rate` is clamped to `[0, 1]`; NaN disables faults.
    pub fn new(latency: Duration, fault_rate: f64) -> Self {
        let fault_rate = if fault_rate.is_nan() {
            0.0
        } else {
            fault_rate.clamp(0.0, 1.0)
        };
        Self {
            latency,
            fault_rate,
            last_failed: AtomicBool::new(false),
        }
    }

    pub fn fault_rate(&self) -> f64 {
        self.fault_rate
    }

    fn roll_fault(&self) -> bool {
        if self.fault_rate <= 0.0 || self.last_failed.load(Ordering::SeqCst) {
            return false;
        }
        rand::thread_rng().gen_bool(self.fault_rate)
    }
}

#[async_trait]
impl RemoteAcceptor for SimulatedRemote {
    async fn submit(&self, items: &[QueueItem]) -> Result<(), RemoteError> {
        let fail = self.roll_fault();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.last_failed.store(fail, Ordering::SeqCst);
        if fail {
            tracing::debug!(items = items.len(), "simulated remote injecting timeout");
            return Err(RemoteError::Timeout);
        }
        tracing::info!(items = items.len(), "simulated remote accepted batch");
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
