// ABOUTME: Sync bookkeeping (attempts, last success, last error) and the network status latch.
// ABOUTME: Both are plain values mutated by their owners and read by the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;

/// Observable state of the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub is_syncing: bool,
    pub sync_attempts: u32,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.sync_attempts = 0;
        self.last_sync_timestamp = Some(at);
        self.last_sync_error = None;
    }

    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.sync_attempts = self.sync_attempts.saturating_add(1);
        self.last_sync_error = Some(reason.into());
    }

    /// Delay the next attempt will wait under `policy`.
    pub fn next_delay(&self, policy: &BackoffPolicy) -> std::time::Duration {
        policy.delay(self.sync_attempts)
    }
}

/// Reachability as seen by the consumer, plus the latched `was_offline` flag.
///
/// `was_offline` goes true on any offline observation and stays true through
/// later online observations; only `reset_was_offline` clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_online: bool,
    pub was_offline: bool,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            is_online: true,
            was_offline: false,
        }
    }
}

impl NetworkStatus {
    /// Status from the first probe at startup. Starting offline counts as an
    /// offline observation.
    pub fn initial(is_online: bool) -> Self {
        Self {
            is_online,
            was_offline: !is_online,
        }
    }

    pub fn observe(&mut self, is_online: bool) {
        self.is_online = is_online;
        if !is_online {
            self.was_offline = true;
        }
    }

    pub fn reset_was_offline(&mut self) {
        self.was_offline = false;
    }

    /// Auto-sync after a write only fires on a connection that has not dropped
    /// since the latch was last cleared.
    pub fn allows_auto_sync(&self) -> bool {
        self.is_online && !self.was_offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_then_success_resets_attempts() {
        let mut state = SyncState::new();
        state.record_failure("Network timeout");
        state.record_failure("Network timeout");
        assert_eq!(state.sync_attempts, 2);
        assert_eq!(state.last_sync_error.as_deref(), Some("Network timeout"));
        assert_eq!(
            state.next_delay(&BackoffPolicy::default()),
            std::time::Duration::from_secs(4)
        );

        let now = Utc::now();
        state.record_success(now);
        assert_eq!(state.sync_attempts, 0);
        assert_eq!(state.last_sync_timestamp, Some(now));
        assert!(state.last_sync_error.is_none());
    }

    #[test]
    fn was_offline_latches_through_reconnect() {
        let mut net = NetworkStatus::initial(true);
        assert!(net.allows_auto_sync());

        net.observe(false);
        assert!(!net.is_online);
        assert!(net.was_offline);

        net.observe(true);
        net.observe(true);
        assert!(net.is_online);
        assert!(net.was_offline, "latch must survive reconnect");
        assert!(!net.allows_auto_sync());

        net.reset_was_offline();
        assert!(!net.was_offline);
        assert!(net.allows_auto_sync());
    }

    #[test]
    fn starting_offline_sets_latch() {
        let net = NetworkStatus::initial(false);
        assert!(net.was_offline);
    }
}
