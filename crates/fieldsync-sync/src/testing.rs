// ABOUTME: Test utilities for fieldsync-sync, including a scripted remote acceptor.
// ABOUTME: Used in tests to drive sync outcomes and hold a call open without a real upstream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fieldsync_core::QueueItem;
use tokio::sync::Semaphore;

use crate::remote::{RemoteAcceptor, RemoteError};

/// A remote that replays scripted outcomes, then falls back to accepting.
///
/// Every call is recorded (the ids it was given) before it resolves. A held
/// remote blocks each call until [`release`](Self::release) is invoked.
#[derive(Default)]
pub struct ScriptedRemote {
    script: Mutex<VecDeque<Result<(), RemoteError>>>,
    submissions: Mutex<Vec<Vec<String>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedRemote {
    /// A remote that accepts every batch immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote whose calls wait for a `release()` each.
    pub fn held() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Queue an outcome for the next unscripted call.
    pub fn push_outcome(&self, outcome: Result<(), RemoteError>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(outcome);
    }

    /// Make the next call time out.
    pub fn fail_next(&self) {
        self.push_outcome(Err(RemoteError::Timeout));
    }

    /// Let one held call proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Number of calls that have started, including ones still held.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Item ids passed to each call, in call order.
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submissions.lock().expect("submissions lock").clone()
    }
}

#[async_trait]
impl RemoteAcceptor for ScriptedRemote {
    async fn submit(&self, items: &[QueueItem]) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.submissions
            .lock()
            .expect("submissions lock")
            .push(items.iter().map(|item| item.id().to_string()).collect());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate semaphore is never closed")
                .forget();
        }

        let next = self.script.lock().expect("script lock").pop_front();
        next.unwrap_or(Ok(()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_outcomes_then_accepts() {
        let remote = ScriptedRemote::new();
        remote.fail_next();
        remote.push_outcome(Err(RemoteError::Rejected("nope".to_string())));

        assert_eq!(remote.submit(&[]).await, Err(RemoteError::Timeout));
        assert_eq!(
            remote.submit(&[]).await,
            Err(RemoteError::Rejected("nope".to_string()))
        );
        assert_eq!(remote.submit(&[]).await, Ok(()));
        assert_eq!(remote.call_count(), 3);
        assert_eq!(remote.submissions().len(), 3);
    }

    #[tokio::test]
    async fn held_remote_waits_for_release() {
        let remote = Arc::new(ScriptedRemote::held());
        let task = {
            let remote = Arc::clone(&remote);
            tokio::spawn(async move { remote.submit(&[]).await })
        };

        tokio::task::yield_now().await;
        assert_eq!(remote.call_count(), 1);
        assert!(!task.is_finished());

        remote.release();
        assert_eq!(task.await.unwrap(), Ok(()));
    }
}
