// ABOUTME: Holds the signed-in session and persists it so a restart keeps the user signed in.
// ABOUTME: Signing out clears the session only; queued items stay on the device.

use std::sync::Arc;

use fieldsync_core::Session;
use fieldsync_store::{DurableStore, StoreError};
use thiserror::Error;
use tokio::sync::RwLock;

/// Durable key the active session is stored under.
pub const SESSION_KEY: &str = "userData";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct SessionContext {
    store: Arc<dyn DurableStore>,
    current: RwLock<Option<Session>>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Load the persisted session, if any. An unreadable record is logged and
    /// treated as signed out.
    pub async fn restore(&self) -> Result<Option<Session>, SessionError> {
        let restored = match self.store.get(SESSION_KEY).await? {
            None => None,
            Some(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed saved session, ignoring");
                    None
                }
            },
        };

        if let Some(session) = &restored {
            tracing::info!(user = %session.user_id, role = %session.role, "restored session");
        }
        *self.current.write().await = restored.clone();
        Ok(restored)
    }

    /// Persist and activate a session.
    pub async fn sign_in(&self, session: Session) -> Result<(), SessionError> {
        let json = serde_json::to_string(&session)?;
        self.store.set(SESSION_KEY, &json).await?;
        tracing::info!(user = %session.user_id, role = %session.role, "signed in");
        *self.current.write().await = Some(session);
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.store.remove(SESSION_KEY).await?;
        if let Some(previous) = self.current.write().await.take() {
            tracing::info!(user = %previous.user_id, "signed out");
        }
        Ok(())
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|s| s.user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::Role;
    use fieldsync_store::MemoryStore;

    #[tokio::test]
    async fn session_survives_restart() {
        let store = MemoryStore::new();
        let ctx = SessionContext::new(Arc::new(store.clone()));
        assert!(ctx.restore().await.unwrap().is_none());

        ctx.sign_in(Session::supervisor("sup1")).await.unwrap();
        assert_eq!(ctx.user_id().await.as_deref(), Some("sup1"));

        let reopened = SessionContext::new(Arc::new(store));
        let restored = reopened.restore().await.unwrap().expect("session restored");
        assert_eq!(restored.role, Role::Supervisor);
        assert_eq!(reopened.current().await, Some(restored));
    }

    #[tokio::test]
    async fn sign_out_clears_persisted_session() {
        let store = MemoryStore::new();
        let ctx = SessionContext::new(Arc::new(store.clone()));
        ctx.sign_in(Session::operator("op1")).await.unwrap();
        ctx.sign_out().await.unwrap();
        ctx.sign_out().await.unwrap();

        assert!(ctx.current().await.is_none());
        assert_eq!(store.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_session_is_ignored() {
        let store = MemoryStore::new();
        store.set(SESSION_KEY, "not-a-session").await.unwrap();
        let ctx = SessionContext::new(Arc::new(store));
        assert!(ctx.restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_sign_in_keeps_previous_session() {
        let store = MemoryStore::new();
        let ctx = SessionContext::new(Arc::new(store.clone()));
        ctx.sign_in(Session::operator("op1")).await.unwrap();

        store.fail_writes(true);
        assert!(ctx.sign_in(Session::operator("op2")).await.is_err());
        assert_eq!(ctx.user_id().await.as_deref(), Some("op1"));
    }
}
