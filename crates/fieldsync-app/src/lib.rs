// ABOUTME: Application layer for fieldsync: the FieldApp state object, session context, and configuration.
// ABOUTME: This is the surface a UI layer talks to; it owns no rendering concerns.

pub mod app_state;
pub mod config;
pub mod session;

pub use app_state::{AppError, AppSettings, EnqueueOutcome, FieldApp, SharedApp};
pub use config::{ConfigError, FieldsyncConfig};
pub use session::{SESSION_KEY, SessionContext, SessionError};
