// ABOUTME: Configuration loading and validation for fieldsync.
// ABOUTME: Reads FIELDSYNC_* environment variables and rejects out-of-range values.

use std::path::PathBuf;
use std::time::Duration;

use fieldsync_core::DEFAULT_TENANT;
use fieldsync_sync::SyncOptions;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FIELDSYNC_FAULT_RATE must be a number between 0 and 1, got: {0}")]
    InvalidFaultRate(String),

    #[error("FIELDSYNC_REMOTE_TIMEOUT_MS must be a positive integer, got: {0}")]
    InvalidTimeout(String),

    #[error("FIELDSYNC_TENANT must not be blank")]
    BlankTenant,
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct FieldsyncConfig {
    pub home: PathBuf,
    pub tenant_id: String,
    pub fault_rate: f64,
    pub remote_timeout: Option<Duration>,
    pub sync_user: Option<String>,
}

impl FieldsyncConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - FIELDSYNC_HOME: data directory (default: ~/.fieldsync)
    /// - FIELDSYNC_TENANT: tenant stamped on queued records (default: demo_tenant)
    /// - FIELDSYNC_FAULT_RATE: simulated remote failure probability, 0..=1 (default: 0)
    /// - FIELDSYNC_REMOTE_TIMEOUT_MS: cap on one remote call (default: none)
    /// - FIELDSYNC_USER: user to sync on startup (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = var("FIELDSYNC_HOME").map(PathBuf::from).unwrap_or_else(|| {
            var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".fieldsync")
        });

        let tenant_id = match lookup("FIELDSYNC_TENANT") {
            None => DEFAULT_TENANT.to_string(),
            Some(t) if t.trim().is_empty() => return Err(ConfigError::BlankTenant),
            Some(t) => t.trim().to_string(),
        };

        let fault_rate = match var("FIELDSYNC_FAULT_RATE") {
            None => 0.0,
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(rate) if (0.0..=1.0).contains(&rate) => rate,
                _ => return Err(ConfigError::InvalidFaultRate(raw)),
            },
        };

        let remote_timeout = match var("FIELDSYNC_REMOTE_TIMEOUT_MS") {
            None => None,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
        };

        let sync_user = var("FIELDSYNC_USER").map(|u| u.trim().to_string());

        Ok(Self {
            home,
            tenant_id,
            fault_rate,
            remote_timeout,
            sync_user,
        })
    }

    /// Location of the SQLite durable store.
    pub fn db_path(&self) -> PathBuf {
        self.home.join("fieldsync.db")
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            remote_timeout: self.remote_timeout,
            ..SyncOptions::default()
        }
    }
}
