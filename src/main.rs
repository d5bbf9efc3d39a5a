// ABOUTME: Entry point for the fieldsync binary.
// ABOUTME: Loads config from the environment, opens the durable store, and reports or drains pending work.

use std::sync::Arc;
use std::time::Duration;

use fieldsync_app::{AppSettings, FieldApp, FieldsyncConfig};
use fieldsync_core::ManualReachability;
use fieldsync_store::SqliteStore;
use fieldsync_sync::SimulatedRemote;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fieldsync=debug")),
        )
        .init();

    let config = FieldsyncConfig::from_env()?;
    tracing::info!(
        home = %config.home.display(),
        tenant = %config.tenant_id,
        fault_rate = config.fault_rate,
        "fieldsync starting up"
    );

    let store = SqliteStore::open(&config.db_path())?;
    let remote = SimulatedRemote::new(Duration::ZERO, config.fault_rate);
    let probe = ManualReachability::new(true);

    let settings = AppSettings {
        tenant_id: config.tenant_id.clone(),
        sync: config.sync_options(),
    };
    let app = FieldApp::start(Arc::new(store), Arc::new(remote), Arc::new(probe), settings).await?;

    let user = config
        .sync_user
        .clone()
        .or(app.session().user_id().await);

    match user {
        Some(user) => {
            let pending = app.pending_count_for_owner(&user).await;
            tracing::info!(user = %user, pending, "pending items");
            if pending > 0 {
                match app.trigger_sync(&user).await {
                    Ok(report) => {
                        tracing::info!(user = %user, synced = report.synced_item_count, "sync finished")
                    }
                    Err(e) => tracing::warn!(user = %user, error = %e, "sync did not complete"),
                }
            }
        }
        None => tracing::info!("no user configured or signed in, nothing to sync"),
    }

    app.shutdown();
    Ok(())
}
