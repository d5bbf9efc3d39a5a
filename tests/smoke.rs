// ABOUTME: End-to-end smoke tests for the offline write path.
// ABOUTME: Drives FieldApp over a real SQLite file through record, fail, retry, restart, and reconnect.

use std::sync::Arc;
use std::time::Duration;

use fieldsync_app::{AppSettings, FieldApp};
use fieldsync_core::{DowntimeRecord, ManualReachability, QueueKind, Session};
use fieldsync_store::{MemoryStore, SqliteStore};
use fieldsync_sync::testing::ScriptedRemote;
use fieldsync_sync::SyncError;

struct Fixture {
    _dir: tempfile::TempDir,
    db: std::path::PathBuf,
    remote: Arc<ScriptedRemote>,
    probe: ManualReachability,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("fieldsync.db");
        Self {
            _dir: dir,
            db,
            remote: Arc::new(ScriptedRemote::new()),
            probe: ManualReachability::new(false),
        }
    }

    async fn start(&self) -> FieldApp {
        let store = SqliteStore::open(&self.db).unwrap();
        FieldApp::start(
            Arc::new(store),
            self.remote.clone(),
            Arc::new(self.probe.clone()),
            AppSettings::default(),
        )
        .await
        .unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn single_item_drains_on_sync() {
    let fx = Fixture::new();
    let app = fx.start().await;

    let outcome = app
        .enqueue(DowntimeRecord::new("M-101", "Power", "Grid", "op1"))
        .await
        .unwrap();
    assert!(outcome.auto_sync.is_none(), "started offline");
    match &outcome.item.payload {
        fieldsync_core::ItemPayload::Downtime(record) => {
            assert_eq!(record.reason, "Power → Grid");
            assert_eq!(record.machine_id, "M-101");
        }
        other => panic!("expected downtime payload, got {:?}", other),
    }

    app.report_connectivity(true);
    let report = app.trigger_sync("op1").await.unwrap();

    assert_eq!(report.synced_item_count, 1);
    assert!(
        app.queue()
            .items_for_owner(QueueKind::Downtime, "op1")
            .await
            .is_empty()
    );
    let state = app.sync_state();
    assert!(state.last_sync_timestamp.is_some());
    assert_eq!(state.sync_attempts, 0);
    assert!(!state.is_syncing);
}

#[tokio::test(start_paused = true)]
async fn sync_leaves_other_owners_alone() {
    let fx = Fixture::new();
    let app = fx.start().await;
    app.enqueue(DowntimeRecord::new("M-101", "Power", "Grid", "op1")).await.unwrap();
    app.enqueue(DowntimeRecord::new("M-102", "Tooling", "Jam", "op1")).await.unwrap();
    let kept = app
        .enqueue(DowntimeRecord::new("M-103", "Material", "Shortage", "op2"))
        .await
        .unwrap()
        .item;

    app.report_connectivity(true);
    assert_eq!(app.trigger_sync("op1").await.unwrap().synced_item_count, 2);

    let snapshot = app.queue().snapshot().await;
    let remaining = snapshot.get(QueueKind::Downtime);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), kept.id());
    assert_eq!(remaining[0].owner(), "op2");
    assert_eq!(fx.remote.submissions()[0].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_sync_keeps_items_and_retry_drains() {
    let fx = Fixture::new();
    let app = fx.start().await;
    app.enqueue(DowntimeRecord::new("M-101", "Power", "Grid", "op1")).await.unwrap();
    app.report_connectivity(true);

    fx.remote.fail_next();
    let err = app.trigger_sync("op1").await.unwrap_err();
    assert!(matches!(err, SyncError::Transient { attempts: 1, .. }));
    assert!(!err.is_fatal());
    assert_eq!(app.pending_count_for_owner("op1").await, 1);
    assert_eq!(app.sync_state().sync_attempts, 1);

    let before = tokio::time::Instant::now();
    let report = app.trigger_sync("op1").await.unwrap();
    assert!(before.elapsed() >= Duration::from_millis(2000));
    assert_eq!(report.synced_item_count, 1);
    assert_eq!(app.pending_count_for_owner("op1").await, 0);
    assert_eq!(app.sync_state().sync_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn offline_latch_survives_reconnect_until_reset() {
    let fx = Fixture::new();
    fx.probe.set(true);
    let app = fx.start().await;
    assert!(app.is_online());
    assert!(!app.was_offline());

    app.report_connectivity(false);
    assert!(!app.is_online());
    assert!(app.was_offline());

    app.report_connectivity(true);
    assert!(app.is_online());
    assert!(app.was_offline(), "latch holds after returning online");

    app.session().sign_in(Session::operator("op1")).await.unwrap();
    let outcome = app.record_downtime("M-101", "Power", "Grid", None).await.unwrap();
    assert!(outcome.auto_sync.is_none(), "no auto-sync while latched");
    assert!(app.sync_prompt_visible().await);

    app.reset_was_offline();
    assert!(!app.was_offline());
    assert!(!app.sync_prompt_visible().await);
}

#[tokio::test(start_paused = true)]
async fn queued_items_and_session_survive_restart() {
    let fx = Fixture::new();
    {
        let app = fx.start().await;
        app.session().sign_in(Session::operator("op1")).await.unwrap();
        app.record_downtime("M-101", "Power", "Grid", None).await.unwrap();
        app.record_downtime("M-102", "Tooling", "Jam", Some("file:///photo.jpg"))
            .await
            .unwrap();
        app.complete_maintenance("t-9", "M-101", "Grease bearings", "")
            .await
            .unwrap();
        app.shutdown();
    }

    let app = fx.start().await;
    assert_eq!(app.session().user_id().await.as_deref(), Some("op1"));
    let downtime = app.queue().items_for_owner(QueueKind::Downtime, "op1").await;
    let machines: Vec<&str> = downtime.iter().map(|item| item.payload.machine_id()).collect();
    assert_eq!(machines, vec!["M-101", "M-102"]);
    assert!(downtime.iter().all(|item| !item.synced));
    assert_eq!(app.pending_count().await, 3);
    assert_eq!(app.pending_for_machine("op1", "M-101").await, 2);
}

#[tokio::test(start_paused = true)]
async fn second_sync_while_one_is_in_flight_is_rejected() {
    let store = MemoryStore::new();
    let remote = Arc::new(ScriptedRemote::held());
    let app = Arc::new(
        FieldApp::start(
            Arc::new(store),
            remote.clone(),
            Arc::new(ManualReachability::new(false)),
            AppSettings::default(),
        )
        .await
        .unwrap(),
    );
    app.enqueue(DowntimeRecord::new("M-101", "Power", "Grid", "op1")).await.unwrap();
    app.report_connectivity(true);

    let first = {
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.trigger_sync("op1").await })
    };
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(app.sync_state().is_syncing);

    let second = app.trigger_sync("op1").await.unwrap_err();
    assert!(matches!(second, SyncError::ConcurrentSyncRejected));
    assert_eq!(remote.call_count(), 1);

    remote.release();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.synced_item_count, 1);
    assert!(!app.sync_state().is_syncing);
}

#[tokio::test(start_paused = true)]
async fn backoff_delay_grows_and_caps() {
    let fx = Fixture::new();
    let app = fx.start().await;
    app.enqueue(DowntimeRecord::new("M-101", "Power", "Grid", "op1")).await.unwrap();
    app.report_connectivity(true);

    let expected_ms = [1000, 2000, 4000, 8000, 10000, 10000];
    for (failures, expected) in expected_ms.iter().enumerate() {
        assert_eq!(
            app.sync_state().sync_attempts as usize,
            failures,
            "attempts before call {}",
            failures
        );
        let before = tokio::time::Instant::now();
        fx.remote.fail_next();
        let _ = app.trigger_sync("op1").await;
        let elapsed = before.elapsed();
        assert!(elapsed >= Duration::from_millis(*expected));
        assert!(elapsed < Duration::from_millis(*expected + 5));
    }
}
