use omega_model::SEED_CEO_ID;
use omega_store::{
    ConnectivityStatus, KeyValueBackend, LocalCache, LocalEntry, MemoryRemoteStore,
    RemoteRecord, SyncMeta, STATE_KEY,
};
use omega_sync::prelude::*;
use omega_sync::{ConflictOutcome, SyncError};
use omega_test_utils::{
    memory_backend, remote_with, scenario_seed, scenario_state, staffed_state, FailingBackend,
    ScriptedProbe,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn start(
    config: SyncConfig,
    remote: &Arc<MemoryRemoteStore>,
    backend: Arc<dyn KeyValueBackend>,
    probe: &Arc<ScriptedProbe>,
) -> StateSyncEngine {
    StateSyncEngine::start(
        config,
        LocalCache::app_state(Arc::clone(&backend)),
        LocalEntry::sync_meta(backend),
        remote.clone(),
        probe.clone(),
        &scenario_seed(),
    )
    .await
}

fn connected() -> Arc<ScriptedProbe> {
    Arc::new(ScriptedProbe::always(ConnectivityStatus::Connected))
}

async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_remote_copy_wins_on_startup() {
    let backend = memory_backend();
    let (local, _) = staffed_state();
    LocalCache::app_state(backend.clone()).write(&local);

    let mut remote_state = scenario_state();
    remote_state.add_role("auditor").unwrap();
    let remote = remote_with(remote_state.clone(), 3);

    let engine = start(SyncConfig::new(), &remote, backend.clone(), &connected()).await;

    assert_eq!(engine.state(), remote_state);
    assert_eq!(LocalCache::app_state(backend).read(), Some(remote_state));
    let snap = engine.snapshot();
    assert_eq!(snap.state, SyncState::Synced);
    assert_eq!(snap.remote_revision, Some(3));
    assert!(!snap.pending_write);
    assert_eq!(snap.indicator(), SyncIndicator::Synced);

    settle(5_000).await;
    assert_eq!(remote.upsert_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_remote_falls_back_to_local_copy() {
    let backend = memory_backend();
    let (local, _) = staffed_state();
    LocalCache::app_state(backend.clone()).write(&local);

    let remote = remote_with(scenario_state(), 1);
    remote.set_unreachable(true);
    let probe = Arc::new(ScriptedProbe::always(ConnectivityStatus::Blocked));

    let engine = start(SyncConfig::new(), &remote, backend, &probe).await;

    assert_eq!(engine.state(), local);
    let snap = engine.snapshot();
    assert_eq!(snap.state, SyncState::LocalOnly);
    assert!(snap.network_blocked);
    assert!(snap.pending_write);
    assert_eq!(snap.indicator(), SyncIndicator::Blocked);
    assert!(snap.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_first_run_seeds_persists_and_publishes() {
    let backend = memory_backend();
    let remote = Arc::new(MemoryRemoteStore::new());

    let engine = start(SyncConfig::new(), &remote, backend.clone(), &connected()).await;

    // persisted locally before any network write
    assert_eq!(engine.state(), scenario_state());
    assert!(backend.raw(STATE_KEY).is_some());
    assert_eq!(engine.snapshot().state, SyncState::LocalOnly);
    assert_eq!(remote.upsert_calls(), 0);

    settle(2_000).await;

    let record = remote.current().unwrap();
    assert_eq!(record.state, scenario_state());
    assert_eq!(record.revision, 1);
    assert_eq!(engine.snapshot().indicator(), SyncIndicator::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_changes_coalesce_into_one_push() {
    let remote = remote_with(scenario_state(), 1);
    let engine = start(SyncConfig::new(), &remote, memory_backend(), &connected()).await;

    for role in ["alpha", "beta", "gamma", "delta", "epsilon"] {
        engine.update(|s| s.add_role(role)).unwrap();
        settle(100).await;
    }
    assert_eq!(remote.upsert_calls(), 0);
    assert!(engine.snapshot().pending_write);

    settle(2_000).await;

    assert_eq!(remote.upsert_calls(), 1);
    let record = remote.current().unwrap();
    assert_eq!(record.revision, 2);
    assert_eq!(record.state, engine.state());
    assert!(record.state.available_roles.contains(&"EPSILON".to_string()));
    assert!(!engine.snapshot().pending_write);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_start_uses_long_debounce() {
    let config = SyncConfig::new();
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.set_unreachable(true);
    let probe = Arc::new(ScriptedProbe::always(ConnectivityStatus::Blocked));
    let engine = start(config.clone(), &remote, memory_backend(), &probe).await;
    assert_eq!(engine.snapshot().connectivity, ConnectivityStatus::Blocked);

    remote.set_unreachable(false);
    engine.update(|s| s.add_role("quiet")).unwrap();

    settle(config.debounce_ms + 1_500).await;
    assert_eq!(remote.upsert_calls(), 0);
    assert!(engine.snapshot().pending_write);

    settle(config.blocked_debounce_ms).await;
    assert_eq!(remote.upsert_calls(), 1);
    let record = remote.current().unwrap();
    assert!(record.state.available_roles.contains(&"QUIET".to_string()));
    assert_eq!(engine.snapshot().state, SyncState::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_stretches_after_blocked_push() {
    let config = SyncConfig::new();
    let remote = remote_with(scenario_state(), 1);
    let engine = start(config.clone(), &remote, memory_backend(), &connected()).await;

    remote.set_unreachable(true);
    engine.update(|s| s.add_role("first")).unwrap();
    settle(config.debounce_ms + 500).await;
    assert_eq!(remote.upsert_calls(), 1);
    assert_eq!(engine.snapshot().connectivity, ConnectivityStatus::Blocked);

    remote.set_unreachable(false);
    engine.update(|s| s.add_role("second")).unwrap();

    settle(config.debounce_ms + 1_500).await;
    assert_eq!(remote.upsert_calls(), 1);

    settle(config.blocked_debounce_ms).await;
    assert_eq!(remote.upsert_calls(), 2);
    let record = remote.current().unwrap();
    assert!(record.state.available_roles.contains(&"SECOND".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_block_pushes_freshest_state() {
    let config = SyncConfig::new()
        .with_debounce(Duration::from_millis(1_500), Duration::from_secs(3_600))
        .with_retry(Duration::from_secs(10), Duration::from_secs(60));
    let remote = remote_with(scenario_state(), 1);
    let probe = connected();
    let engine = start(config, &remote, memory_backend(), &probe).await;

    remote.set_unreachable(true);
    engine.update(|s| s.add_role("first")).unwrap();
    settle(2_000).await;

    let snap = engine.snapshot();
    assert_eq!(snap.state, SyncState::LocalOnly);
    assert!(snap.network_blocked);
    assert_eq!(snap.indicator(), SyncIndicator::Blocked);
    assert_eq!(remote.upsert_calls(), 1);

    // edits keep landing locally while blocked
    engine.update(|s| s.add_role("second")).unwrap();
    remote.set_unreachable(false);
    settle(68_000).await;

    let record = remote.current().unwrap();
    assert!(record.state.available_roles.contains(&"FIRST".to_string()));
    assert!(record.state.available_roles.contains(&"SECOND".to_string()));
    assert_eq!(remote.upsert_calls(), 2);
    assert!(probe.calls() >= 2);

    let snap = engine.snapshot();
    assert_eq!(snap.state, SyncState::Synced);
    assert!(!snap.network_blocked);
    assert!(snap.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_last_writer_wins_reports_overwrite() {
    let remote = remote_with(scenario_state(), 1);
    let engine = start(SyncConfig::new(), &remote, memory_backend(), &connected()).await;

    let (other_device, _) = staffed_state();
    remote.set_record(Some(RemoteRecord::new(other_device, 5)));

    engine.update(|s| s.add_role("local")).unwrap();
    settle(2_000).await;

    let record = remote.current().unwrap();
    assert_eq!(record.revision, 6);
    assert_eq!(record.state, engine.state());

    let notice = engine.snapshot().conflict.unwrap();
    assert_eq!(notice.outcome, ConflictOutcome::Overwritten);
    assert_eq!(notice.base, Some(1));
    assert_eq!(notice.found, Some(5));
    assert_eq!(engine.snapshot().state, SyncState::Synced);

    engine.acknowledge_conflict();
    assert!(engine.snapshot().conflict.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_detect_policy_holds_write_until_resolved() {
    let config = SyncConfig::new().with_conflict_policy(ConflictPolicy::Detect);
    let remote = remote_with(scenario_state(), 1);
    let engine = start(config, &remote, memory_backend(), &connected()).await;

    let (other_device, _) = staffed_state();
    remote.set_record(Some(RemoteRecord::new(other_device.clone(), 5)));

    engine.update(|s| s.add_role("local")).unwrap();
    settle(2_000).await;

    assert_eq!(remote.current().unwrap().state, other_device);
    let snap = engine.snapshot();
    assert!(snap.has_held_conflict());
    assert!(snap.pending_write);
    assert_eq!(snap.indicator(), SyncIndicator::Pending);
    assert_eq!(
        engine.flush_now().await.unwrap_err(),
        SyncError::ConflictHeld { found: Some(5) }
    );

    engine
        .resolve_conflict(ConflictResolution::TakeRemote)
        .await
        .unwrap();
    assert_eq!(engine.state(), other_device);
    let snap = engine.snapshot();
    assert_eq!(snap.state, SyncState::Synced);
    assert!(!snap.pending_write);
    assert!(snap.conflict.is_none());
    assert_eq!(
        engine
            .resolve_conflict(ConflictResolution::KeepLocal)
            .await
            .unwrap_err(),
        SyncError::NoConflict
    );
}

#[tokio::test(start_paused = true)]
async fn test_keep_local_overwrites_after_conflict() {
    let config = SyncConfig::new().with_conflict_policy(ConflictPolicy::Detect);
    let remote = remote_with(scenario_state(), 1);
    let engine = start(config, &remote, memory_backend(), &connected()).await;

    remote.set_record(Some(RemoteRecord::new(staffed_state().0, 5)));
    engine.update(|s| s.add_role("local")).unwrap();
    settle(2_000).await;
    assert!(engine.snapshot().has_held_conflict());

    engine
        .resolve_conflict(ConflictResolution::KeepLocal)
        .await
        .unwrap();

    let record = remote.current().unwrap();
    assert_eq!(record.revision, 6);
    assert_eq!(record.state, engine.state());
    assert_eq!(engine.snapshot().indicator(), SyncIndicator::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_offline_edits_resume_from_last_known_revision() {
    let backend = memory_backend();
    let synced = scenario_state();
    LocalCache::app_state(backend.clone()).write(&synced);
    LocalEntry::sync_meta(backend.clone()).write(&SyncMeta {
        revision: Some(4),
        last_synced_at: None,
    });

    let remote = remote_with(synced, 4);
    remote.set_unreachable(true);
    let engine = start(SyncConfig::new(), &remote, backend, &connected()).await;
    assert_eq!(engine.snapshot().remote_revision, Some(4));

    engine.update(|s| s.add_role("offline edit")).unwrap();
    remote.set_unreachable(false);
    engine.flush_now().await.unwrap();

    let record = remote.current().unwrap();
    assert_eq!(record.revision, 5);
    assert!(record.state.available_roles.contains(&"OFFLINE_EDIT".to_string()));
    assert!(engine.snapshot().conflict.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_pushes_pending_write() {
    let remote = remote_with(scenario_state(), 1);
    let engine = start(SyncConfig::new(), &remote, memory_backend(), &connected()).await;

    engine.update(|s| s.add_role("closing")).unwrap();
    let expected = engine.state();
    engine.shutdown().await;

    assert_eq!(remote.upsert_calls(), 1);
    assert_eq!(remote.current().unwrap().state, expected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_mutation_changes_nothing() {
    let remote = remote_with(scenario_state(), 1);
    let engine = start(SyncConfig::new(), &remote, memory_backend(), &connected()).await;

    let err = engine
        .try_update(|s| s.remove_member(SEED_CEO_ID))
        .unwrap_err();
    assert!(err.is_ceo_violation());
    assert_eq!(engine.state(), scenario_state());
    assert!(!engine.snapshot().pending_write);
}

#[tokio::test(start_paused = true)]
async fn test_local_storage_failure_is_surfaced_not_fatal() {
    let failing = Arc::new(FailingBackend::new());
    let remote = remote_with(scenario_state(), 1);
    let engine = start(SyncConfig::new(), &remote, failing.clone(), &connected()).await;

    engine.update(|s| s.add_role("kept in memory")).unwrap();

    assert!(engine.read(|s| s.available_roles.contains(&"KEPT_IN_MEMORY".to_string())));
    assert!(engine.snapshot().local_cache_error.is_some());
    assert!(failing.attempts() >= 2);

    settle(2_000).await;
    assert_eq!(remote.current().unwrap().state, engine.state());
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_status_changes() {
    let remote = remote_with(scenario_state(), 1);
    let engine = start(SyncConfig::new(), &remote, memory_backend(), &connected()).await;
    let mut rx = engine.subscribe();

    engine.update(|s| s.add_role("observer")).unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().pending_write);

    settle(2_000).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().state, SyncState::Synced);
}

