//! End-to-end sync scenarios
//!
//! Each "device" is a `SyncContext` with its own local slot store; devices
//! share one pair of in-memory remote channels, the way two browsers share
//! a signed-in user's cloud collection.

use std::sync::Arc;
use std::time::Duration;

use peaklog_cache::{open_slot_store, MemorySlotStore};
use peaklog_core::config::{StorageBackend, StorageConfig};
use peaklog_core::domain::{
    GpxTrack, LastModified, Mountain, MountainCategory, MountainDraft, PresetMountain, RecordId,
    UserScope,
};
use peaklog_core::ports::{IRemoteChannel, ISlotStore};
use peaklog_sync::{
    MemoryRemoteChannel, RemoteChannels, RetryPolicy, SyncContext, SyncEngine, SyncError,
    SyncStatus,
};

// ============================================================================
// Test helpers
// ============================================================================

const USER: &str = "uid-1";

fn scope() -> UserScope {
    UserScope::new(USER).unwrap()
}

struct Cloud {
    mountains: MemoryRemoteChannel<Mountain>,
    tracks: MemoryRemoteChannel<GpxTrack>,
}

impl Cloud {
    fn new() -> Self {
        Self {
            mountains: MemoryRemoteChannel::new(),
            tracks: MemoryRemoteChannel::new(),
        }
    }

    fn channels(&self) -> RemoteChannels {
        RemoteChannels {
            mountains: Arc::new(self.mountains.clone()),
            tracks: Arc::new(self.tracks.clone()),
        }
    }

    fn mountains(&self) -> Vec<Mountain> {
        self.mountains.records(&scope())
    }
}

async fn device(cloud: &Cloud) -> SyncContext {
    device_with(cloud, Arc::new(MemorySlotStore::new()), RetryPolicy::disabled()).await
}

async fn device_with(
    cloud: &Cloud,
    slots: Arc<dyn ISlotStore>,
    retry: RetryPolicy,
) -> SyncContext {
    SyncContext::open(slots, Some(cloud.channels()), retry)
        .await
        .unwrap()
}

async fn signed_in(cloud: &Cloud) -> SyncContext {
    let mut ctx = device(cloud).await;
    ctx.sign_in(USER).await.unwrap();
    ctx.settle().await.unwrap();
    ctx
}

fn draft(name: &str, lat: f64, lng: f64) -> MountainDraft {
    MountainDraft {
        name: name.into(),
        elevation: 3000.0,
        lat,
        lng,
        category: MountainCategory::Hyakumeizan,
        ..Default::default()
    }
}

fn presets() -> Vec<PresetMountain> {
    [
        ("Fuji", 35.3606, 138.7274),
        ("Kita", 35.6744, 138.2389),
        ("Oku-hotaka", 36.2893, 137.6479),
        ("Yari", 36.3419, 137.6476),
        ("Shirouma", 36.7586, 137.7586),
    ]
    .into_iter()
    .map(|(name, lat, lng)| PresetMountain {
        name: name.into(),
        elevation: 3000.0,
        lat,
        lng,
        category: MountainCategory::Hyakumeizan,
        is_climbed: false,
        climb_date: None,
        notes: String::new(),
        gpx_track_ids: Vec::new(),
    })
    .collect()
}

fn names(mountains: &[Mountain]) -> Vec<String> {
    let mut names: Vec<String> = mountains.iter().map(|m| m.name.clone()).collect();
    names.sort();
    names
}

// ============================================================================
// Multi-device propagation
// ============================================================================

#[tokio::test]
async fn test_change_on_one_device_reaches_the_other() {
    let cloud = Cloud::new();
    let mut laptop = signed_in(&cloud).await;
    let mut phone = signed_in(&cloud).await;

    let fuji = laptop.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    laptop.settle().await.unwrap();
    phone.settle().await.unwrap();

    assert_eq!(phone.mountain(&fuji.id), Some(&fuji));
    assert_eq!(laptop.status().status, SyncStatus::Synced);
    assert_eq!(phone.status().status, SyncStatus::Synced);

    phone.delete_mountain(&fuji.id).await.unwrap();
    phone.settle().await.unwrap();
    assert!(cloud.mountains().is_empty());
}

#[tokio::test]
async fn test_newer_remote_version_wins_at_sign_in() {
    let cloud = Cloud::new();
    let slots: Arc<dyn ISlotStore> = Arc::new(MemorySlotStore::new());

    let mut local = Mountain::create(draft("Fuji", 35.36, 138.73));
    local.updated_at = LastModified::from_raw("2024-01-01T00:00:00.000Z");
    let mut remote = local.clone();
    remote.is_climbed = true;
    remote.updated_at = LastModified::from_raw("2024-01-02T00:00:00.000Z");

    let mut engine = SyncEngine::<Mountain>::open(slots.clone())
        .await
        .unwrap()
        .with_remote(Arc::new(cloud.mountains.clone()));
    engine.upsert(local.clone()).await.unwrap();
    cloud.mountains.upsert(&scope(), &remote).await.unwrap();

    engine.sign_in(scope()).await.unwrap();
    engine.settle().await.unwrap();

    assert_eq!(engine.records(), std::slice::from_ref(&remote));
    // Nothing was uploaded over the newer copy
    assert_eq!(cloud.mountains(), vec![remote]);
}

#[tokio::test]
async fn test_offline_edits_upload_after_sign_in() {
    let cloud = Cloud::new();
    let mut ctx = device(&cloud).await;
    ctx.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    ctx.add_mountain(draft("Kita", 35.67, 138.24)).await.unwrap();
    assert!(cloud.mountains().is_empty());

    ctx.sign_in(USER).await.unwrap();
    ctx.settle().await.unwrap();

    assert_eq!(names(&cloud.mountains()), vec!["Fuji", "Kita"]);
    assert_eq!(ctx.status().status, SyncStatus::Synced);
}

// ============================================================================
// Echo handling
// ============================================================================

#[tokio::test]
async fn test_own_edit_does_not_bounce_back() {
    let cloud = Cloud::new();
    let mut laptop = signed_in(&cloud).await;
    let mut phone = signed_in(&cloud).await;

    let fuji = laptop.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    laptop.settle().await.unwrap();
    phone.settle().await.unwrap();

    let mut edit = fuji.to_draft();
    edit.notes = "summit at dawn".into();
    let edited = laptop.update_mountain(&fuji.id, edit).await.unwrap();
    laptop.settle().await.unwrap();

    assert_eq!(laptop.mountain_engine().pending_echoes(), 0);
    assert_eq!(laptop.mountain(&fuji.id), Some(&edited));
    assert_eq!(laptop.mountains().len(), 1);

    phone.settle().await.unwrap();
    assert_eq!(phone.mountain(&fuji.id).unwrap().notes, "summit at dawn");
}

#[tokio::test]
async fn test_foreign_change_is_never_suppressed() {
    let cloud = Cloud::new();
    let mut laptop = signed_in(&cloud).await;
    let mut phone = signed_in(&cloud).await;

    // The phone's write lands while the laptop is waiting for its own echo
    let kita = phone.add_mountain(draft("Kita", 35.67, 138.24)).await.unwrap();
    phone.settle().await.unwrap();
    let fuji = laptop.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    laptop.settle().await.unwrap();

    assert!(laptop.mountain(&kita.id).is_some());
    assert!(laptop.mountain(&fuji.id).is_some());

    phone.settle().await.unwrap();
    assert_eq!(names(phone.mountains()), vec!["Fuji", "Kita"]);
}

#[tokio::test]
async fn test_delete_survives_foreign_write_landing_first() {
    let cloud = Cloud::new();
    let mut laptop = signed_in(&cloud).await;
    let mut phone = signed_in(&cloud).await;

    let fuji = laptop.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    laptop.settle().await.unwrap();
    phone.settle().await.unwrap();

    // The phone's snapshot still carries Fuji when the laptop deletes it
    phone.add_mountain(draft("Kita", 35.67, 138.24)).await.unwrap();
    phone.settle().await.unwrap();
    laptop.delete_mountain(&fuji.id).await.unwrap();
    laptop.settle().await.unwrap();

    assert_eq!(names(laptop.mountains()), vec!["Kita"]);
    assert_eq!(names(&cloud.mountains()), vec!["Kita"]);
    assert_eq!(laptop.mountain_engine().pending_echoes(), 0);
    assert_eq!(laptop.mountain_engine().unconfirmed_deletes(), 0);
    assert_eq!(laptop.push_unsynced().unwrap(), 0);
}

// ============================================================================
// Failures and retry
// ============================================================================

#[tokio::test]
async fn test_failed_delete_is_retried() {
    let cloud = Cloud::new();
    let mut laptop = signed_in(&cloud).await;
    let mut phone = signed_in(&cloud).await;

    let fuji = laptop.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    laptop.settle().await.unwrap();
    phone.settle().await.unwrap();

    cloud.mountains.fail_next(1);
    laptop.delete_mountain(&fuji.id).await.unwrap();
    laptop.settle().await.unwrap();
    assert!(matches!(
        laptop.status().error,
        Some(SyncError::DeleteFailed { .. })
    ));
    assert_eq!(cloud.mountains().len(), 1);

    // A foreign change arrives while Fuji is still held remotely
    phone.add_mountain(draft("Kita", 35.67, 138.24)).await.unwrap();
    phone.settle().await.unwrap();
    laptop.settle().await.unwrap();
    assert_eq!(names(laptop.mountains()), vec!["Kita"]);

    assert_eq!(laptop.push_unsynced().unwrap(), 1);
    laptop.settle().await.unwrap();

    assert_eq!(names(&cloud.mountains()), vec!["Kita"]);
    assert_eq!(names(laptop.mountains()), vec!["Kita"]);
    assert_eq!(laptop.status().status, SyncStatus::Synced);
    assert_eq!(laptop.mountain_engine().unconfirmed_deletes(), 0);
}

#[tokio::test]
async fn test_failed_batch_is_retried_without_duplicates() {
    let cloud = Cloud::new();
    let mut ctx = signed_in(&cloud).await;

    cloud.mountains.fail_next(1);
    assert_eq!(ctx.load_presets(presets()).await.unwrap(), 5);
    ctx.settle().await.unwrap();

    let report = ctx.status();
    assert_eq!(report.status, SyncStatus::Error);
    assert!(matches!(report.error, Some(SyncError::BatchFailed { count: 5, .. })));
    assert_eq!(ctx.mountains().len(), 5);
    assert!(cloud.mountains().is_empty());

    assert_eq!(ctx.push_unsynced().unwrap(), 5);
    ctx.settle().await.unwrap();

    assert_eq!(ctx.status().status, SyncStatus::Synced);
    assert_eq!(ctx.mountains().len(), 5);
    assert_eq!(cloud.mountains().len(), 5);

    // Nothing left to send
    assert_eq!(ctx.push_unsynced().unwrap(), 0);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let cloud = Cloud::new();
    let retry = RetryPolicy::new(3, Duration::from_millis(5));
    let mut ctx = device_with(&cloud, Arc::new(MemorySlotStore::new()), retry).await;
    ctx.sign_in(USER).await.unwrap();
    ctx.settle().await.unwrap();

    cloud.mountains.fail_next(2);
    ctx.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    ctx.settle().await.unwrap();

    assert_eq!(ctx.status().status, SyncStatus::Synced);
    assert_eq!(cloud.mountains().len(), 1);
}

#[tokio::test]
async fn test_offline_remote_keeps_local_edits() {
    let cloud = Cloud::new();
    let mut ctx = signed_in(&cloud).await;

    cloud.mountains.set_offline(true);
    let fuji = ctx.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    ctx.settle().await.unwrap();
    assert_eq!(ctx.status().status, SyncStatus::Error);
    assert!(ctx.mountain(&fuji.id).is_some());

    cloud.mountains.set_offline(false);
    ctx.push_unsynced().unwrap();
    ctx.settle().await.unwrap();
    assert_eq!(cloud.mountains(), vec![fuji]);
}

// ============================================================================
// Duplicates
// ============================================================================

#[tokio::test]
async fn test_presets_loaded_on_two_devices_collapse() {
    let cloud = Cloud::new();
    let mut laptop = device(&cloud).await;
    let mut phone = device(&cloud).await;

    laptop.load_presets(presets()).await.unwrap();
    // Distinct markers so the phone's copies are strictly newer
    tokio::time::sleep(Duration::from_millis(5)).await;
    phone.load_presets(presets()).await.unwrap();

    laptop.sign_in(USER).await.unwrap();
    laptop.settle().await.unwrap();
    assert_eq!(cloud.mountains().len(), 5);

    phone.sign_in(USER).await.unwrap();
    phone.settle().await.unwrap();
    assert_eq!(phone.mountains().len(), 5);
    assert_eq!(cloud.mountains().len(), 5);
    let phone_ids: Vec<&RecordId> = phone.mountains().iter().map(|m| &m.id).collect();
    assert!(cloud.mountains().iter().all(|m| phone_ids.contains(&&m.id)));

    // The laptop merged the phone's copies next to its own
    laptop.settle().await.unwrap();
    laptop.deduplicate().await.unwrap();
    laptop.settle().await.unwrap();
    assert_eq!(laptop.mountains().len(), 5);
    assert_eq!(cloud.mountains().len(), 5);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_remote_changes_while_signed_out_arrive_on_return() {
    let cloud = Cloud::new();
    let mut laptop = signed_in(&cloud).await;
    let mut phone = signed_in(&cloud).await;

    laptop.sign_out();
    phone.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    phone.settle().await.unwrap();
    laptop.settle().await.unwrap();
    assert!(laptop.mountains().is_empty());

    laptop.sign_in(USER).await.unwrap();
    laptop.settle().await.unwrap();
    assert_eq!(names(laptop.mountains()), vec!["Fuji"]);
}

#[tokio::test]
async fn test_broken_subscription_reports_error() {
    let cloud = Cloud::new();
    let mut ctx = signed_in(&cloud).await;

    cloud.mountains.break_subscriptions(&scope(), "permission denied");
    ctx.settle().await.unwrap();
    assert_eq!(ctx.status().status, SyncStatus::Error);

    // Local-only operation continues
    ctx.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap();
    assert_eq!(ctx.mountains().len(), 1);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_collections_survive_restart() {
    for backend in [StorageBackend::Json, StorageBackend::Sqlite] {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend,
            data_dir: dir.path().to_path_buf(),
        };
        let cloud = Cloud::new();

        let fuji = {
            let slots = open_slot_store(&config).await.unwrap();
            let mut ctx = device_with(&cloud, slots, RetryPolicy::disabled()).await;
            ctx.add_mountain(draft("Fuji", 35.36, 138.73)).await.unwrap()
        };

        let slots = open_slot_store(&config).await.unwrap();
        let mut ctx = device_with(&cloud, slots, RetryPolicy::disabled()).await;
        assert_eq!(ctx.mountain(&fuji.id), Some(&fuji), "backend {backend:?}");

        // The restored collection is what gets uploaded on sign-in
        ctx.sign_in(USER).await.unwrap();
        ctx.settle().await.unwrap();
        assert_eq!(cloud.mountains(), vec![fuji]);
    }
}
