//! Application-facing sync context
//!
//! [`SyncContext`] owns one engine per record kind and is the object the
//! user-facing layer is handed: every CRUD action, backup operation and
//! sign-in/out goes through it. The two collections share a single status,
//! the worse of the two.

use std::sync::Arc;

use chrono::NaiveDate;
use peaklog_core::config::SyncConfig;
use peaklog_core::domain::{
    AppData, GpxTrack, Mountain, MountainDraft, MountainFilter, PresetMountain, RecordId,
    TrackDraft, UserScope,
};
use peaklog_core::ports::{IRemoteChannel, ISlotStore};
use tracing::info;

use crate::engine::SyncEngine;
use crate::retry::RetryPolicy;
use crate::status::StatusReport;
use crate::SyncError;

/// Remote bindings for both collections
#[derive(Clone)]
pub struct RemoteChannels {
    pub mountains: Arc<dyn IRemoteChannel<Mountain>>,
    pub tracks: Arc<dyn IRemoteChannel<GpxTrack>>,
}

/// Number of records an import actually added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub mountains: usize,
    pub tracks: usize,
}

/// Both collections and their sync engines
pub struct SyncContext {
    mountains: SyncEngine<Mountain>,
    tracks: SyncEngine<GpxTrack>,
}

impl SyncContext {
    pub fn new(mountains: SyncEngine<Mountain>, tracks: SyncEngine<GpxTrack>) -> Self {
        Self { mountains, tracks }
    }

    /// Loads both collections from `slots`
    ///
    /// Without `remote` the context stays local-only.
    pub async fn open(
        slots: Arc<dyn ISlotStore>,
        remote: Option<RemoteChannels>,
        retry: RetryPolicy,
    ) -> Result<Self, SyncError> {
        let mut mountains = SyncEngine::<Mountain>::open(slots.clone()).await?.with_retry(retry);
        let mut tracks = SyncEngine::<GpxTrack>::open(slots).await?.with_retry(retry);
        if let Some(remote) = remote {
            mountains = mountains.with_remote(remote.mountains);
            tracks = tracks.with_remote(remote.tracks);
        }
        Ok(Self::new(mountains, tracks))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn mountains(&self) -> &[Mountain] {
        self.mountains.records()
    }

    pub fn tracks(&self) -> &[GpxTrack] {
        self.tracks.records()
    }

    pub fn mountain(&self, id: &RecordId) -> Option<&Mountain> {
        self.mountains.get(id)
    }

    pub fn track(&self, id: &RecordId) -> Option<&GpxTrack> {
        self.tracks.get(id)
    }

    pub fn filtered_mountains(&self, filter: &MountainFilter) -> Vec<&Mountain> {
        filter.apply(self.mountains.records())
    }

    /// Tracks linked to a mountain
    pub fn tracks_for(&self, mountain_id: &RecordId) -> Vec<&GpxTrack> {
        self.tracks
            .records()
            .iter()
            .filter(|t| t.mountain_id.as_ref() == Some(mountain_id))
            .collect()
    }

    pub fn mountain_engine(&self) -> &SyncEngine<Mountain> {
        &self.mountains
    }

    pub fn track_engine(&self) -> &SyncEngine<GpxTrack> {
        &self.tracks
    }

    /// Combined status: the worse of the two collections
    pub fn status(&self) -> StatusReport {
        self.mountains.status().worst(self.tracks.status())
    }

    pub fn is_signed_in(&self) -> bool {
        self.mountains.is_connected() || self.tracks.is_connected()
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// Starts syncing both collections for `user`
    ///
    /// Both collections are attempted; the first failure is returned.
    pub async fn sign_in(&mut self, user: &str) -> Result<(), SyncError> {
        let scope = UserScope::new(user)?;
        let mountains = self.mountains.sign_in(scope.clone()).await;
        let tracks = self.tracks.sign_in(scope).await;
        mountains.and(tracks)
    }

    /// Signs in as the configured `sync.user`, if any
    ///
    /// Returns whether a sign-in was attempted.
    pub async fn sign_in_configured(&mut self, config: &SyncConfig) -> Result<bool, SyncError> {
        let Some(user) = config.user.as_deref() else {
            return Ok(false);
        };
        self.sign_in(user).await?;
        Ok(true)
    }

    pub fn sign_out(&mut self) {
        self.mountains.sign_out();
        self.tracks.sign_out();
    }

    // ------------------------------------------------------------------------
    // Mountains
    // ------------------------------------------------------------------------

    pub async fn add_mountain(&mut self, draft: MountainDraft) -> Result<Mountain, SyncError> {
        let mountain = Mountain::create(draft);
        self.mountains.upsert(mountain.clone()).await?;
        Ok(mountain)
    }

    pub async fn update_mountain(
        &mut self,
        id: &RecordId,
        draft: MountainDraft,
    ) -> Result<Mountain, SyncError> {
        self.modify_mountain(id, |m| m.apply_draft(draft)).await
    }

    pub async fn delete_mountain(&mut self, id: &RecordId) -> Result<Mountain, SyncError> {
        self.mountains
            .remove(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.clone()))
    }

    pub async fn toggle_climbed(
        &mut self,
        id: &RecordId,
        today: NaiveDate,
    ) -> Result<Mountain, SyncError> {
        self.modify_mountain(id, |m| m.toggle_climbed(today)).await
    }

    pub async fn link_track(
        &mut self,
        mountain_id: &RecordId,
        track_id: RecordId,
    ) -> Result<Mountain, SyncError> {
        self.modify_mountain(mountain_id, |m| m.link_track(track_id))
            .await
    }

    /// Replaces the mountain collection with a preset list
    ///
    /// Every preset gets a fresh identity. Returns the number loaded.
    pub async fn load_presets(&mut self, presets: Vec<PresetMountain>) -> Result<usize, SyncError> {
        let mountains: Vec<Mountain> = presets.into_iter().map(Mountain::from_preset).collect();
        let count = mountains.len();
        self.mountains.replace_all(mountains).await?;
        info!(count, "Preset mountains loaded");
        Ok(count)
    }

    /// Loads presets on first launch
    ///
    /// Does nothing while a sync is running (the remote collection may be
    /// about to fill the list) or when mountains already exist. Returns the
    /// number loaded, if any.
    pub async fn load_presets_if_empty(
        &mut self,
        presets: Vec<PresetMountain>,
    ) -> Result<Option<usize>, SyncError> {
        if !self.mountains.is_empty() || self.status().status.is_syncing() {
            return Ok(None);
        }
        self.load_presets(presets).await.map(Some)
    }

    async fn modify_mountain(
        &mut self,
        id: &RecordId,
        f: impl FnOnce(&mut Mountain),
    ) -> Result<Mountain, SyncError> {
        let mut mountain = self
            .mountains
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.clone()))?;
        f(&mut mountain);
        self.mountains.upsert(mountain.clone()).await?;
        Ok(mountain)
    }

    // ------------------------------------------------------------------------
    // Tracks
    // ------------------------------------------------------------------------

    /// Stores a parsed GPX track, optionally linking it to a mountain
    pub async fn add_track(
        &mut self,
        draft: TrackDraft,
        raw_gpx: impl Into<String>,
        mountain_id: Option<RecordId>,
    ) -> Result<GpxTrack, SyncError> {
        if let Some(id) = &mountain_id {
            if self.mountains.get(id).is_none() {
                return Err(SyncError::NotFound(id.clone()));
            }
        }
        let track = GpxTrack::create(draft, raw_gpx, mountain_id.clone(), self.tracks.len());
        self.tracks.upsert(track.clone()).await?;
        if let Some(id) = mountain_id {
            self.link_track(&id, track.id.clone()).await?;
        }
        Ok(track)
    }

    /// Deletes a track and removes it from the mountain it was linked to
    pub async fn delete_track(&mut self, id: &RecordId) -> Result<GpxTrack, SyncError> {
        let track = self
            .tracks
            .remove(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.clone()))?;

        let linked: Vec<RecordId> = self
            .mountains
            .records()
            .iter()
            .filter(|m| m.gpx_track_ids.contains(id))
            .map(|m| m.id.clone())
            .collect();
        for mountain_id in linked {
            self.modify_mountain(&mountain_id, |m| {
                m.unlink_track(id);
            })
            .await?;
        }
        Ok(track)
    }

    // ------------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------------

    /// Both collections as a backup document
    pub fn export(&self) -> AppData {
        AppData::new(self.mountains().to_vec(), self.tracks().to_vec())
    }

    /// Folds a backup document into both collections
    ///
    /// Records whose identity already exists locally are skipped; the rest
    /// are uploaded as one batch per collection. A malformed document is
    /// rejected before either collection changes.
    pub async fn import(&mut self, payload: &str) -> Result<ImportSummary, SyncError> {
        let data = AppData::from_json(payload)?;
        let mountains = self.mountains.import(data.mountains).await?.len();
        let tracks = self.tracks.import(data.gpx_tracks).await?.len();
        Ok(ImportSummary { mountains, tracks })
    }

    // ------------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------------

    /// Collapses duplicate mountains; returns the removed identities
    pub async fn deduplicate(&mut self) -> Result<Vec<RecordId>, SyncError> {
        let mut removed = self.mountains.deduplicate().await?;
        removed.extend(self.tracks.deduplicate().await?);
        Ok(removed)
    }

    /// Re-sends every record the remote store lacks in its current version
    pub fn push_unsynced(&mut self) -> Result<usize, SyncError> {
        Ok(self.mountains.push_unsynced()? + self.tracks.push_unsynced()?)
    }

    // ------------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------------

    /// Waits for and handles the next event of either collection
    ///
    /// Returns false when neither collection has anything to wait for.
    pub async fn pump(&mut self) -> Result<bool, SyncError> {
        let Self { mountains, tracks } = self;
        tokio::select! {
            Some(event) = mountains.next_event() => {
                mountains.handle(event).await?;
                Ok(true)
            }
            Some(event) = tracks.next_event() => {
                tracks.handle(event).await?;
                Ok(true)
            }
            else => Ok(false),
        }
    }

    /// Settles both collections
    pub async fn settle(&mut self) -> Result<(), SyncError> {
        self.mountains.settle().await?;
        self.tracks.settle().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteChannel;
    use crate::status::SyncStatus;
    use peaklog_cache::MemorySlotStore;
    use peaklog_core::domain::MountainCategory;

    fn draft(name: &str) -> MountainDraft {
        MountainDraft {
            name: name.into(),
            elevation: 3776.0,
            lat: 35.36,
            lng: 138.73,
            category: MountainCategory::Hyakumeizan,
            ..Default::default()
        }
    }

    fn preset(name: &str, lat: f64) -> PresetMountain {
        PresetMountain {
            name: name.into(),
            elevation: 3000.0,
            lat,
            lng: 138.0,
            category: MountainCategory::Hyakumeizan,
            is_climbed: false,
            climb_date: None,
            notes: String::new(),
            gpx_track_ids: Vec::new(),
        }
    }

    async fn local_context() -> SyncContext {
        SyncContext::open(
            Arc::new(MemorySlotStore::new()),
            None,
            RetryPolicy::disabled(),
        )
        .await
        .unwrap()
    }

    struct Remote {
        mountains: MemoryRemoteChannel<Mountain>,
        tracks: MemoryRemoteChannel<GpxTrack>,
    }

    impl Remote {
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
    }

    async fn synced_context(remote: &Remote) -> SyncContext {
        let mut ctx = SyncContext::open(
            Arc::new(MemorySlotStore::new()),
            Some(remote.channels()),
            RetryPolicy::disabled(),
        )
        .await
        .unwrap();
        ctx.sign_in("uid-1").await.unwrap();
        ctx.settle().await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_mountain_crud_local_only() {
        let mut ctx = local_context().await;
        let fuji = ctx.add_mountain(draft("Fuji")).await.unwrap();

        let mut edit = fuji.to_draft();
        edit.notes = "sunrise".into();
        let edited = ctx.update_mountain(&fuji.id, edit).await.unwrap();
        assert!(edited.updated_at.is_newer_than(&fuji.updated_at));
        assert_eq!(ctx.mountain(&fuji.id).unwrap().notes, "sunrise");

        let today = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let climbed = ctx.toggle_climbed(&fuji.id, today).await.unwrap();
        assert!(climbed.is_climbed);
        assert_eq!(climbed.climb_date.as_deref(), Some("2024-08-01"));

        ctx.delete_mountain(&fuji.id).await.unwrap();
        assert!(ctx.mountains().is_empty());
        assert!(matches!(
            ctx.delete_mountain(&fuji.id).await,
            Err(SyncError::NotFound(_))
        ));
        assert_eq!(ctx.status().status, SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_add_track_links_mountain() {
        let mut ctx = local_context().await;
        let fuji = ctx.add_mountain(draft("Fuji")).await.unwrap();

        let track = ctx
            .add_track(TrackDraft::default(), "<gpx/>", Some(fuji.id.clone()))
            .await
            .unwrap();
        assert_eq!(track.mountain_id.as_ref(), Some(&fuji.id));
        assert_eq!(ctx.mountain(&fuji.id).unwrap().gpx_track_ids, vec![track.id.clone()]);
        assert_eq!(ctx.tracks_for(&fuji.id).len(), 1);

        let second = ctx.add_track(TrackDraft::default(), "", None).await.unwrap();
        assert_ne!(second.color, track.color);

        ctx.delete_track(&track.id).await.unwrap();
        assert!(ctx.mountain(&fuji.id).unwrap().gpx_track_ids.is_empty());
        assert_eq!(ctx.tracks().len(), 1);
    }

    #[tokio::test]
    async fn test_add_track_to_unknown_mountain_fails() {
        let mut ctx = local_context().await;
        let missing = RecordId::new("missing").unwrap();
        let err = ctx
            .add_track(TrackDraft::default(), "", Some(missing))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert!(ctx.tracks().is_empty());
    }

    #[tokio::test]
    async fn test_presets_load_only_when_empty() {
        let mut ctx = local_context().await;
        let presets = vec![preset("Fuji", 35.36), preset("Kita", 35.67)];

        assert_eq!(
            ctx.load_presets_if_empty(presets.clone()).await.unwrap(),
            Some(2)
        );
        assert_eq!(ctx.load_presets_if_empty(presets).await.unwrap(), None);
        assert_eq!(ctx.mountains().len(), 2);
    }

    #[tokio::test]
    async fn test_presets_not_loaded_while_syncing() {
        let remote = Remote::new();
        let mut ctx = SyncContext::open(
            Arc::new(MemorySlotStore::new()),
            Some(remote.channels()),
            RetryPolicy::disabled(),
        )
        .await
        .unwrap();
        ctx.sign_in("uid-1").await.unwrap();
        assert_eq!(ctx.status().status, SyncStatus::Syncing);
        assert_eq!(
            ctx.load_presets_if_empty(vec![preset("Fuji", 35.36)])
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let mut source = local_context().await;
        let fuji = source.add_mountain(draft("Fuji")).await.unwrap();
        source
            .add_track(TrackDraft::default(), "<gpx/>", Some(fuji.id.clone()))
            .await
            .unwrap();
        let exported = source.export();
        let json = exported.to_json().unwrap();

        let mut target = local_context().await;
        let summary = target.import(&json).await.unwrap();
        assert_eq!(summary, ImportSummary { mountains: 1, tracks: 1 });
        assert_eq!(target.export(), exported);

        // Importing again adds nothing
        let summary = target.import(&json).await.unwrap();
        assert_eq!(summary, ImportSummary::default());
        assert_eq!(target.export(), exported);
    }

    #[tokio::test]
    async fn test_malformed_import_touches_nothing() {
        let mut ctx = local_context().await;
        ctx.add_mountain(draft("Fuji")).await.unwrap();

        let err = ctx
            .import(r#"{"mountains": [], "version": 1}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedImport(_)));
        assert_eq!(ctx.mountains().len(), 1);
    }

    #[tokio::test]
    async fn test_combined_status_is_worst_of_both() {
        let remote = Remote::new();
        let mut ctx = synced_context(&remote).await;
        assert_eq!(ctx.status().status, SyncStatus::Synced);

        remote.tracks.fail_next(1);
        ctx.add_track(TrackDraft::default(), "", None).await.unwrap();
        ctx.settle().await.unwrap();

        assert_eq!(ctx.mountain_engine().status().status, SyncStatus::Synced);
        assert_eq!(ctx.track_engine().status().status, SyncStatus::Error);
        assert_eq!(ctx.status().status, SyncStatus::Error);

        assert_eq!(ctx.push_unsynced().unwrap(), 1);
        ctx.settle().await.unwrap();
        assert_eq!(ctx.status().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_sign_in_without_remote_is_unavailable() {
        let mut ctx = local_context().await;
        assert_eq!(ctx.sign_in("uid-1").await, Err(SyncError::RemoteUnavailable));
        assert!(!ctx.is_signed_in());
        assert!(!ctx.pump().await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_in_as_configured_user() {
        let remote = Remote::new();
        let mut ctx = SyncContext::open(
            Arc::new(MemorySlotStore::new()),
            Some(remote.channels()),
            RetryPolicy::disabled(),
        )
        .await
        .unwrap();

        assert!(!ctx.sign_in_configured(&SyncConfig::default()).await.unwrap());
        assert!(!ctx.is_signed_in());

        let config = SyncConfig {
            user: Some("uid-1".into()),
            ..SyncConfig::default()
        };
        assert!(ctx.sign_in_configured(&config).await.unwrap());
        ctx.settle().await.unwrap();
        assert!(ctx.is_signed_in());
        assert_eq!(ctx.status().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_sign_out_keeps_local_data() {
        let remote = Remote::new();
        let mut ctx = synced_context(&remote).await;
        ctx.add_mountain(draft("Fuji")).await.unwrap();
        ctx.settle().await.unwrap();

        ctx.sign_out();
        assert!(!ctx.is_signed_in());
        assert_eq!(ctx.status().status, SyncStatus::Idle);
        assert_eq!(ctx.mountains().len(), 1);

        // Local-only use continues
        ctx.add_mountain(draft("Kita")).await.unwrap();
        assert_eq!(ctx.mountains().len(), 2);
        assert_eq!(remote.mountains.records(&UserScope::new("uid-1").unwrap()).len(), 1);
    }

    #[tokio::test]
    async fn test_pump_handles_events_of_both_collections() {
        let remote = Remote::new();
        let mut ctx = SyncContext::open(
            Arc::new(MemorySlotStore::new()),
            Some(remote.channels()),
            RetryPolicy::disabled(),
        )
        .await
        .unwrap();
        ctx.sign_in("uid-1").await.unwrap();

        // One initial snapshot per collection
        assert!(ctx.pump().await.unwrap());
        assert!(ctx.pump().await.unwrap());
        assert_eq!(ctx.status().status, SyncStatus::Synced);
    }
}
