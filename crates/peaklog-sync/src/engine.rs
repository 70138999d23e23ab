//! Per-collection synchronization engine
//!
//! The [`SyncEngine`] owns one record kind's local store and reconciles it
//! with the signed-in user's remote collection. It is written once against
//! [`SyncableRecord`] and instantiated per record kind.
//!
//! ## Sync Flow
//!
//! 1. **Sign-in**: subscribe to the user's scope; phase `InitialReconciling`
//! 2. **First snapshot**: merge, deduplicate (deleting remote duplicates),
//!    upload records the remote store has never seen; phase `Steady`
//! 3. **Later snapshots**: discard this device's own echoes, merge the rest
//! 4. **Local mutations**: applied and persisted first, then sent to the
//!    remote store on a spawned task
//! 5. **Sign-out**: drop the subscription and forget expected echoes; the
//!    local store keeps working on its own
//!
//! ## Local Deletes
//!
//! A record deleted locally is tombstoned until a snapshot shows the remote
//! store no longer holds it. Tombstoned identities are never merged back in,
//! and `push_unsynced` re-issues deletes that failed. Tombstones belong to the
//! session and are dropped on sign-out.
//!
//! ## Event Loop
//!
//! Snapshot arrivals and remote completions are queued and handled one at a
//! time by whoever drives the engine ([`SyncEngine::process_next`],
//! [`SyncEngine::settle`], or [`SyncEngine::next_event`] plus
//! [`SyncEngine::handle`] inside a `select!`). Every queued event carries the
//! session epoch it belongs to; events of an earlier session are ignored.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use peaklog_conflict::{dedup, merge};
use peaklog_core::domain::{RecordId, SyncableRecord, UserScope};
use peaklog_core::ports::{IRemoteChannel, ISlotStore, Snapshot, Subscription};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::echo::{EchoSuppressor, EchoVerdict};
use crate::retry::RetryPolicy;
use crate::status::{StatusReport, StatusTracker};
use crate::store::LocalStore;
use crate::SyncError;

// ============================================================================
// Phase
// ============================================================================

/// Lifecycle of the remote session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No identity signed in (or no remote store bound)
    Disconnected,
    /// Subscribed, waiting for the first snapshot
    InitialReconciling,
    /// First snapshot reconciled
    Steady,
}

// ============================================================================
// Events
// ============================================================================

/// A remote operation issued by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    Upsert(RecordId),
    Delete(RecordId),
    Batch(Vec<RecordId>),
}

impl RemoteOp {
    fn name(&self) -> &'static str {
        match self {
            RemoteOp::Upsert(_) => "upsert",
            RemoteOp::Delete(_) => "delete",
            RemoteOp::Batch(_) => "batch_upsert",
        }
    }

    fn failure(&self, err: &anyhow::Error) -> SyncError {
        let reason = format!("{err:#}");
        match self {
            RemoteOp::Upsert(id) => SyncError::WriteFailed {
                record_id: id.clone(),
                reason,
            },
            RemoteOp::Delete(id) => SyncError::DeleteFailed {
                record_id: id.clone(),
                reason,
            },
            RemoteOp::Batch(ids) => SyncError::BatchFailed {
                count: ids.len(),
                reason,
            },
        }
    }

    fn ids(&self) -> &[RecordId] {
        match self {
            RemoteOp::Upsert(id) | RemoteOp::Delete(id) => std::slice::from_ref(id),
            RemoteOp::Batch(ids) => ids,
        }
    }
}

/// Something the engine has to react to
#[derive(Debug)]
pub enum SyncEvent<R> {
    /// The subscription delivered a snapshot or failed
    Snapshot {
        epoch: u64,
        result: anyhow::Result<Snapshot<R>>,
    },
    /// The remote side closed the subscription
    SubscriptionClosed { epoch: u64 },
    /// A remote operation finished
    Completed {
        epoch: u64,
        op: RemoteOp,
        result: anyhow::Result<()>,
    },
}

impl<R> SyncEvent<R> {
    fn epoch(&self) -> u64 {
        match self {
            SyncEvent::Snapshot { epoch, .. }
            | SyncEvent::SubscriptionClosed { epoch }
            | SyncEvent::Completed { epoch, .. } => *epoch,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

struct Session<R> {
    scope: UserScope,
    subscription: Subscription<R>,
    cancel: CancellationToken,
    /// The subscribe operation begun in `sign_in` has not been finished yet
    subscribe_pending: bool,
}

/// What a spawned remote task needs
struct Dispatch<R> {
    remote: Arc<dyn IRemoteChannel<R>>,
    scope: UserScope,
    epoch: u64,
    cancel: CancellationToken,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Offline-first sync engine for one record kind
pub struct SyncEngine<R: SyncableRecord> {
    store: LocalStore<R>,
    remote: Option<Arc<dyn IRemoteChannel<R>>>,
    retry: RetryPolicy,
    echo: EchoSuppressor,
    tombstones: HashSet<RecordId>,
    status: StatusTracker,
    phase: Phase,
    session: Option<Session<R>>,
    epoch: u64,
    events_tx: mpsc::UnboundedSender<SyncEvent<R>>,
    events_rx: mpsc::UnboundedReceiver<SyncEvent<R>>,
}

impl<R: SyncableRecord> SyncEngine<R> {
    /// Creates a local-only engine around an opened store
    pub fn new(store: LocalStore<R>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            remote: None,
            retry: RetryPolicy::disabled(),
            echo: EchoSuppressor::new(),
            tombstones: HashSet::new(),
            status: StatusTracker::new(),
            phase: Phase::Disconnected,
            session: None,
            epoch: 0,
            events_tx,
            events_rx,
        }
    }

    /// Opens the store for `R` from `slots` and creates a local-only engine
    pub async fn open(slots: Arc<dyn ISlotStore>) -> Result<Self, SyncError> {
        Ok(Self::new(LocalStore::open(slots).await?))
    }

    /// Binds a remote store; without one `sign_in` fails with
    /// `RemoteUnavailable`
    pub fn with_remote(mut self, remote: Arc<dyn IRemoteChannel<R>>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn records(&self) -> &[R] {
        self.store.records()
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.store.get(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> StatusReport {
        self.status.current()
    }

    pub fn watch_status(&self) -> watch::Receiver<StatusReport> {
        self.status.subscribe()
    }

    /// Scope of the signed-in user, if any
    pub fn scope(&self) -> Option<&UserScope> {
        self.session.as_ref().map(|s| &s.scope)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Outstanding expected echoes
    pub fn pending_echoes(&self) -> usize {
        self.echo.pending()
    }

    /// Local deletes the remote store has not confirmed yet
    pub fn unconfirmed_deletes(&self) -> usize {
        self.tombstones.len()
    }

    /// Remote operations issued but not yet handled
    pub fn in_flight(&self) -> usize {
        self.status.in_flight()
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Subscribes to `scope`'s remote collection
    ///
    /// Signing in as the current user is a no-op; signing in as another user
    /// signs the current one out first.
    pub async fn sign_in(&mut self, scope: UserScope) -> Result<(), SyncError> {
        let Some(remote) = self.remote.clone() else {
            return Err(SyncError::RemoteUnavailable);
        };
        if self.scope() == Some(&scope) {
            return Ok(());
        }
        if self.session.is_some() {
            self.sign_out();
        }

        self.epoch += 1;
        let cancel = CancellationToken::new();
        self.status.begin();
        info!(collection = %R::KIND, user = %scope, "Subscribing to remote collection");

        let subscribed = {
            let (remote, scope) = (&remote, &scope);
            self.retry
                .run("subscribe", &cancel, move || remote.subscribe(scope))
                .await
        };
        match subscribed {
            Ok(subscription) => {
                self.session = Some(Session {
                    scope,
                    subscription,
                    cancel,
                    subscribe_pending: true,
                });
                self.phase = Phase::InitialReconciling;
                Ok(())
            }
            Err(e) => {
                error!(collection = %R::KIND, error = %e, "Subscription failed");
                let err = SyncError::SnapshotError(format!("{e:#}"));
                self.status.finish(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Drops the subscription and returns to local-only operation
    ///
    /// The local collection is left untouched. Remote operations still in
    /// flight may complete, but their results are ignored.
    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            info!(collection = %R::KIND, user = %session.scope, "Unsubscribed from remote collection");
        }
        self.epoch += 1;
        self.echo.reset();
        self.tombstones.clear();
        self.status.reset();
        self.phase = Phase::Disconnected;
    }

    // ------------------------------------------------------------------------
    // Local operations
    // ------------------------------------------------------------------------

    /// Creates or replaces a record
    pub async fn upsert(&mut self, record: R) -> Result<(), SyncError> {
        self.store.upsert(record.clone()).await?;
        self.tombstones.remove(record.id());
        debug!(collection = %R::KIND, record_id = %record.id(), "Record stored locally");
        self.dispatch_upsert(record);
        Ok(())
    }

    /// Deletes a record, returning it if it existed
    pub async fn remove(&mut self, id: &RecordId) -> Result<Option<R>, SyncError> {
        let removed = self.store.remove(id).await?;
        if removed.is_some() {
            debug!(collection = %R::KIND, record_id = %id, "Record removed locally");
            self.dispatch_delete(id.clone());
        }
        Ok(removed)
    }

    /// Folds in records whose identity is not local yet and uploads them as
    /// one batch
    ///
    /// Returns the records that were added.
    pub async fn import(&mut self, records: Vec<R>) -> Result<Vec<R>, SyncError> {
        let offered = records.len();
        let added = self.store.extend(records).await?;
        info!(
            collection = %R::KIND,
            offered,
            added = added.len(),
            "Records imported"
        );
        for record in &added {
            self.tombstones.remove(record.id());
        }
        if !added.is_empty() {
            self.dispatch_batch(added.clone());
        }
        Ok(added)
    }

    /// Replaces the whole local collection and uploads it as one batch
    pub async fn replace_all(&mut self, records: Vec<R>) -> Result<(), SyncError> {
        self.store.replace_all(records.clone()).await?;
        for record in &records {
            self.tombstones.remove(record.id());
        }
        info!(collection = %R::KIND, count = records.len(), "Local collection replaced");
        if !records.is_empty() {
            self.dispatch_batch(records);
        }
        Ok(())
    }

    /// Collapses local duplicates and deletes them remotely
    ///
    /// Returns the removed identities.
    pub async fn deduplicate(&mut self) -> Result<Vec<RecordId>, SyncError> {
        let outcome = dedup(self.store.records().to_vec());
        if outcome.is_noop() {
            return Ok(Vec::new());
        }
        self.store.replace_all(outcome.survivors).await?;
        info!(collection = %R::KIND, removed = outcome.removed.len(), "Duplicates removed");
        for id in &outcome.removed {
            self.dispatch_delete(id.clone());
        }
        Ok(outcome.removed)
    }

    /// Uploads every local record the remote store does not hold in its
    /// current version and re-deletes records it still holds after a local
    /// delete
    ///
    /// Used to retry after a failed write, batch or delete. Returns the
    /// number of records sent.
    pub fn push_unsynced(&mut self) -> Result<usize, SyncError> {
        if self.phase != Phase::Steady {
            return Err(SyncError::RemoteUnavailable);
        }
        let unsynced: Vec<R> = self
            .store
            .records()
            .iter()
            .filter(|r| self.echo.last_seen(r.id()) != Some(r.last_modified()))
            .cloned()
            .collect();
        // Deletes still in flight are left alone
        let undeleted: Vec<RecordId> = self
            .tombstones
            .iter()
            .filter(|id| self.echo.last_seen(id).is_some() && !self.echo.pending_delete(id))
            .cloned()
            .collect();

        let count = unsynced.len() + undeleted.len();
        if !unsynced.is_empty() {
            self.dispatch_batch(unsynced);
        }
        for id in undeleted {
            self.dispatch_delete(id);
        }
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Remote dispatch
    // ------------------------------------------------------------------------

    fn dispatcher(&self) -> Option<Dispatch<R>> {
        let session = self.session.as_ref()?;
        let remote = self.remote.clone()?;
        Some(Dispatch {
            remote,
            scope: session.scope.clone(),
            epoch: self.epoch,
            cancel: session.cancel.clone(),
        })
    }

    fn dispatch_upsert(&mut self, record: R) {
        let Some(d) = self.dispatcher() else { return };
        self.echo
            .arm_upsert(record.id().clone(), record.last_modified().clone());
        let op = RemoteOp::Upsert(record.id().clone());
        self.spawn(d, op, move |remote, scope| {
            let record = record.clone();
            async move { remote.upsert(&scope, &record).await }
        });
    }

    fn dispatch_delete(&mut self, id: RecordId) {
        let Some(d) = self.dispatcher() else { return };
        // Before the first snapshot nothing is known about the remote store
        let armed = self.echo.arm_delete(id.clone());
        if armed || self.phase == Phase::InitialReconciling {
            self.tombstones.insert(id.clone());
        } else {
            debug!(collection = %R::KIND, record_id = %id, "Record unknown remotely, no echo expected");
        }
        let op = RemoteOp::Delete(id.clone());
        self.spawn(d, op, move |remote, scope| {
            let id = id.clone();
            async move { remote.delete(&scope, &id).await }
        });
    }

    fn dispatch_batch(&mut self, records: Vec<R>) {
        let Some(d) = self.dispatcher() else { return };
        for record in &records {
            self.echo
                .arm_upsert(record.id().clone(), record.last_modified().clone());
        }
        let op = RemoteOp::Batch(records.iter().map(|r| r.id().clone()).collect());
        self.spawn(d, op, move |remote, scope| {
            let records = records.clone();
            async move { remote.batch_upsert(&scope, &records).await }
        });
    }

    /// Runs one remote operation (with retry) on a spawned task and queues
    /// its completion
    fn spawn<F, Fut>(&mut self, d: Dispatch<R>, op: RemoteOp, call: F)
    where
        F: Fn(Arc<dyn IRemoteChannel<R>>, UserScope) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.status.begin();
        debug!(collection = %R::KIND, op = op.name(), records = op.ids().len(), "Remote operation issued");

        let retry = self.retry;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let Dispatch {
                remote,
                scope,
                epoch,
                cancel,
            } = d;
            let result = {
                let (remote, scope, call) = (&remote, &scope, &call);
                retry
                    .run(op.name(), &cancel, move || call(remote.clone(), scope.clone()))
                    .await
            };
            // The engine may be gone already; nothing to report to then
            let _ = tx.send(SyncEvent::Completed { epoch, op, result });
        });
    }

    // ------------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------------

    /// Waits for the next event
    ///
    /// Returns `None` when signed out and nothing is queued. Cancel-safe, so
    /// it can be used as a `select!` branch.
    pub async fn next_event(&mut self) -> Option<SyncEvent<R>> {
        let Some(session) = self.session.as_mut() else {
            return self.events_rx.try_recv().ok();
        };
        let epoch = self.epoch;
        tokio::select! {
            biased;
            Some(event) = self.events_rx.recv() => Some(event),
            item = session.subscription.next() => Some(match item {
                Some(result) => SyncEvent::Snapshot { epoch, result },
                None => SyncEvent::SubscriptionClosed { epoch },
            }),
        }
    }

    /// Returns an already queued event without waiting
    pub fn try_next_event(&mut self) -> Option<SyncEvent<R>> {
        if let Ok(event) = self.events_rx.try_recv() {
            return Some(event);
        }
        let epoch = self.epoch;
        let session = self.session.as_mut()?;
        session
            .subscription
            .try_next()
            .map(|result| SyncEvent::Snapshot { epoch, result })
    }

    /// Waits for and handles one event; returns false if there was none
    pub async fn process_next(&mut self) -> Result<bool, SyncError> {
        match self.next_event().await {
            Some(event) => {
                self.handle(event).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Handles events until no remote operation is in flight and nothing is
    /// queued
    pub async fn settle(&mut self) -> Result<(), SyncError> {
        loop {
            let event = if self.status.in_flight() > 0 {
                self.next_event().await
            } else {
                self.try_next_event()
            };
            match event {
                Some(event) => self.handle(event).await?,
                None => return Ok(()),
            }
        }
    }

    /// Applies one event
    ///
    /// Remote failures are logged and reflected in the status; only local
    /// persistence failures are returned.
    pub async fn handle(&mut self, event: SyncEvent<R>) -> Result<(), SyncError> {
        if event.epoch() != self.epoch {
            debug!(collection = %R::KIND, epoch = event.epoch(), "Ignoring event from a previous session");
            return Ok(());
        }

        match event {
            SyncEvent::Snapshot { result: Ok(snapshot), .. } => match self.phase {
                Phase::InitialReconciling => self.initial_reconcile(snapshot).await,
                Phase::Steady => self.apply_snapshot(snapshot).await,
                Phase::Disconnected => Ok(()),
            },
            SyncEvent::Snapshot { result: Err(e), .. } => {
                warn!(collection = %R::KIND, error = %e, "Snapshot delivery failed");
                let err = SyncError::SnapshotError(format!("{e:#}"));
                if self.take_subscribe_pending() {
                    self.status.finish(Err(err));
                } else {
                    self.status.fail(err);
                }
                Ok(())
            }
            SyncEvent::SubscriptionClosed { .. } => {
                warn!(collection = %R::KIND, "Remote closed the subscription");
                self.sign_out();
                self.status
                    .fail(SyncError::SnapshotError("subscription closed".into()));
                Ok(())
            }
            SyncEvent::Completed { op, result, .. } => {
                match result {
                    Ok(()) => {
                        debug!(collection = %R::KIND, op = op.name(), "Remote operation completed");
                        self.status.finish(Ok(()));
                    }
                    Err(e) => {
                        let err = op.failure(&e);
                        error!(collection = %R::KIND, error = %err, "Remote operation failed");
                        for id in op.ids() {
                            self.echo.disarm(id);
                        }
                        self.status.finish(Err(err));
                    }
                }
                Ok(())
            }
        }
    }

    /// Marks the subscribe operation finished; true the first time only
    fn take_subscribe_pending(&mut self) -> bool {
        self.session
            .as_mut()
            .map(|s| std::mem::replace(&mut s.subscribe_pending, false))
            .unwrap_or(false)
    }

    /// Observes `snapshot` and returns the records to merge
    ///
    /// Drops tombstones the snapshot confirms and leaves tombstoned
    /// identities out of the result.
    fn observe(&mut self, snapshot: &Snapshot<R>) -> (EchoVerdict, HashMap<RecordId, R>) {
        let verdict = self.echo.observe(snapshot);
        let echo = &self.echo;
        self.tombstones
            .retain(|id| snapshot.contains(id) || echo.pending_delete(id));

        let remote = snapshot
            .records
            .iter()
            .filter(|(id, _)| !self.tombstones.contains(*id))
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect();
        (verdict, remote)
    }

    /// First snapshot of a session
    async fn initial_reconcile(&mut self, snapshot: Snapshot<R>) -> Result<(), SyncError> {
        let (_, remote) = self.observe(&snapshot);

        let merged = merge(self.store.records().to_vec(), &remote);
        let deduped = dedup(merged.records);
        let remote_duplicates: Vec<RecordId> = deduped
            .removed
            .iter()
            .filter(|id| snapshot.contains(id))
            .cloned()
            .collect();
        let local_only: Vec<R> = deduped
            .survivors
            .iter()
            .filter(|r| !snapshot.contains(r.id()))
            .cloned()
            .collect();

        info!(
            collection = %R::KIND,
            remote = snapshot.len(),
            inserted = merged.inserted,
            replaced = merged.replaced,
            duplicates = deduped.removed.len(),
            local_only = local_only.len(),
            "Initial reconciliation"
        );

        self.store.replace_all(deduped.survivors).await?;
        self.phase = Phase::Steady;

        for id in remote_duplicates {
            self.dispatch_delete(id);
        }
        if !local_only.is_empty() {
            self.dispatch_batch(local_only);
        }
        if self.take_subscribe_pending() {
            self.status.finish(Ok(()));
        } else {
            self.status.snapshot_processed();
        }
        Ok(())
    }

    /// Any snapshot after the first
    async fn apply_snapshot(&mut self, snapshot: Snapshot<R>) -> Result<(), SyncError> {
        let (verdict, remote) = self.observe(&snapshot);
        match verdict {
            EchoVerdict::Echo => {
                debug!(collection = %R::KIND, revision = snapshot.revision, "Own echo suppressed");
            }
            EchoVerdict::Unchanged => {
                debug!(collection = %R::KIND, revision = snapshot.revision, "Snapshot unchanged");
            }
            EchoVerdict::Fresh => {
                let merged = merge(self.store.records().to_vec(), &remote);
                if !merged.is_noop() {
                    info!(
                        collection = %R::KIND,
                        revision = snapshot.revision,
                        inserted = merged.inserted,
                        replaced = merged.replaced,
                        "Remote changes merged"
                    );
                    self.store.replace_all(merged.records).await?;
                }
            }
        }
        self.status.snapshot_processed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteChannel;
    use crate::status::SyncStatus;
    use peaklog_cache::MemorySlotStore;
    use peaklog_core::domain::{LastModified, Mountain, MountainDraft};
    use peaklog_core::ports::SnapshotSender;

    fn scope() -> UserScope {
        UserScope::new("uid-1").unwrap()
    }

    fn mountain(name: &str, lat: f64, lng: f64) -> Mountain {
        Mountain::create(MountainDraft {
            name: name.into(),
            lat,
            lng,
            ..Default::default()
        })
    }

    async fn engine(remote: &MemoryRemoteChannel<Mountain>) -> SyncEngine<Mountain> {
        SyncEngine::open(Arc::new(MemorySlotStore::new()))
            .await
            .unwrap()
            .with_remote(Arc::new(remote.clone()))
    }

    /// Remote whose subscription yields scripted items and whose writes
    /// never complete
    struct ScriptedRemote {
        items: std::sync::Mutex<Vec<anyhow::Result<Snapshot<Mountain>>>>,
        feed: std::sync::Mutex<Option<SnapshotSender<Mountain>>>,
    }

    impl ScriptedRemote {
        fn new(items: Vec<anyhow::Result<Snapshot<Mountain>>>) -> Self {
            Self {
                items: std::sync::Mutex::new(items),
                feed: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl IRemoteChannel<Mountain> for ScriptedRemote {
        async fn subscribe(&self, _scope: &UserScope) -> anyhow::Result<Subscription<Mountain>> {
            let (tx, subscription) = Subscription::channel();
            for item in self.items.lock().unwrap().drain(..) {
                tx.send(item).unwrap();
            }
            // Kept open so the stream does not end
            *self.feed.lock().unwrap() = Some(tx);
            Ok(subscription)
        }

        async fn upsert(&self, _scope: &UserScope, _record: &Mountain) -> anyhow::Result<()> {
            std::future::pending().await
        }

        async fn delete(&self, _scope: &UserScope, _id: &RecordId) -> anyhow::Result<()> {
            std::future::pending().await
        }

        async fn batch_upsert(&self, _scope: &UserScope, _records: &[Mountain]) -> anyhow::Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_local_only_without_remote() {
        let mut engine = SyncEngine::<Mountain>::open(Arc::new(MemorySlotStore::new()))
            .await
            .unwrap();
        assert_eq!(
            engine.sign_in(scope()).await,
            Err(SyncError::RemoteUnavailable)
        );

        engine.upsert(mountain("Fuji", 35.36, 138.73)).await.unwrap();
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.status().status, SyncStatus::Idle);
        assert_eq!(engine.in_flight(), 0);
        assert!(!engine.process_next().await.unwrap());
    }

    #[tokio::test]
    async fn test_initial_reconcile_uploads_local_only_records() {
        let remote = MemoryRemoteChannel::new();
        let from_other_device = mountain("Kita", 35.67, 138.24);
        remote.upsert(&scope(), &from_other_device).await.unwrap();

        let mut engine = engine(&remote).await;
        let fuji = mountain("Fuji", 35.36, 138.73);
        engine.upsert(fuji.clone()).await.unwrap();

        engine.sign_in(scope()).await.unwrap();
        assert_eq!(engine.phase(), Phase::InitialReconciling);
        assert_eq!(engine.status().status, SyncStatus::Syncing);

        engine.settle().await.unwrap();
        assert_eq!(engine.phase(), Phase::Steady);
        assert_eq!(engine.len(), 2);
        assert_eq!(remote.records(&scope()).len(), 2);
        assert_eq!(engine.status().status, SyncStatus::Synced);
        assert_eq!(engine.pending_echoes(), 0);
    }

    #[tokio::test]
    async fn test_initial_reconcile_removes_remote_duplicates() {
        let remote = MemoryRemoteChannel::new();
        let mut older = mountain("Fuji", 35.36, 138.73);
        older.updated_at = LastModified::from_raw("2024-01-01T00:00:00.000Z");
        remote.upsert(&scope(), &older).await.unwrap();

        let mut engine = engine(&remote).await;
        let newer = mountain("Fuji", 35.3601, 138.7299);
        engine.upsert(newer.clone()).await.unwrap();

        engine.sign_in(scope()).await.unwrap();
        engine.settle().await.unwrap();

        assert_eq!(engine.records(), &[newer.clone()]);
        assert_eq!(remote.records(&scope()), vec![newer]);
    }

    #[tokio::test]
    async fn test_own_write_echo_is_suppressed() {
        let remote = MemoryRemoteChannel::new();
        let mut engine = engine(&remote).await;
        engine.sign_in(scope()).await.unwrap();
        engine.settle().await.unwrap();

        let fuji = mountain("Fuji", 35.36, 138.73);
        engine.upsert(fuji.clone()).await.unwrap();
        assert_eq!(engine.pending_echoes(), 1);
        assert_eq!(engine.status().status, SyncStatus::Syncing);

        engine.settle().await.unwrap();
        assert_eq!(engine.records(), &[fuji]);
        assert_eq!(engine.pending_echoes(), 0);
        assert_eq!(engine.status().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_failed_write_sets_error_and_keeps_local_state() {
        let remote = MemoryRemoteChannel::new();
        let mut engine = engine(&remote).await;
        engine.sign_in(scope()).await.unwrap();
        engine.settle().await.unwrap();

        remote.fail_next(1);
        let fuji = mountain("Fuji", 35.36, 138.73);
        engine.upsert(fuji.clone()).await.unwrap();
        engine.settle().await.unwrap();

        let report = engine.status();
        assert_eq!(report.status, SyncStatus::Error);
        assert!(matches!(report.error, Some(SyncError::WriteFailed { .. })));
        assert_eq!(engine.records(), &[fuji]);
        assert_eq!(engine.pending_echoes(), 0);

        assert_eq!(engine.push_unsynced().unwrap(), 1);
        engine.settle().await.unwrap();
        assert_eq!(engine.status().status, SyncStatus::Synced);
        assert_eq!(remote.records(&scope()).len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_ignores_late_completions() {
        let remote = MemoryRemoteChannel::new();
        let mut engine = engine(&remote).await;
        engine.sign_in(scope()).await.unwrap();
        engine.settle().await.unwrap();

        engine.upsert(mountain("Fuji", 35.36, 138.73)).await.unwrap();
        engine.sign_out();
        assert_eq!(engine.phase(), Phase::Disconnected);
        assert_eq!(engine.status().status, SyncStatus::Idle);
        assert_eq!(engine.pending_echoes(), 0);

        // Let the spawned write finish, then drain its stale completion
        tokio::task::yield_now().await;
        while engine.process_next().await.unwrap() {}
        assert_eq!(engine.status().status, SyncStatus::Idle);
        assert_eq!(engine.len(), 1);
        assert_eq!(remote.subscriber_count(&scope()), 0);
    }

    #[tokio::test]
    async fn test_subscription_failure() {
        let remote = MemoryRemoteChannel::new();
        remote.set_offline(true);
        let mut engine = engine(&remote).await;

        let err = engine.sign_in(scope()).await.unwrap_err();
        assert!(matches!(err, SyncError::SnapshotError(_)));
        assert_eq!(engine.phase(), Phase::Disconnected);
        assert_eq!(engine.status().status, SyncStatus::Error);
    }

    #[tokio::test]
    async fn test_broken_subscription_disconnects() {
        let remote = MemoryRemoteChannel::new();
        let mut engine = engine(&remote).await;
        engine.sign_in(scope()).await.unwrap();
        engine.settle().await.unwrap();

        remote.break_subscriptions(&scope(), "permission denied");
        assert!(engine.process_next().await.unwrap());
        assert_eq!(engine.status().status, SyncStatus::Error);
        assert!(engine.process_next().await.unwrap());
        assert_eq!(engine.phase(), Phase::Disconnected);
        assert!(matches!(
            engine.status().error,
            Some(SyncError::SnapshotError(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_error_before_first_snapshot_keeps_writes_in_flight() {
        let remote = ScriptedRemote::new(vec![
            Err(anyhow::anyhow!("permission denied")),
            Ok(Snapshot::empty(0)),
        ]);
        let mut engine = SyncEngine::<Mountain>::open(Arc::new(MemorySlotStore::new()))
            .await
            .unwrap()
            .with_remote(Arc::new(remote));
        engine.sign_in(scope()).await.unwrap();

        engine.upsert(mountain("Fuji", 35.36, 138.73)).await.unwrap();
        assert_eq!(engine.in_flight(), 2);

        assert!(engine.process_next().await.unwrap());
        assert_eq!(engine.in_flight(), 1);
        assert_eq!(engine.status().status, SyncStatus::Error);

        assert!(engine.process_next().await.unwrap());
        assert_eq!(engine.phase(), Phase::Steady);
        // The upsert and the batch upload of the local-only record
        assert_eq!(engine.in_flight(), 2);
        assert_ne!(engine.status().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_deduplicate_local_only_copies_expects_no_echo() {
        let remote = MemoryRemoteChannel::new();
        let mut engine = engine(&remote).await;
        engine.sign_in(scope()).await.unwrap();
        engine.settle().await.unwrap();

        remote.set_offline(true);
        let a = mountain("Fuji", 35.36, 138.73);
        let b = mountain("Fuji", 35.36, 138.73);
        engine.import(vec![a, b]).await.unwrap();
        engine.settle().await.unwrap();

        assert_eq!(engine.deduplicate().await.unwrap().len(), 1);
        engine.settle().await.unwrap();
        assert_eq!(engine.pending_echoes(), 0);
        assert_eq!(engine.unconfirmed_deletes(), 0);

        remote.set_offline(false);
        assert_eq!(engine.push_unsynced().unwrap(), 1);
        engine.settle().await.unwrap();
        assert_eq!(remote.records(&scope()).len(), 1);
        assert_eq!(engine.pending_echoes(), 0);
        assert_eq!(engine.status().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_deduplicate_deletes_remotely() {
        let remote = MemoryRemoteChannel::new();
        let mut engine = engine(&remote).await;
        engine.sign_in(scope()).await.unwrap();
        engine.settle().await.unwrap();

        let a = mountain("Fuji", 35.36, 138.73);
        let b = mountain("Fuji", 35.36, 138.73);
        engine.import(vec![a, b.clone()]).await.unwrap();
        engine.settle().await.unwrap();
        assert_eq!(remote.records(&scope()).len(), 2);

        let removed = engine.deduplicate().await.unwrap();
        assert_eq!(removed.len(), 1);
        engine.settle().await.unwrap();
        assert_eq!(engine.len(), 1);
        assert_eq!(remote.records(&scope()).len(), 1);
        assert_eq!(engine.status().status, SyncStatus::Synced);
    }
}
