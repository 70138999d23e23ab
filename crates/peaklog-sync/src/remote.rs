//! In-process remote channel
//!
//! [`MemoryRemoteChannel`] implements [`IRemoteChannel`] over a shared map,
//! broadcasting a full snapshot to every subscriber of a scope after each
//! change. Clones share the same store, so several engines (one per simulated
//! device) can sync against one instance.
//!
//! Failure injection (`set_offline`, `fail_next`) makes operations fail the
//! way a dropped network connection would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use peaklog_core::domain::{RecordId, SyncableRecord, UserScope};
use peaklog_core::ports::{IRemoteChannel, Snapshot, SnapshotSender, Subscription};
use tracing::trace;

struct ScopeState<R> {
    records: HashMap<RecordId, R>,
    revision: u64,
    subscribers: Vec<SnapshotSender<R>>,
}

impl<R> Default for ScopeState<R> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            revision: 0,
            subscribers: Vec::new(),
        }
    }
}

impl<R: SyncableRecord> ScopeState<R> {
    fn snapshot(&self) -> Snapshot<R> {
        Snapshot {
            records: self.records.clone(),
            revision: self.revision,
        }
    }

    fn commit(&mut self) {
        self.revision += 1;
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        trace!(
            revision = self.revision,
            subscribers = self.subscribers.len(),
            "Snapshot broadcast"
        );
    }
}

struct Inner<R> {
    scopes: HashMap<UserScope, ScopeState<R>>,
    offline: bool,
    fail_next: usize,
}

/// Shared in-memory remote store
pub struct MemoryRemoteChannel<R> {
    inner: Arc<Mutex<Inner<R>>>,
}

impl<R> Clone for MemoryRemoteChannel<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: SyncableRecord> Default for MemoryRemoteChannel<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SyncableRecord> MemoryRemoteChannel<R> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                scopes: HashMap::new(),
                offline: false,
                fail_next: 0,
            })),
        }
    }

    /// While offline every operation fails
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Makes the next `n` operations fail
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Records currently stored for `scope`, sorted by identity
    pub fn records(&self, scope: &UserScope) -> Vec<R> {
        let inner = self.lock();
        let mut records: Vec<R> = inner
            .scopes
            .get(scope)
            .map(|s| s.records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        records
    }

    /// Current revision of `scope` (0 if it was never written)
    pub fn revision(&self, scope: &UserScope) -> u64 {
        self.lock().scopes.get(scope).map_or(0, |s| s.revision)
    }

    /// Live subscriptions of `scope`
    pub fn subscriber_count(&self, scope: &UserScope) -> usize {
        let mut inner = self.lock();
        match inner.scopes.get_mut(scope) {
            Some(state) => {
                state.subscribers.retain(|tx| !tx.is_closed());
                state.subscribers.len()
            }
            None => 0,
        }
    }

    /// Delivers a subscription error to every subscriber of `scope`
    pub fn break_subscriptions(&self, scope: &UserScope, reason: &str) {
        let mut inner = self.lock();
        if let Some(state) = inner.scopes.get_mut(scope) {
            for tx in state.subscribers.drain(..) {
                let _ = tx.send(Err(anyhow!("{reason}")));
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        // A panicking holder cannot leave the maps half-updated
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(inner: &mut Inner<R>, operation: &str) -> anyhow::Result<()> {
        if inner.offline {
            return Err(anyhow!("{operation}: network unavailable"));
        }
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(anyhow!("{operation}: connection reset"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: SyncableRecord> IRemoteChannel<R> for MemoryRemoteChannel<R> {
    async fn subscribe(&self, scope: &UserScope) -> anyhow::Result<Subscription<R>> {
        let mut inner = self.lock();
        Self::check_available(&mut inner, "subscribe")?;
        let state = inner.scopes.entry(scope.clone()).or_default();
        let (tx, subscription) = Subscription::channel();
        tx.send(Ok(state.snapshot()))
            .map_err(|_| anyhow!("subscribe: receiver dropped"))?;
        state.subscribers.push(tx);
        Ok(subscription)
    }

    async fn upsert(&self, scope: &UserScope, record: &R) -> anyhow::Result<()> {
        let mut inner = self.lock();
        Self::check_available(&mut inner, "upsert")?;
        let state = inner.scopes.entry(scope.clone()).or_default();
        state.records.insert(record.id().clone(), record.clone());
        state.commit();
        Ok(())
    }

    async fn delete(&self, scope: &UserScope, id: &RecordId) -> anyhow::Result<()> {
        let mut inner = self.lock();
        Self::check_available(&mut inner, "delete")?;
        let state = inner.scopes.entry(scope.clone()).or_default();
        if state.records.remove(id).is_some() {
            state.commit();
        }
        Ok(())
    }

    async fn batch_upsert(&self, scope: &UserScope, records: &[R]) -> anyhow::Result<()> {
        let mut inner = self.lock();
        Self::check_available(&mut inner, "batch_upsert")?;
        let state = inner.scopes.entry(scope.clone()).or_default();
        for record in records {
            state.records.insert(record.id().clone(), record.clone());
        }
        state.commit();
        Ok(())
    }
}
