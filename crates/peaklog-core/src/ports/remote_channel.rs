//! Remote channel port (driven/secondary port)
//!
//! This module defines the interface to the per-user remote document store.
//! The concrete binding (a hosted document database, a test double, ...)
//! lives in an adapter; the sync engine only sees this trait.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific; the sync engine maps them to `SyncError` variants.
//! - Uses `#[async_trait]` for async trait methods.
//! - A subscription is a channel of full snapshots. The first snapshot is
//!   delivered immediately, then one per change from any device, including
//!   changes this device made itself.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::domain::{newtypes::RecordId, record::SyncableRecord, UserScope};

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of every record in one user's collection
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R> {
    /// Records keyed by identity
    pub records: HashMap<RecordId, R>,
    /// Store-assigned revision, monotonic per scope (informational)
    pub revision: u64,
}

impl<R: SyncableRecord> Snapshot<R> {
    /// Builds a snapshot from a list of records
    pub fn from_records(records: impl IntoIterator<Item = R>, revision: u64) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.id().clone(), r))
                .collect(),
            revision,
        }
    }

    /// An empty snapshot
    pub fn empty(revision: u64) -> Self {
        Self {
            records: HashMap::new(),
            revision,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Sending half handed to the adapter that feeds a subscription
pub type SnapshotSender<R> = mpsc::UnboundedSender<anyhow::Result<Snapshot<R>>>;

/// Live subscription to a user's collection
///
/// An `Err` item means the subscription itself failed. Dropping the
/// subscription unsubscribes; adapters notice through the closed sender.
#[derive(Debug)]
pub struct Subscription<R> {
    rx: mpsc::UnboundedReceiver<anyhow::Result<Snapshot<R>>>,
}

impl<R> Subscription<R> {
    /// Creates a connected (sender, subscription) pair
    pub fn channel() -> (SnapshotSender<R>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Waits for the next snapshot
    ///
    /// Returns `None` once the adapter has closed the stream. Cancel-safe.
    pub async fn next(&mut self) -> Option<anyhow::Result<Snapshot<R>>> {
        self.rx.recv().await
    }

    /// Returns the next snapshot if one is already queued
    pub fn try_next(&mut self) -> Option<anyhow::Result<Snapshot<R>>> {
        self.rx.try_recv().ok()
    }
}

// ============================================================================
// IRemoteChannel trait
// ============================================================================

/// Port trait for the per-user remote record store
///
/// ## Implementation Notes
///
/// - `upsert` and `batch_upsert` are idempotent per identity.
/// - `delete` of an absent identity succeeds.
/// - `batch_upsert` is all-or-nothing: on error, no record of the batch may
///   be visible to subscribers.
/// - Implementations should not retry internally; the engine owns the retry
///   policy.
#[async_trait::async_trait]
pub trait IRemoteChannel<R: SyncableRecord>: Send + Sync {
    /// Subscribes to every record in the user's collection
    async fn subscribe(&self, scope: &UserScope) -> anyhow::Result<Subscription<R>>;

    /// Creates or replaces one record
    async fn upsert(&self, scope: &UserScope, record: &R) -> anyhow::Result<()>;

    /// Deletes one record by identity
    async fn delete(&self, scope: &UserScope, id: &RecordId) -> anyhow::Result<()>;

    /// Creates or replaces several records as one atomic unit
    async fn batch_upsert(&self, scope: &UserScope, records: &[R]) -> anyhow::Result<()>;
}
