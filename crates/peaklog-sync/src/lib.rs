//! peaklog Sync - Offline-first synchronization engine
//!
//! Provides:
//! - A durable local store per record kind
//! - Last-writer-wins reconciliation against a per-user remote store
//! - Echo suppression for this device's own writes
//! - A sync status state machine shared by both collections
//!
//! ## Modules
//!
//! - [`engine`] - Generic per-collection orchestrator ([`SyncEngine`])
//! - [`context`] - Both collections behind one application-facing object
//! - [`echo`] - Per-write correlation of expected snapshot echoes
//! - [`status`] - `idle` / `syncing` / `synced` / `error` tracking
//! - [`store`] - Local collection mirrored to a persistence slot
//! - [`retry`] - Optional bounded retry with exponential backoff
//! - [`remote`] - In-process remote channel adapter

pub mod context;
pub mod echo;
pub mod engine;
pub mod remote;
pub mod retry;
pub mod status;
pub mod store;

pub use context::{ImportSummary, RemoteChannels, SyncContext};
pub use echo::{EchoSuppressor, EchoVerdict};
pub use engine::{Phase, RemoteOp, SyncEngine, SyncEvent};
pub use remote::MemoryRemoteChannel;
pub use retry::RetryPolicy;
pub use status::{StatusReport, StatusTracker, SyncStatus};
pub use store::LocalStore;

use peaklog_core::domain::{DomainError, RecordId};
use thiserror::Error;

/// Errors that can occur during synchronization operations
///
/// Remote failures carry the rendered cause so they can be retained by the
/// status tracker and surfaced later.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// No remote store is bound or no identity is signed in
    #[error("Remote store unavailable")]
    RemoteUnavailable,

    /// A single-record upsert failed
    #[error("Write of {record_id} failed: {reason}")]
    WriteFailed { record_id: RecordId, reason: String },

    /// A single-record delete failed
    #[error("Delete of {record_id} failed: {reason}")]
    DeleteFailed { record_id: RecordId, reason: String },

    /// An atomic batch upsert failed as a unit
    #[error("Batch upsert of {count} records failed: {reason}")]
    BatchFailed { count: usize, reason: String },

    /// The subscription could not be opened or broke down
    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    /// An import payload was rejected before touching local state
    #[error("Malformed import: {0}")]
    MalformedImport(String),

    /// The local persistence slot could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No local record has the given identity
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// A domain-level error propagated from peaklog-core
    #[error("Domain error: {0}")]
    Domain(DomainError),
}

impl SyncError {
    /// True for failures of the remote store (as opposed to local ones)
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::WriteFailed { .. }
                | SyncError::DeleteFailed { .. }
                | SyncError::BatchFailed { .. }
                | SyncError::SnapshotError(_)
        )
    }
}

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MalformedImport(msg) => SyncError::MalformedImport(msg),
            other => SyncError::Domain(other),
        }
    }
}
