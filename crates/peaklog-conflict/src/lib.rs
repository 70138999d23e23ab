//! peaklog Conflict - Record reconciliation
//!
//! Provides:
//! - Last-writer-wins merge of a local collection with a remote snapshot
//! - Semantic deduplication of records describing the same entity
//!
//! Both operations are pure functions over [`SyncableRecord`]; the sync
//! engine decides when to run them and what to do with their results.
//!
//! [`SyncableRecord`]: peaklog_core::domain::SyncableRecord

pub mod dedup;
pub mod merge;

pub use dedup::{dedup, DedupOutcome};
pub use merge::{merge, MergeOutcome};

#[cfg(test)]
pub(crate) mod testing;
