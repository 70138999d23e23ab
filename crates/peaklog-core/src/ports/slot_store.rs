//! Local persistence slot port (driven/secondary port)
//!
//! Each collection is persisted verbatim as one serialized payload (a JSON
//! array of records) under a named slot. The payload is read once at
//! startup and rewritten on every mutation of the local collection.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, plain files, memory).
//! - Slots are opaque strings to the adapter; serialization is done by the
//!   caller so adapters stay record-agnostic.

/// Port trait for named persistence slots
#[async_trait::async_trait]
pub trait ISlotStore: Send + Sync {
    /// Reads the payload stored under `slot`
    ///
    /// Returns `None` if the slot has never been written.
    async fn load(&self, slot: &str) -> anyhow::Result<Option<String>>;

    /// Replaces the payload stored under `slot`
    ///
    /// Implementations must not leave a partially written payload behind.
    async fn save(&self, slot: &str, payload: &str) -> anyhow::Result<()>;
}
