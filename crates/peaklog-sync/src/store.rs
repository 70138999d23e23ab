//! Local store
//!
//! The in-memory collection of one record kind, mirrored to its persistence
//! slot after every mutation. It is the device's source of truth: remote
//! failures never roll it back.

use std::sync::Arc;

use peaklog_core::domain::{RecordId, SyncableRecord};
use peaklog_core::ports::ISlotStore;
use tracing::{debug, info};

use crate::SyncError;

/// One collection, unique by identity, durably mirrored
pub struct LocalStore<R> {
    records: Vec<R>,
    slots: Arc<dyn ISlotStore>,
}

impl<R: SyncableRecord> LocalStore<R> {
    /// Loads the collection from its slot
    ///
    /// A slot that was never written yields an empty collection. A slot that
    /// does not hold a JSON array of records is an error rather than an empty
    /// collection, since the next save would overwrite it.
    pub async fn open(slots: Arc<dyn ISlotStore>) -> Result<Self, SyncError> {
        let slot = R::KIND.storage_slot();
        let records = match slots
            .load(slot)
            .await
            .map_err(|e| SyncError::Persistence(format!("load {slot}: {e:#}")))?
        {
            Some(payload) => serde_json::from_str::<Vec<R>>(&payload)
                .map_err(|e| SyncError::Persistence(format!("decode {slot}: {e}")))?,
            None => Vec::new(),
        };
        info!(collection = %R::KIND, count = records.len(), "Local collection loaded");
        Ok(Self { records, slots })
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts or replaces a record by identity
    pub async fn upsert(&mut self, record: R) -> Result<(), SyncError> {
        match self.records.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        self.persist().await
    }

    /// Removes a record, returning it if it was present
    pub async fn remove(&mut self, id: &RecordId) -> Result<Option<R>, SyncError> {
        let Some(pos) = self.records.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };
        let removed = self.records.remove(pos);
        self.persist().await?;
        Ok(Some(removed))
    }

    /// Appends records whose identity is not present yet
    ///
    /// Returns the records actually added.
    pub async fn extend(&mut self, records: Vec<R>) -> Result<Vec<R>, SyncError> {
        let mut added = Vec::new();
        for record in records {
            if !self.contains(record.id()) && !added.iter().any(|a: &R| a.id() == record.id()) {
                added.push(record);
            }
        }
        if added.is_empty() {
            return Ok(added);
        }
        self.records.extend(added.iter().cloned());
        self.persist().await?;
        Ok(added)
    }

    /// Replaces the whole collection
    pub async fn replace_all(&mut self, records: Vec<R>) -> Result<(), SyncError> {
        self.records = records;
        self.persist().await
    }

    async fn persist(&self) -> Result<(), SyncError> {
        let slot = R::KIND.storage_slot();
        let payload = serde_json::to_string(&self.records)
            .map_err(|e| SyncError::Persistence(format!("encode {slot}: {e}")))?;
        self.slots
            .save(slot, &payload)
            .await
            .map_err(|e| SyncError::Persistence(format!("save {slot}: {e:#}")))?;
        debug!(collection = %R::KIND, count = self.records.len(), "Local collection persisted");
        Ok(())
    }
}
