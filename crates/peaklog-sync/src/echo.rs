//! Echo suppression
//!
//! Every write this device issues comes back through its own subscription.
//! The suppressor correlates those echoes with the writes that caused them,
//! one expectation per record identity, so that a snapshot is only discarded
//! when *all* of its changes are accounted for. A snapshot that also carries
//! a change from another device is always merged.
//!
//! Changes are found by diffing each snapshot's `(identity, lastModified)`
//! fingerprint against the previously observed one.

use std::collections::HashMap;

use peaklog_core::domain::{LastModified, RecordId, SyncableRecord};
use peaklog_core::ports::Snapshot;
use tracing::trace;

/// What a snapshot means for the local collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoVerdict {
    /// Only this device's own writes; nothing to merge
    Echo,
    /// Carries at least one change that was not expected; merge it
    Fresh,
    /// Identical to the previous snapshot
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expectation {
    Upsert(LastModified),
    Delete,
}

/// Per-write echo correlation for one collection
#[derive(Debug, Default)]
pub struct EchoSuppressor {
    pending: HashMap<RecordId, Expectation>,
    baseline: HashMap<RecordId, LastModified>,
}

impl EchoSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects `id` to show up carrying `marker`
    pub fn arm_upsert(&mut self, id: RecordId, marker: LastModified) {
        self.pending.insert(id, Expectation::Upsert(marker));
    }

    /// Expects `id` to disappear
    ///
    /// A delete only produces a snapshot if the remote store holds `id`, so
    /// nothing is armed for an identity that was never observed and has no
    /// upsert pending. Returns whether an expectation was armed.
    pub fn arm_delete(&mut self, id: RecordId) -> bool {
        let held = self.baseline.contains_key(&id)
            || matches!(self.pending.get(&id), Some(Expectation::Upsert(_)));
        if held {
            self.pending.insert(id, Expectation::Delete);
        }
        held
    }

    /// Drops the expectation for a write that failed
    pub fn disarm(&mut self, id: &RecordId) {
        self.pending.remove(id);
    }

    /// Whether a delete of `id` is still waiting for its echo
    pub fn pending_delete(&self, id: &RecordId) -> bool {
        matches!(self.pending.get(id), Some(Expectation::Delete))
    }

    /// Number of outstanding expectations
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Marker of `id` in the last observed snapshot
    pub fn last_seen(&self, id: &RecordId) -> Option<&LastModified> {
        self.baseline.get(id)
    }

    /// Classifies a snapshot and makes it the new baseline
    ///
    /// Expectations matched by the snapshot are consumed whatever the
    /// verdict.
    pub fn observe<R: SyncableRecord>(&mut self, snapshot: &Snapshot<R>) -> EchoVerdict {
        let fingerprint: HashMap<RecordId, LastModified> = snapshot
            .records
            .iter()
            .map(|(id, r)| (id.clone(), r.last_modified().clone()))
            .collect();

        let mut changed = 0usize;
        let mut unexpected = 0usize;

        for (id, marker) in &fingerprint {
            if self.baseline.get(id) == Some(marker) {
                continue;
            }
            changed += 1;
            match self.pending.get(id) {
                Some(Expectation::Upsert(expected)) if expected == marker => {
                    self.pending.remove(id);
                }
                _ => unexpected += 1,
            }
        }

        for id in self.baseline.keys() {
            if fingerprint.contains_key(id) {
                continue;
            }
            changed += 1;
            match self.pending.get(id) {
                Some(Expectation::Delete) => {
                    self.pending.remove(id);
                }
                _ => unexpected += 1,
            }
        }

        self.baseline = fingerprint;

        let verdict = if changed == 0 {
            EchoVerdict::Unchanged
        } else if unexpected == 0 {
            EchoVerdict::Echo
        } else {
            EchoVerdict::Fresh
        };
        trace!(changed, unexpected, ?verdict, "Snapshot classified");
        verdict
    }

    /// Forgets every expectation and the baseline
    pub fn reset(&mut self) {
        self.pending.clear();
        self.baseline.clear();
    }
}
