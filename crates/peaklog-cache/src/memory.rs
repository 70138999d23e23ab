//! In-memory slot store

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use peaklog_core::ports::ISlotStore;

/// Process-local implementation of [`ISlotStore`]
///
/// Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots written so far
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ISlotStore for MemorySlotStore {
    async fn load(&self, slot: &str) -> anyhow::Result<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| anyhow::anyhow!("slot store lock poisoned"))?;
        Ok(slots.get(slot).cloned())
    }

    async fn save(&self, slot: &str, payload: &str) -> anyhow::Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| anyhow::anyhow!("slot store lock poisoned"))?;
        slots.insert(slot.to_string(), payload.to_string());
        Ok(())
    }
}
