//! JSON file slot store
//!
//! Each slot lives in `<dir>/<slot>.json`. Saves go to a temporary sibling
//! first and are renamed into place, so a crash mid-write leaves the previous
//! payload intact.

use std::path::{Path, PathBuf};

use peaklog_core::ports::ISlotStore;
use tokio::io::AsyncWriteExt;

use crate::CacheError;

/// File-backed implementation of [`ISlotStore`]
#[derive(Debug, Clone)]
pub struct JsonFileSlotStore {
    dir: PathBuf,
}

impl JsonFileSlotStore {
    /// Uses `dir` for the slot files, creating it if needed
    pub async fn open(dir: &Path) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| CacheError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        tracing::info!(path = %dir.display(), "JSON slot store opened");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `slot`
    pub fn slot_path(&self, slot: &str) -> Result<PathBuf, CacheError> {
        let valid = !slot.is_empty()
            && !slot.starts_with('.')
            && slot
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(CacheError::InvalidSlot(slot.to_string()));
        }
        Ok(self.dir.join(format!("{slot}.json")))
    }
}

#[async_trait::async_trait]
impl ISlotStore for JsonFileSlotStore {
    async fn load(&self, slot: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(slot)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                path: path.display().to_string(),
                source,
            }
            .into()),
        }
    }

    async fn save(&self, slot: &str, payload: &str) -> anyhow::Result<()> {
        let path = self.slot_path(slot)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |p: &Path| {
            let p = p.display().to_string();
            move |source| CacheError::Io { path: p, source }
        };

        let mut file = tokio::fs::File::create(&tmp).await.map_err(io_err(&tmp))?;
        file.write_all(payload.as_bytes())
            .await
            .map_err(io_err(&tmp))?;
        file.sync_all().await.map_err(io_err(&tmp))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(io_err(&path))?;

        tracing::trace!(slot, path = %path.display(), "Saved slot");
        Ok(())
    }
}
