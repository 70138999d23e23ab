//! peaklog Cache - Local persistence slots
//!
//! Adapters for the `ISlotStore` port of `peaklog-core`. Each local
//! collection is stored verbatim, as one serialized payload per named slot.
//!
//! ## Key Components
//!
//! - [`SqliteSlotStore`] - All slots in one SQLite database ([`DatabasePool`])
//! - [`JsonFileSlotStore`] - One `<slot>.json` file per slot, written atomically
//! - [`MemorySlotStore`] - Process-local slots for tests and ephemeral use
//! - [`open_slot_store`] - Picks the adapter named by the storage configuration
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use peaklog_cache::{DatabasePool, SqliteSlotStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/peaklog/peaklog.db")).await?;
//! let slots = SqliteSlotStore::new(pool.pool().clone());
//! // Hand `slots` to the sync engine as an ISlotStore...
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod memory;
pub mod pool;
pub mod sqlite;

use std::sync::Arc;

use peaklog_core::config::{StorageBackend, StorageConfig};
use peaklog_core::ports::ISlotStore;

pub use file::JsonFileSlotStore;
pub use memory::MemorySlotStore;
pub use pool::DatabasePool;
pub use sqlite::SqliteSlotStore;

/// File name of the SQLite database inside the data directory
pub const DATABASE_FILE: &str = "peaklog.db";

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A slot file could not be read or written
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A slot name that cannot be used as a file name
    #[error("Invalid slot name: {0}")]
    InvalidSlot(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

/// Opens the slot store selected by `config`
///
/// Creates the data directory if needed.
pub async fn open_slot_store(config: &StorageConfig) -> Result<Arc<dyn ISlotStore>, CacheError> {
    match config.backend {
        StorageBackend::Json => {
            let store = JsonFileSlotStore::open(&config.data_dir).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::Sqlite => {
            let pool = DatabasePool::new(&config.data_dir.join(DATABASE_FILE)).await?;
            Ok(Arc::new(SqliteSlotStore::new(pool.pool().clone())))
        }
    }
}
