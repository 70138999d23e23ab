//! SQLite slot store
//!
//! Every slot is one row of the `slots` table, replaced as a whole on save.

use chrono::Utc;
use peaklog_core::ports::ISlotStore;
use sqlx::SqlitePool;

/// SQLite-backed implementation of [`ISlotStore`]
#[derive(Clone)]
pub struct SqliteSlotStore {
    pool: SqlitePool,
}

impl SqliteSlotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Last time `slot` was saved (RFC 3339), if ever
    pub async fn updated_at(&self, slot: &str) -> anyhow::Result<Option<String>> {
        let updated_at: Option<String> =
            sqlx::query_scalar("SELECT updated_at FROM slots WHERE name = ?")
                .bind(slot)
                .fetch_optional(&self.pool)
                .await?;
        Ok(updated_at)
    }

    /// Names of every saved slot, sorted
    pub async fn slot_names(&self) -> anyhow::Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM slots ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

#[async_trait::async_trait]
impl ISlotStore for SqliteSlotStore {
    async fn load(&self, slot: &str) -> anyhow::Result<Option<String>> {
        let payload: Option<String> = sqlx::query_scalar("SELECT payload FROM slots WHERE name = ?")
            .bind(slot)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payload)
    }

    async fn save(&self, slot: &str, payload: &str) -> anyhow::Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO slots (name, payload, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
             payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(slot)
        .bind(payload)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        tracing::trace!(slot, bytes = payload.len(), "Saved slot");
        Ok(())
    }
}
