//! SQLite connection pool for the slot database
//!
//! [`DatabasePool`] opens (or creates) the database, switches it to WAL and
//! brings the schema up to date. Migrations are recorded in
//! `schema_migrations` and each one runs at most once per database.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Ordered schema migrations: (version, SQL)
const MIGRATIONS: &[(&str, &str)] = &[(
    "20261016_initial",
    include_str!("migrations/20261016_initial.sql"),
)];

/// Pool of SQLite connections to peaklog's slot database
///
/// File databases get two connections (SQLite allows a single writer);
/// in-memory databases get one, since every connection would otherwise see
/// its own empty database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database at `db_path`, creating it and its parent
    /// directories if needed
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the file cannot be opened,
    /// `CacheError::MigrationFailed` if the schema cannot be brought up to date.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CacheError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {e}", db_path.display()))
            })?;

        let db = Self { pool };
        let applied = db.migrate().await?;
        tracing::info!(path = %db_path.display(), applied, "Slot database opened");
        Ok(db)
    }

    /// Opens a private in-memory database (for tests)
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Versions of the migrations applied so far, oldest first
    pub async fn applied_migrations(&self) -> Result<Vec<String>, CacheError> {
        let versions: Vec<String> =
            sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
                .fetch_all(&self.pool)
                .await?;
        Ok(versions)
    }

    /// Applies pending migrations; returns how many ran
    async fn migrate(&self) -> Result<usize, CacheError> {
        let fail = |version: &str, e: sqlx::Error| {
            CacheError::MigrationFailed(format!("{version}: {e}"))
        };

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version TEXT PRIMARY KEY NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| fail("schema_migrations", e))?;

        let applied = self.applied_migrations().await?;
        let mut count = 0;
        for (version, sql) in MIGRATIONS {
            if applied.iter().any(|v| v == version) {
                continue;
            }
            let mut tx = self.pool.begin().await.map_err(|e| fail(version, e))?;
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| fail(version, e))?;
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(*version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await
                .map_err(|e| fail(version, e))?;
            tx.commit().await.map_err(|e| fail(version, e))?;

            tracing::debug!(version, "Migration applied");
            count += 1;
        }
        Ok(count)
    }
}
