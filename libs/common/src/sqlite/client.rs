//! Pooled SQLite access for the sync stores
//!
//! `SqliteClient` wraps a sqlx pool with the pragmas the services rely on:
//! WAL journaling so the owning process can keep writing while we read, a
//! busy timeout instead of immediate `SQLITE_BUSY` failures, and bounded
//! pool sizes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

pub type SqlitePool = sqlx::SqlitePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to one SQLite database file.
///
/// Cloning is cheap; all clones use the same pool.
#[derive(Clone)]
pub struct SqliteClient {
    pool: Arc<SqlitePool>,
    path: String,
}

impl SqliteClient {
    /// Open a database read-write, creating the file and its parent
    /// directory when missing.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        // Negative cache_size means KB
        sqlx::query("PRAGMA cache_size = -2000")
            .execute(&pool)
            .await?;

        let client = Self::wrap(pool, path);
        info!("SQLite database opened: {}", client.path);
        Ok(client)
    }

    /// Open a database owned by another process, read-only.
    ///
    /// The file must already exist; a sync service never creates its source.
    pub async fn new_readonly(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("database file not found: {}", path.display());
        }

        // WAL plus the busy timeout: the owner keeps writing while we read
        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let client = Self::wrap(pool, path);
        info!("SQLite database opened read-only: {}", client.path);
        Ok(client)
    }

    fn wrap(pool: SqlitePool, path: &Path) -> Self {
        Self {
            pool: Arc::new(pool),
            path: path.display().to_string(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Database file path as given at open time.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Round-trip a trivial query, for startup connectivity checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.pool).await?;
        Ok(())
    }
}
