//! SQLite storage layer -- pool, schema, and the append-only record store.

pub mod schema;
mod sqlite;

pub use self::sqlite::SqliteStore;

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;
use uuid::Uuid;

use crate::record::TestRecord;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory: {}", parent.display()))?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)
        .with_context(|| format!("failed to open database: {}", path.display()))?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// Backend outage reported by a `RecordStore` adapter that is not
    /// SQLite-backed (a remote or in-memory store).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow adapter over the durable record store.
///
/// Records are only ever inserted; there is no update or delete path.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Append one completed record.
    async fn insert(&self, record: &TestRecord) -> Result<(), StoreError>;

    /// Newest records first, at most `limit` of them.
    async fn list_recent(&self, limit: usize) -> Result<Vec<TestRecord>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TestRecord>, StoreError>;

    /// Cheap liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
