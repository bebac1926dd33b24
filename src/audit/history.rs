//! Read-only queries over the audit trail.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::record::TestRecord;
use crate::storage::{RecordStore, StoreError};

/// Default cap for `list_recent`.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("test record '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn RecordStore>,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Most recent records first, at most `limit`.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<TestRecord>, HistoryError> {
        Ok(self.store.list_recent(limit).await?)
    }

    /// Look up one record. Ids that are not UUIDs can never match, so they are `NotFound` too.
    pub async fn get_by_id(&self, id: &str) -> Result<TestRecord, HistoryError> {
        let uuid = Uuid::parse_str(id).map_err(|_| HistoryError::NotFound(id.to_string()))?;
        self.store
            .find_by_id(uuid)
            .await?
            .ok_or_else(|| HistoryError::NotFound(id.to_string()))
    }

    /// Whether the backing store currently answers queries.
    pub async fn store_available(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}
