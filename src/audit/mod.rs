//! Audit trail: the single write path for test records, plus read-only history.
//!
//! The recorder is advisory. A failed write is logged and counted, never
//! propagated, so the reply computed for a caller does not depend on whether
//! the store was reachable.

pub mod history;

pub use self::history::{HistoryError, HistoryReader};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::record::TestRecord;
use crate::storage::RecordStore;

/// Owns the write path into the record store.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn RecordStore>,
    failures: Arc<AtomicU64>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Persist `record` once. Returns whether the write succeeded.
    pub async fn record(&self, record: TestRecord) -> bool {
        match self.store.insert(&record).await {
            Ok(()) => {
                debug!(
                    id = %record.id,
                    outcome = %record.outcome_kind,
                    "test record saved"
                );
                true
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    id = %record.id,
                    method = %record.method,
                    url = %record.url,
                    outcome = %record.outcome_kind,
                    error = %e,
                    "failed to persist test record"
                );
                false
            }
        }
    }

    /// Number of records that could not be persisted since startup.
    pub fn persistence_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::{Headers, HttpMethod, OutcomeKind};
    use crate::storage::StoreError;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// In-memory store that can be switched into an outage.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub records: Mutex<Vec<TestRecord>>,
        pub down: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl RecordStore for MemoryStore {
        async fn insert(&self, record: &TestRecord) -> Result<(), StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("simulated outage".into()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn list_recent(&self, limit: usize) -> Result<Vec<TestRecord>, StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("simulated outage".into()));
            }
            let records = self.records.lock().unwrap();
            Ok(records.iter().rev().take(limit).cloned().collect())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<TestRecord>, StoreError> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().find(|r| r.id == id).cloned())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("simulated outage".into()));
            }
            Ok(())
        }
    }

    pub(crate) fn sample(url: &str) -> TestRecord {
        TestRecord {
            id: Uuid::new_v4(),
            method: HttpMethod::Get,
            url: url.into(),
            request_headers: Headers::new(),
            request_body: None,
            response_status: Some(200),
            response_headers: Some(Headers::new()),
            response_body: Some(serde_json::json!("ok")),
            response_time_ms: 5,
            outcome_kind: OutcomeKind::Success,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_writes_once() {
        let store = Arc::new(MemoryStore::default());
        let recorder = AuditRecorder::new(store.clone());

        assert!(recorder.record(sample("http://a")).await);
        assert_eq!(store.records.lock().unwrap().len(), 1);
        assert_eq!(recorder.persistence_failures(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_is_counted_not_raised() {
        let store = Arc::new(MemoryStore::default());
        store.down.store(true, Ordering::SeqCst);
        let recorder = AuditRecorder::new(store.clone());

        assert!(!recorder.record(sample("http://a")).await);
        assert!(!recorder.record(sample("http://b")).await);
        assert_eq!(recorder.persistence_failures(), 2);
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_failure_counter() {
        let store = Arc::new(MemoryStore::default());
        store.down.store(true, Ordering::SeqCst);
        let recorder = AuditRecorder::new(store);
        let clone = recorder.clone();

        clone.record(sample("http://a")).await;
        assert_eq!(recorder.persistence_failures(), 1);
    }
}
