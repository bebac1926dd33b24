//! SQLite implementation of [`RecordStore`].
//!
//! rusqlite is blocking, so every query runs on `spawn_blocking` with a pooled
//! connection. Concurrent inserts are serialized by SQLite itself (WAL mode +
//! `busy_timeout`); there is no application-level lock.

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{Pool, RecordStore, StoreError};
use crate::record::{created_at_format, HttpMethod, TestRecord};

const SELECT_COLUMNS: &str = "id, method, url, request_headers_json, request_body_json,
    response_status, response_headers_json, response_body_json, response_time_ms,
    outcome_kind, error_message, created_at";

/// Record store backed by a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Pool) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || op(&pool)).await?
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: &TestRecord) -> Result<(), StoreError> {
        let request_headers = serde_json::to_string(&record.request_headers)?;
        let request_body = to_json_opt(record.request_body.as_ref())?;
        let response_headers = to_json_opt(record.response_headers.as_ref())?;
        let response_body = to_json_opt(record.response_body.as_ref())?;
        let response_time_ms = i64::try_from(record.response_time_ms).unwrap_or(i64::MAX);
        let id = record.id.to_string();
        let method = record.method.as_str().to_string();
        let url = record.url.clone();
        let status = record.response_status.map(i64::from);
        let outcome = record.outcome_kind.as_str();
        let error_message = record.error_message.clone();
        let created_at = created_at_format::format(&record.created_at);

        self.blocking(move |pool| {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO test_records (
                    id, method, url, request_headers_json, request_body_json,
                    response_status, response_headers_json, response_body_json,
                    response_time_ms, outcome_kind, error_message, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id,
                    method,
                    url,
                    request_headers,
                    request_body,
                    status,
                    response_headers,
                    response_body,
                    response_time_ms,
                    outcome,
                    error_message,
                    created_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<TestRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.blocking(move |pool| {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM test_records
                 ORDER BY created_at DESC, seq DESC LIMIT ?1"
            ))?;

            let rows = stmt
                .query_map(params![limit], StoredRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(StoredRow::into_record).collect()
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TestRecord>, StoreError> {
        let id = id.to_string();

        self.blocking(move |pool| {
            let conn = pool.get()?;
            let row = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM test_records WHERE id = ?1"),
                    params![id],
                    StoredRow::from_row,
                )
                .optional()?;

            row.map(StoredRow::into_record).transpose()
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.blocking(|pool| {
            let conn = pool.get()?;
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

fn to_json_opt<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>, StoreError> {
    value.map(serde_json::to_string).transpose().map_err(Into::into)
}

fn from_json_opt<T: serde::de::DeserializeOwned>(
    raw: Option<String>,
) -> Result<Option<T>, serde_json::Error> {
    raw.as_deref().map(serde_json::from_str).transpose()
}

/// Raw column values as read from SQLite, before decoding.
struct StoredRow {
    id: String,
    method: String,
    url: String,
    request_headers: String,
    request_body: Option<String>,
    response_status: Option<i64>,
    response_headers: Option<String>,
    response_body: Option<String>,
    response_time_ms: i64,
    outcome_kind: String,
    error_message: Option<String>,
    created_at: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            request_headers: row.get(3)?,
            request_body: row.get(4)?,
            response_status: row.get(5)?,
            response_headers: row.get(6)?,
            response_body: row.get(7)?,
            response_time_ms: row.get(8)?,
            outcome_kind: row.get(9)?,
            error_message: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<TestRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(format!("bad id: {e}")))?;
        let response_status = self
            .response_status
            .map(u16::try_from)
            .transpose()
            .map_err(|e| corrupt(format!("bad status: {e}")))?;
        let response_time_ms = u64::try_from(self.response_time_ms)
            .map_err(|e| corrupt(format!("bad response time: {e}")))?;
        let outcome_kind = self.outcome_kind.parse().map_err(corrupt)?;
        let created_at = created_at_format::parse(&self.created_at)
            .map_err(|e| corrupt(format!("bad created_at: {e}")))?;

        Ok(TestRecord {
            id,
            method: HttpMethod::parse(&self.method),
            url: self.url,
            request_headers: serde_json::from_str(&self.request_headers)?,
            request_body: from_json_opt(self.request_body)?,
            response_status,
            response_headers: from_json_opt(self.response_headers)?,
            response_body: from_json_opt(self.response_body)?,
            response_time_ms,
            outcome_kind,
            error_message: self.error_message,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Headers, OutcomeKind};
    use crate::storage::open_pool;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("records.db")).unwrap();
        (dir, SqliteStore::new(pool))
    }

    fn record(url: &str, offset_ms: i64) -> TestRecord {
        let mut headers = Headers::new();
        headers.insert("accept".into(), "application/json".into());
        TestRecord {
            id: Uuid::new_v4(),
            method: HttpMethod::Post,
            url: url.into(),
            request_headers: headers.clone(),
            request_body: Some(json!({"name": "widget"})),
            response_status: Some(201),
            response_headers: Some(headers),
            response_body: Some(json!({"id": 7})),
            response_time_ms: 42,
            outcome_kind: OutcomeKind::Success,
            error_message: None,
            created_at: Utc::now() + Duration::milliseconds(offset_ms),
        }
    }

    #[tokio::test]
    async fn test_insert_then_find_by_id() {
        let (_dir, store) = temp_store();
        let r = record("https://api.test/widgets", 0);

        store.insert(&r).await.unwrap();

        let found = store.find_by_id(r.id).await.unwrap().unwrap();
        assert_eq!(found.id, r.id);
        assert_eq!(found.method, HttpMethod::Post);
        assert_eq!(found.request_body, Some(json!({"name": "widget"})));
        assert_eq!(found.response_status, Some(201));
        assert_eq!(found.response_time_ms, 42);
        assert_eq!(
            created_at_format::format(&found.created_at),
            created_at_format::format(&r.created_at)
        );
    }

    #[tokio::test]
    async fn test_find_unknown_id_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recent_newest_first_and_capped() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            store.insert(&record(&format!("https://h/{i}"), i * 10)).await.unwrap();
        }

        let listed = store.list_recent(3).await.unwrap();
        let urls: Vec<_> = listed.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["https://h/4", "https://h/3", "https://h/2"]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_fall_back_to_insert_order() {
        let (_dir, store) = temp_store();
        let first = record("https://h/first", 0);
        let mut second = record("https://h/second", 0);
        second.created_at = first.created_at;

        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let listed = store.list_recent(10).await.unwrap();
        assert_eq!(listed[0].url, "https://h/second");
        assert_eq!(listed[1].url, "https://h/first");
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let (_dir, store) = temp_store();
        let r = record("https://h/dup", 0);
        store.insert(&r).await.unwrap();
        assert!(store.insert(&r).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_inserts() {
        let (_dir, store) = temp_store();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(&record(&format!("https://h/{i}"), i)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.list_recent(100).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_ping() {
        let (_dir, store) = temp_store();
        store.ping().await.unwrap();
    }
}
