//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS test_records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            method TEXT NOT NULL,
            url TEXT NOT NULL,
            request_headers_json TEXT NOT NULL DEFAULT '{}',
            request_body_json TEXT,
            response_status INTEGER,
            response_headers_json TEXT,
            response_body_json TEXT,
            response_time_ms INTEGER NOT NULL CHECK (response_time_ms >= 0),
            outcome_kind TEXT NOT NULL,
            error_message TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_test_records_created ON test_records(created_at);

        CREATE TRIGGER IF NOT EXISTS test_records_no_update
        BEFORE UPDATE ON test_records
        BEGIN
            SELECT RAISE(ABORT, 'test_records is append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS test_records_no_delete
        BEFORE DELETE ON test_records
        BEGIN
            SELECT RAISE(ABORT, 'test_records is append-only');
        END;

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);",
    )?;

    Ok(())
}
