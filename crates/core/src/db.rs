// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed local store.
//!
//! The [`Database`] struct implements [`LocalStore`] for the pending queue,
//! the failed queue, and the entity collections.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

use crate::entity::EntityKind;
use crate::error::{Error, Result};
use crate::method::Method;
use crate::record::{Record, RecordId, TempId};
use crate::request::{FailedRequest, QueuedRequest, RequestTarget};
use crate::store::LocalStore;

/// SQL schema for the local store.
pub const SCHEMA: &str = r#"
-- Remote mutations awaiting confirmation, in insertion order
CREATE TABLE IF NOT EXISTS sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    payload TEXT NOT NULL
);

-- Mutations quarantined after a failed replay
CREATE TABLE IF NOT EXISTS failed_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    payload TEXT NOT NULL,
    error TEXT NOT NULL,
    failed_at TEXT NOT NULL
);

-- Entity records; temporary and permanent ids live in separate key spaces
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    record_key TEXT NOT NULL,
    temporary INTEGER NOT NULL DEFAULT 0,
    body TEXT NOT NULL,
    UNIQUE (collection, record_key, temporary)
);

CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
"#;

/// Run schema creation and all migrations on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    migrate_add_target_columns(conn)?;
    Ok(())
}

/// Migration: add the request target column to both queues.
///
/// Queues written before requests were tagged lack it; their entries fall
/// back to URL inference.
fn migrate_add_target_columns(conn: &Connection) -> Result<()> {
    for table in ["sync_queue", "failed_requests"] {
        let has_column: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = 'target'",
                [table],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_column {
            let sql = format!("ALTER TABLE {table} ADD COLUMN target TEXT");
            conn.execute(&sql, [])?;
        }
    }
    Ok(())
}

fn corrupted(column: &str, detail: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(format!(
            "invalid value in column '{column}': {detail}"
        ))),
    )
}

fn parse_method(value: &str) -> std::result::Result<Method, rusqlite::Error> {
    value.parse().map_err(|_| corrupted("method", value))
}

fn parse_json(value: &str, column: &str) -> std::result::Result<Value, rusqlite::Error> {
    serde_json::from_str(value).map_err(|e| corrupted(column, e))
}

fn parse_target(
    value: Option<String>,
) -> std::result::Result<Option<RequestTarget>, rusqlite::Error> {
    match value {
        None => Ok(None),
        Some(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| corrupted("target", e)),
    }
}

fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupted(column, value))
}

fn encode_target(target: &Option<RequestTarget>) -> Result<Option<String>> {
    Ok(match target {
        Some(t) => Some(serde_json::to_string(t)?),
        None => None,
    })
}

/// Splits a record id into its storage key and temporary flag.
fn record_key(id: &RecordId) -> (String, bool) {
    match id {
        RecordId::Temporary(t) => (t.0.to_string(), true),
        RecordId::Permanent(p) => (p.clone(), false),
    }
}

fn decode_record_id(
    key: String,
    temporary: bool,
) -> std::result::Result<RecordId, rusqlite::Error> {
    if temporary {
        key.parse::<u64>()
            .map(|n| RecordId::Temporary(TempId(n)))
            .map_err(|_| corrupted("record_key", &key))
    } else {
        Ok(RecordId::Permanent(key))
    }
}

fn row_to_queued(row: &rusqlite::Row) -> std::result::Result<QueuedRequest, rusqlite::Error> {
    let method: String = row.get(2)?;
    let payload: String = row.get(3)?;
    Ok(QueuedRequest {
        id: Some(row.get(0)?),
        url: row.get(1)?,
        method: parse_method(&method)?,
        payload: parse_json(&payload, "payload")?,
        target: parse_target(row.get(4)?)?,
    })
}

fn row_to_failed(row: &rusqlite::Row) -> std::result::Result<FailedRequest, rusqlite::Error> {
    let method: String = row.get(2)?;
    let payload: String = row.get(3)?;
    let failed_at: String = row.get(6)?;
    Ok(FailedRequest {
        id: Some(row.get(0)?),
        url: row.get(1)?,
        method: parse_method(&method)?,
        payload: parse_json(&payload, "payload")?,
        target: parse_target(row.get(4)?)?,
        error: row.get(5)?,
        timestamp: parse_timestamp(&failed_at, "failed_at")?,
    })
}

fn row_to_record(row: &rusqlite::Row) -> std::result::Result<Record, rusqlite::Error> {
    let key: String = row.get(0)?;
    let temporary: bool = row.get(1)?;
    let body: String = row.get(2)?;
    Ok(Record {
        id: decode_record_id(key, temporary)?,
        body: parse_json(&body, "body")?,
    })
}

const QUEUE_COLUMNS: &str = "id, url, method, payload, target";
const FAILED_COLUMNS: &str = "id, url, method, payload, target, error, failed_at";

/// SQLite database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }
}

impl LocalStore for Database {
    // Savepoints rather than BEGIN, so transactions nest.
    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("SAVEPOINT tally_tx")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("RELEASE tally_tx")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK TO tally_tx; RELEASE tally_tx")?;
        Ok(())
    }

    fn add_pending(&mut self, request: &QueuedRequest) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_queue (url, method, payload, target) VALUES (?1, ?2, ?3, ?4)",
            params![
                request.url,
                request.method.as_str(),
                serde_json::to_string(&request.payload)?,
                encode_target(&request.target)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_pending(&mut self, request: &QueuedRequest) -> Result<()> {
        let id = request
            .id
            .ok_or_else(|| Error::InvalidInput("cannot update an unpersisted request".into()))?;
        let changed = self.conn.execute(
            "UPDATE sync_queue SET url = ?1, method = ?2, payload = ?3, target = ?4 WHERE id = ?5",
            params![
                request.url,
                request.method.as_str(),
                serde_json::to_string(&request.payload)?,
                encode_target(&request.target)?,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::RequestNotFound(id));
        }
        Ok(())
    }

    fn get_pending(&self, id: i64) -> Result<Option<QueuedRequest>> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE id = ?1");
        let request = self
            .conn
            .query_row(&sql, params![id], row_to_queued)
            .optional()?;
        Ok(request)
    }

    fn all_pending(&self) -> Result<Vec<QueuedRequest>> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let requests = stmt
            .query_map([], row_to_queued)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    fn delete_pending(&mut self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn clear_pending(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM sync_queue", [])?;
        Ok(())
    }

    fn count_pending(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn add_failed(&mut self, request: &FailedRequest) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO failed_requests (url, method, payload, target, error, failed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.url,
                request.method.as_str(),
                serde_json::to_string(&request.payload)?,
                encode_target(&request.target)?,
                request.error,
                request.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_failed(&self, id: i64) -> Result<Option<FailedRequest>> {
        let sql = format!("SELECT {FAILED_COLUMNS} FROM failed_requests WHERE id = ?1");
        let request = self
            .conn
            .query_row(&sql, params![id], row_to_failed)
            .optional()?;
        Ok(request)
    }

    fn all_failed(&self) -> Result<Vec<FailedRequest>> {
        let sql = format!("SELECT {FAILED_COLUMNS} FROM failed_requests ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let requests = stmt
            .query_map([], row_to_failed)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    fn delete_failed(&mut self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM failed_requests WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn clear_failed(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM failed_requests", [])?;
        Ok(())
    }

    fn count_failed(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM failed_requests", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn add_record(&mut self, entity: EntityKind, record: &Record) -> Result<()> {
        let (key, temporary) = record_key(&record.id);
        self.conn.execute(
            "INSERT INTO records (collection, record_key, temporary, body) VALUES (?1, ?2, ?3, ?4)",
            params![
                entity.collection(),
                key,
                temporary,
                serde_json::to_string(&record.body)?,
            ],
        )?;
        Ok(())
    }

    fn update_record(&mut self, entity: EntityKind, record: &Record) -> Result<()> {
        let (key, temporary) = record_key(&record.id);
        let changed = self.conn.execute(
            "UPDATE records SET body = ?1
             WHERE collection = ?2 AND record_key = ?3 AND temporary = ?4",
            params![
                serde_json::to_string(&record.body)?,
                entity.collection(),
                key,
                temporary,
            ],
        )?;
        if changed == 0 {
            return Err(Error::RecordNotFound {
                collection: entity.collection().to_string(),
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    fn get_record(&self, entity: EntityKind, id: &RecordId) -> Result<Option<Record>> {
        let (key, temporary) = record_key(id);
        let record = self
            .conn
            .query_row(
                "SELECT record_key, temporary, body FROM records
                 WHERE collection = ?1 AND record_key = ?2 AND temporary = ?3",
                params![entity.collection(), key, temporary],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn all_records(&self, entity: EntityKind) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_key, temporary, body FROM records
             WHERE collection = ?1 ORDER BY seq",
        )?;
        let records = stmt
            .query_map(params![entity.collection()], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn delete_record(&mut self, entity: EntityKind, id: &RecordId) -> Result<bool> {
        let (key, temporary) = record_key(id);
        let changed = self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND record_key = ?2 AND temporary = ?3",
            params![entity.collection(), key, temporary],
        )?;
        Ok(changed > 0)
    }

    fn clear_records(&mut self, entity: EntityKind) -> Result<()> {
        self.conn.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![entity.collection()],
        )?;
        Ok(())
    }

    fn count_records(&self, entity: EntityKind) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![entity.collection()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
