//! SQLite storage implementation
//!
//! `SqliteStorage` is both the record sink and the failure store for the
//! command-line crawler, and also keeps one row per crawl run.

use crate::crawler::{IndexRecord, RecordKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    FailureRecord, FailureStore, RecordSink, StorageError, StorageResult,
};
use crate::storage::{RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection sits behind a mutex so worker tasks can share one handle.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    /// Run that new records and failures are attributed to; 0 for none
    current_run: AtomicI64,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            current_run: AtomicI64::new(0),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run_id(&self) -> Option<i64> {
        match self.current_run.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        }
    }

    // ===== Run Management =====

    /// Creates a new crawl run and attributes later writes to it
    pub fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        let run_id = conn.last_insert_rowid();
        self.current_run.store(run_id, Ordering::Relaxed);
        Ok(run_id)
    }

    /// Marks a run finished with the given status
    pub fn complete_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Statistics =====

    pub fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_records_by_kind(&self) -> StorageResult<BTreeMap<String, u64>> {
        self.grouped_counts("SELECT kind, COUNT(*) FROM records GROUP BY kind")
    }

    pub fn count_records_by_channel(&self) -> StorageResult<BTreeMap<String, u64>> {
        self.grouped_counts("SELECT channel, COUNT(*) FROM records GROUP BY channel")
    }

    pub fn count_failures_by_classification(&self) -> StorageResult<BTreeMap<String, u64>> {
        self.grouped_counts("SELECT classification, COUNT(*) FROM failures GROUP BY classification")
    }

    fn grouped_counts(&self, query: &str) -> StorageResult<BTreeMap<String, u64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(query)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (key, count) = row?;
            counts.insert(key, count as u64);
        }
        Ok(counts)
    }

    /// Loads every stored record, oldest first
    pub fn load_records(&self) -> StorageResult<Vec<IndexRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT kind, title, body, timestamp_ms, user_name, channel, permalink, attachments, fields
             FROM records ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                IndexRecord {
                    kind: RecordKind::Message,
                    title: row.get(1)?,
                    text: row.get(2)?,
                    timestamp: row.get(3)?,
                    user: row.get(4)?,
                    channel: row.get(5)?,
                    permalink: row.get(6)?,
                    attachments: row.get(7)?,
                    fields: BTreeMap::new(),
                },
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (kind, mut record, fields) = row?;
            record.kind = RecordKind::from_db_string(&kind).unwrap_or(RecordKind::Message);
            record.fields = serde_json::from_str(&fields)?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn load_failures(&self) -> StorageResult<Vec<FailureRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT url, classification, message, root_cause FROM failures ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(FailureRecord {
                url: row.get(0)?,
                classification: row.get(1)?,
                message: row.get(2)?,
                root_cause: row.get(3)?,
            })
        })?;

        let mut failures = Vec::new();
        for row in rows {
            failures.push(row?);
        }
        Ok(failures)
    }
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

impl RecordSink for SqliteStorage {
    fn store(&self, record: &IndexRecord) -> StorageResult<()> {
        let fields = serde_json::to_string(&record.fields)?;
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO records
                (run_id, kind, permalink, channel, title, body, user_name, timestamp_ms, attachments, fields, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(permalink) DO UPDATE SET
                run_id = excluded.run_id,
                kind = excluded.kind,
                channel = excluded.channel,
                title = excluded.title,
                body = excluded.body,
                user_name = excluded.user_name,
                timestamp_ms = excluded.timestamp_ms,
                attachments = excluded.attachments,
                fields = excluded.fields,
                stored_at = excluded.stored_at",
            params![
                self.run_id(),
                record.kind.as_str(),
                record.permalink,
                record.channel,
                record.title,
                record.text,
                record.user,
                record.timestamp,
                record.attachments,
                fields,
                now
            ],
        )?;
        Ok(())
    }
}

impl FailureStore for SqliteStorage {
    fn record_failure(
        &self,
        url: &str,
        classification: &str,
        error: &HarvestError,
    ) -> StorageResult<()> {
        let failure = FailureRecord::from_error(url, classification, error);
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO failures (run_id, url, classification, message, root_cause, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.run_id(),
                failure.url,
                failure.classification,
                failure.message,
                failure.root_cause,
                now
            ],
        )?;
        Ok(())
    }
}
