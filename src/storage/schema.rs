//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Slack-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Indexed records, one per permalink; a re-crawl replaces the previous row
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER REFERENCES runs(id),
    kind TEXT NOT NULL,
    permalink TEXT NOT NULL UNIQUE,
    channel TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    user_name TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    attachments TEXT NOT NULL,
    fields TEXT NOT NULL,
    stored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_channel ON records(channel);
CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);

-- Items that could not be processed
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER REFERENCES runs(id),
    url TEXT NOT NULL,
    classification TEXT NOT NULL,
    message TEXT NOT NULL,
    root_cause TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failures_classification ON failures(classification);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
