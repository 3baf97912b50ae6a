//! Database schema definitions.
//!
//! Records of every kind share one table; declared fields live in a JSON
//! column keyed by local field name. File contents are kept beside their
//! record in `attachments`.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the parsesync database.
///
/// Timestamps are stored as INTEGER (Unix milliseconds), matching the
/// millisecond precision Parse uses.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Records
-- ====================

-- One row per synced Parse object. object_id is the external id.
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    object_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    fields TEXT NOT NULL DEFAULT '{}',
    UNIQUE (kind, object_id)
);

CREATE INDEX IF NOT EXISTS idx_records_kind_updated ON records(kind, updated_at);

-- Attachments: at most one file per record field
CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL,
    field TEXT NOT NULL,
    name TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    data BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (record_id, field),
    FOREIGN KEY (record_id) REFERENCES records(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_attachments_hash ON attachments(content_hash);
";

/// Apply the schema to a database connection.
///
/// Sets the connection pragmas, creates missing tables and records the
/// schema version.
///
/// # Errors
///
/// Returns an error if a pragma or the schema fails to apply.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
