//! SQLite storage implementation.
//!
//! This module provides the local record store for parsesync. Writes go
//! through [`SqliteStorage::mutate`], which wraps them in an IMMEDIATE
//! transaction.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::{Attachment, FieldValue, Record};
use crate::storage::schema::apply_schema;

/// SQLite-based record store.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Per-kind counts used by `parsesync status`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct KindCounts {
    /// Number of records.
    pub records: usize,
    /// Number of stored attachments.
    pub attachments: usize,
    /// Latest `updated_at` among the kind's records.
    pub latest_updated_at: Option<DateTime<Utc>>,
}

fn to_millis(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Serialize the non-file fields of a record for the `fields` column.
fn encode_fields(record: &Record) -> Result<String> {
    let fields: BTreeMap<&str, &FieldValue> = record
        .fields()
        .filter(|(_, value)| !matches!(value, FieldValue::File(_)))
        .collect();
    Ok(serde_json::to_string(&fields)?)
}

fn upsert_attachment(
    tx: &Transaction,
    record_id: i64,
    field: &str,
    attachment: &Attachment,
) -> Result<()> {
    tx.execute(
        "INSERT INTO attachments (record_id, field, name, content_hash, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(record_id, field) DO UPDATE SET
           name = excluded.name,
           content_hash = excluded.content_hash,
           data = excluded.data",
        rusqlite::params![
            record_id,
            field,
            attachment.name,
            attachment.content_hash(),
            attachment.data,
            Utc::now().timestamp_millis(),
        ],
    )?;
    Ok(())
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a write inside an IMMEDIATE transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        trace!(op, "committed");
        Ok(result)
    }

    // ==================
    // Record Operations
    // ==================

    /// Find a record of `kind` by external id, attachments included.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored fields are corrupt.
    pub fn find_record(&self, kind: &str, object_id: &str) -> Result<Option<Record>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, object_id, created_at, updated_at, fields
                 FROM records WHERE kind = ?1 AND object_id = ?2",
                rusqlite::params![kind, object_id],
                map_record_row,
            )
            .optional()?;

        row.map(|row| self.load_record(kind, row)).transpose()
    }

    /// All records of a kind, oldest local row first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored fields are corrupt.
    pub fn list_records(&self, kind: &str) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, object_id, created_at, updated_at, fields
             FROM records WHERE kind = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([kind], map_record_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| self.load_record(kind, row))
            .collect()
    }

    fn load_record(&self, kind: &str, row: RecordRow) -> Result<Record> {
        let mut fields: BTreeMap<String, FieldValue> = serde_json::from_str(&row.fields)?;

        let mut stmt = self
            .conn
            .prepare("SELECT field, name, data FROM attachments WHERE record_id = ?1")?;
        let attachments = stmt.query_map([row.id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, Vec<u8>>(2)?))
        })?;
        for attachment in attachments {
            let (field, name, data) = attachment?;
            fields.insert(field, FieldValue::File(Attachment::new(&name, data)));
        }

        Ok(Record::from_stored(
            kind,
            row.id,
            row.object_id,
            from_millis(row.created_at),
            from_millis(row.updated_at),
            fields,
        ))
    }

    /// Insert or update a record by `(kind, object_id)`.
    ///
    /// File values are written to `attachments`; attachments of fields the
    /// record no longer holds a file for are removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if the record has no external id, or
    /// an error if the write fails.
    pub fn save_record(&mut self, record: &Record) -> Result<i64> {
        let object_id = record.object_id().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "cannot store a {} record without an object id",
                record.kind()
            ))
        })?;
        let fields = encode_fields(record)?;

        let record_id = self.mutate("save_record", |tx| {
            let record_id: i64 = tx.query_row(
                "INSERT INTO records (kind, object_id, created_at, updated_at, fields)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(kind, object_id) DO UPDATE SET
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at,
                   fields = excluded.fields
                 RETURNING id",
                rusqlite::params![
                    record.kind(),
                    object_id,
                    to_millis(&record.created_at),
                    to_millis(&record.updated_at),
                    fields,
                ],
                |row| row.get(0),
            )?;

            let mut kept = Vec::new();
            for (field, value) in record.fields() {
                if let FieldValue::File(attachment) = value {
                    upsert_attachment(tx, record_id, field, attachment)?;
                    kept.push(field.to_string());
                }
            }

            let mut stmt = tx.prepare("SELECT field FROM attachments WHERE record_id = ?1")?;
            let stored = stmt
                .query_map([record_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for field in stored.iter().filter(|f| !kept.contains(f)) {
                tx.execute(
                    "DELETE FROM attachments WHERE record_id = ?1 AND field = ?2",
                    rusqlite::params![record_id, field],
                )?;
            }

            Ok(record_id)
        })?;

        debug!(kind = record.kind(), object_id, record_id, "Saved record");
        Ok(record_id)
    }

    /// Bind file content to a field of an already stored record.
    ///
    /// # Errors
    ///
    /// Returns `Error::RecordNotFound` if no record has `record_id`, or an
    /// error if the write fails.
    pub fn bind_attachment(
        &mut self,
        record_id: i64,
        field: &str,
        attachment: &Attachment,
    ) -> Result<()> {
        self.mutate("bind_attachment", |tx| {
            let exists = tx
                .query_row("SELECT 1 FROM records WHERE id = ?1", [record_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Err(Error::RecordNotFound {
                    kind: "record".to_string(),
                    object_id: record_id.to_string(),
                });
            }
            upsert_attachment(tx, record_id, field, attachment)
        })
    }

    /// Delete a record and its attachments.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_record(&mut self, kind: &str, object_id: &str) -> Result<bool> {
        let removed = self.mutate("delete_record", |tx| {
            Ok(tx.execute(
                "DELETE FROM records WHERE kind = ?1 AND object_id = ?2",
                rusqlite::params![kind, object_id],
            )?)
        })?;
        Ok(removed > 0)
    }

    /// Number of records of a kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self, kind: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE kind = ?1",
            [kind],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Number of attachments held by records of a kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_attachments(&self, kind: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attachments a JOIN records r ON r.id = a.record_id
             WHERE r.kind = ?1",
            [kind],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Latest `updated_at` of a kind; the cursor for incremental pulls.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn latest_updated_at(&self, kind: &str) -> Result<Option<DateTime<Utc>>> {
        let ms: Option<i64> = self.conn.query_row(
            "SELECT MAX(updated_at) FROM records WHERE kind = ?1",
            [kind],
            |row| row.get(0),
        )?;
        Ok(ms.map(from_millis))
    }

    /// Counts for the status report.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn kind_counts(&self, kind: &str) -> Result<KindCounts> {
        Ok(KindCounts {
            records: self.count_records(kind)?,
            attachments: self.count_attachments(kind)?,
            latest_updated_at: self.latest_updated_at(kind)?,
        })
    }
}

struct RecordRow {
    id: i64,
    object_id: String,
    created_at: i64,
    updated_at: i64,
    fields: String,
}

fn map_record_row(row: &rusqlite::Row) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        object_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        fields: row.get(4)?,
    })
}
