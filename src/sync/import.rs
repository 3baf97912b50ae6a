//! Import of Parse objects into the local record store.
//!
//! An import walks every key of every remote object and translates it with
//! a rule picked by the value's shape. Problems with one item, one field or
//! one attachment are recorded in the [`ImportReport`] and the batch moves
//! on. Only configuration errors, an unreadable snapshot and failed remote
//! queries abort.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::model::{
    Attachment, FieldDef, FieldKind, FieldValue, Record, RecordKind, Registry, CREATED_AT_FIELD,
    OBJECT_ID_FIELD, UPDATED_AT_FIELD,
};
use crate::remote::{FileFetcher, Query, RemoteClient};
use crate::storage::sqlite::SqliteStorage;
use crate::sync::casing::to_snake_case;
use crate::sync::codec::{decode_date, decode_scalar, describe, parse_iso, TypedValue, TYPE_KEY};
use crate::sync::types::{ImportReport, SyncError, SyncResult};

/// Provider-internal keys that never map to a local field.
pub const IGNORED_KEYS: [&str; 5] = ["authData", "ACL", "_rperm", "_wperm", "sessionToken"];

/// Default page size for incremental pulls.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A downloaded file waiting for its record to be persisted.
struct PendingFile {
    field: String,
    attachment: Attachment,
}

/// Importer for Parse objects.
///
/// Records are written locally only; nothing is ever pushed back while
/// importing.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a Registry,
    fetcher: &'a dyn FileFetcher,
}

impl<'a> Importer<'a> {
    /// Create an importer writing to `storage` and downloading files through
    /// `fetcher`.
    #[must_use]
    pub fn new(
        storage: &'a mut SqliteStorage,
        registry: &'a Registry,
        fetcher: &'a dyn FileFetcher,
    ) -> Self {
        Self {
            storage,
            registry,
            fetcher,
        }
    }

    /// Import a snapshot file of the form `{"results": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotNotFound` or `InvalidSnapshot` if the file cannot be
    /// used, and `Configuration` if the kind does not sync. Per-item problems
    /// are reported, not returned.
    pub fn import_snapshot(&mut self, kind: &str, path: &Path) -> SyncResult<ImportReport> {
        let invalid = |message: String| SyncError::InvalidSnapshot {
            path: path.display().to_string(),
            message,
        };

        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::SnapshotNotFound(path.display().to_string())
            } else {
                SyncError::Io(e)
            }
        })?;
        let document: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        let items = document
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("expected an object with a 'results' array".to_string()))?;

        info!(kind, path = %path.display(), items = items.len(), "Importing snapshot");
        self.import_batch(kind, items)
    }

    /// Import a batch of remote objects of one kind.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the kind does not sync or an item points
    /// at a kind that does not sync.
    pub fn import_batch(&mut self, kind: &str, items: &[Value]) -> SyncResult<ImportReport> {
        let registry = self.registry;
        let record_kind = registry.require(kind)?;
        let mut report = ImportReport::new(&record_kind.name);

        for (index, item) in items.iter().enumerate() {
            self.import_item(record_kind, index, item, &mut report)?;
        }

        info!(
            kind = %record_kind.name,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            issues = report.issues.len(),
            "Import finished"
        );
        Ok(report)
    }

    /// Pull objects updated since the kind's latest local `updated_at`,
    /// one page at a time, until a short page comes back.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSync` if a query fails and `Configuration` for setup
    /// mistakes. Pages imported before a failure stay imported.
    pub fn pull(
        &mut self,
        kind: &str,
        client: &dyn RemoteClient,
        page_size: usize,
    ) -> SyncResult<ImportReport> {
        let registry = self.registry;
        let record_kind = registry.require(kind)?;
        let page_size = page_size.max(1);
        let cursor = self
            .storage
            .latest_updated_at(&record_kind.name)
            .map_err(|e| SyncError::Database(e.to_string()))?;

        let mut report = ImportReport::new(&record_kind.name);
        let mut page = 0;
        loop {
            let query = Query::updated_since(cursor.as_ref(), page_size, page);
            let results = client
                .query(record_kind.class_name(), &query)
                .map_err(|source| SyncError::RemoteSync {
                    kind: record_kind.name.clone(),
                    source,
                })?;
            let fetched = results.len();
            debug!(kind = %record_kind.name, page, fetched, "Fetched page");

            let items: Vec<Value> = results.into_iter().map(Value::Object).collect();
            let batch = self.import_batch(&record_kind.name, &items)?;
            report.merge(batch, page * page_size);

            if fetched < page_size {
                break;
            }
            page += 1;
        }

        Ok(report)
    }

    /// Import one item. Only fatal errors are returned.
    fn import_item(
        &mut self,
        kind: &RecordKind,
        index: usize,
        item: &Value,
        report: &mut ImportReport,
    ) -> SyncResult<()> {
        let Some(object) = item.as_object() else {
            report.record(
                index,
                None,
                &SyncError::MalformedRecord {
                    index,
                    reason: format!("expected an object, got {}", describe(item)),
                },
            );
            return Ok(());
        };
        let Some(object_id) = object.get("objectId").and_then(Value::as_str) else {
            report.record(
                index,
                None,
                &SyncError::MalformedRecord {
                    index,
                    reason: "missing 'objectId'".to_string(),
                },
            );
            return Ok(());
        };

        let existing = match self.storage.find_record(&kind.name, object_id) {
            Ok(existing) => existing,
            Err(e) => {
                report.record(index, Some(object_id), &persistence(kind, object_id, &e));
                return Ok(());
            }
        };
        let is_update = existing.is_some();
        let mut record = existing.unwrap_or_else(|| Record::new(kind).with_object_id(object_id));

        let mut pending = Vec::new();
        for (key, value) in object {
            if IGNORED_KEYS.contains(&key.as_str()) {
                debug!(kind = %kind.name, object_id, key = %key, "Ignoring provider-internal key");
                continue;
            }
            match self.apply_value(kind, &mut record, object, key, value, &mut pending) {
                Ok(()) => {}
                Err(e) if e.issue_kind().is_some() => {
                    debug!(kind = %kind.name, object_id, error = %e, "Field skipped");
                    report.record(index, Some(object_id), &e);
                }
                Err(e) => return Err(e),
            }
        }

        let record_id = match self.storage.save_record(&record) {
            Ok(id) => id,
            Err(e) => {
                warn!(kind = %kind.name, object_id, error = %e, "Failed to save record");
                report.record(index, Some(object_id), &persistence(kind, object_id, &e));
                return Ok(());
            }
        };
        if is_update {
            report.updated += 1;
        } else {
            report.created += 1;
        }

        // Files are bound only once the record has a local id
        for file in pending {
            match self
                .storage
                .bind_attachment(record_id, &file.field, &file.attachment)
            {
                Ok(()) => report.attachments += 1,
                Err(e) => report.record(
                    index,
                    Some(object_id),
                    &SyncError::AttachmentBind {
                        field: file.field,
                        name: file.attachment.name,
                        message: e.to_string(),
                    },
                ),
            }
        }

        Ok(())
    }

    /// Translate one remote key/value pair onto `record`.
    fn apply_value(
        &self,
        kind: &RecordKind,
        record: &mut Record,
        item: &Map<String, Value>,
        key: &str,
        value: &Value,
        pending: &mut Vec<PendingFile>,
    ) -> SyncResult<()> {
        let name = to_snake_case(key);
        match name.as_str() {
            // The external id never changes once set
            OBJECT_ID_FIELD => return Ok(()),
            CREATED_AT_FIELD => {
                record.created_at = decode_timestamp(&name, value)?;
                return Ok(());
            }
            UPDATED_AT_FIELD => {
                record.updated_at = decode_timestamp(&name, value)?;
                return Ok(());
            }
            _ => {}
        }

        let object = match value {
            Value::Object(object) => object,
            Value::Null => {
                let field = declared(kind, &name)?;
                record.clear(&field.name);
                return Ok(());
            }
            scalar => {
                let field = declared(kind, &name)?;
                let decoded = decode_scalar(&field.kind, scalar).ok_or_else(|| {
                    unsupported(
                        &field.name,
                        format!("{} for a {:?} field", describe(scalar), field.kind),
                    )
                })?;
                record.set(&field.name, decoded);
                return Ok(());
            }
        };

        match TypedValue::parse(object) {
            TypedValue::Date { iso } => {
                let field = declared(kind, &name)?;
                if !matches!(field.kind, FieldKind::Date | FieldKind::DateTime) {
                    return Err(unsupported(
                        &field.name,
                        format!("Date for a {:?} field", field.kind),
                    ));
                }
                let decoded = decode_date(&field.kind, iso)
                    .ok_or_else(|| unsupported(&field.name, format!("invalid date '{iso}'")))?;
                record.set(&field.name, decoded);
            }
            TypedValue::File { name: file_name, url } => {
                let field = declared(kind, &name)?;
                if !field.kind.is_file() {
                    return Err(unsupported(
                        &field.name,
                        format!("File for a {:?} field", field.kind),
                    ));
                }
                let Some(url) = url else {
                    debug!(field = %field.name, file = file_name, "File without url, skipped");
                    return Ok(());
                };
                let data = self.fetcher.fetch(url).map_err(|e| SyncError::AttachmentFetch {
                    field: field.name.clone(),
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
                pending.push(PendingFile {
                    field: field.name.clone(),
                    attachment: Attachment::new(file_name, data),
                });
            }
            TypedValue::Pointer {
                class_name,
                object_id,
            } => {
                let field = self.pointer_field(kind, &name, class_name, item)?;
                record.set(&field.name, FieldValue::Pointer(object_id.to_string()));
            }
            TypedValue::Unsupported { detail } => {
                // Untagged objects are opaque values for json fields
                if !object.contains_key(TYPE_KEY) {
                    if let Some(field) = kind.field(&name) {
                        if let Some(decoded) = decode_scalar(&field.kind, value) {
                            record.set(&field.name, decoded);
                            return Ok(());
                        }
                    }
                }
                return Err(unsupported(&name, detail));
            }
        }
        Ok(())
    }

    /// Find the pointer field a pointer lands in.
    ///
    /// A key that names a declared pointer field always lands there. An
    /// undeclared key falls back to the column derived from the target class
    /// (`Author` lands in `author_id`), unless the same item also carries that
    /// field under its own key. A key naming a declared non-pointer field is
    /// never redirected.
    fn pointer_field<'k>(
        &self,
        kind: &'k RecordKind,
        name: &str,
        class_name: &str,
        item: &Map<String, Value>,
    ) -> SyncResult<&'k FieldDef> {
        let field = match kind.field(name) {
            Some(field) if field.kind.pointer_target().is_some() => field,
            Some(field) => {
                return Err(unsupported(
                    &field.name,
                    format!("Pointer to {class_name} for a {:?} field", field.kind),
                ));
            }
            None => {
                let column = format!("{}_id", class_name.to_lowercase());
                let derived = kind
                    .field_by_column(&column)
                    .filter(|f| f.kind.pointer_target().is_some())
                    .ok_or_else(|| SyncError::UnknownField {
                        kind: kind.name.clone(),
                        field: name.to_string(),
                    })?;
                if item.contains_key(&derived.remote_name()) {
                    return Err(unsupported(
                        name,
                        format!("Pointer to {class_name} would overwrite '{}'", derived.name),
                    ));
                }
                derived
            }
        };

        if let Some(target) = field.kind.pointer_target() {
            let Some(target_kind) = self.registry.get(target) else {
                return Err(SyncError::Configuration(format!(
                    "{}.{} points to '{target}', which does not participate in sync",
                    kind.name, field.name
                )));
            };
            if target_kind.class_name() != class_name {
                return Err(unsupported(
                    &field.name,
                    format!("Pointer to {class_name}, expected {}", target_kind.class_name()),
                ));
            }
        }
        Ok(field)
    }
}

fn declared<'k>(kind: &'k RecordKind, name: &str) -> SyncResult<&'k FieldDef> {
    kind.field(name).ok_or_else(|| SyncError::UnknownField {
        kind: kind.name.clone(),
        field: name.to_string(),
    })
}

fn unsupported(field: &str, detail: String) -> SyncError {
    SyncError::UnsupportedValue {
        field: field.to_string(),
        detail,
    }
}

fn persistence(kind: &RecordKind, object_id: &str, err: &crate::error::Error) -> SyncError {
    SyncError::LocalPersistence {
        kind: kind.name.clone(),
        object_id: object_id.to_string(),
        message: err.to_string(),
    }
}

/// System timestamps arrive as plain ISO strings or as `Date` shapes.
fn decode_timestamp(field: &str, value: &Value) -> SyncResult<DateTime<Utc>> {
    let iso = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(object) => match TypedValue::parse(object) {
            TypedValue::Date { iso } => Some(iso),
            _ => None,
        },
        _ => None,
    };
    iso.and_then(parse_iso)
        .ok_or_else(|| unsupported(field, format!("invalid timestamp {}", describe(value))))
}
