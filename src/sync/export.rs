//! Export of local records to Parse.
//!
//! Saving is explicit and split in steps: [`Exporter::build_payload`] turns a
//! record into the JSON body, [`Exporter::sync_remote`] creates or updates
//! the remote object, and [`Exporter::save_local`] writes the result to the
//! local store. [`Exporter::save`] runs all three.

use tracing::{debug, info, warn};

use crate::model::{FieldKind, FieldValue, Record, RecordKind, Registry};
use crate::remote::{Payload, RemoteClient, RemoteError};
use crate::storage::sqlite::SqliteStorage;
use crate::sync::codec::{encode_date, encode_date_time, encode_file, encode_pointer};
use crate::sync::types::{PushFailure, PushReport, SyncError, SyncOutcome, SyncResult};

/// Exporter for local records.
pub struct Exporter<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a Registry,
    client: &'a dyn RemoteClient,
}

impl<'a> Exporter<'a> {
    /// Create an exporter pushing through `client`.
    #[must_use]
    pub fn new(
        storage: &'a mut SqliteStorage,
        registry: &'a Registry,
        client: &'a dyn RemoteClient,
    ) -> Self {
        Self {
            storage,
            registry,
            client,
        }
    }

    fn kind_of(&self, record: &Record) -> SyncResult<&'a RecordKind> {
        let registry = self.registry;
        registry.require(record.kind())
    }

    /// Build the create/update body for a record.
    ///
    /// System fields and `one_to_one` fields are never sent, and absent
    /// values are omitted rather than sent as null. File values are uploaded
    /// here, under their content-addressed name.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the kind does not sync or a foreign key
    /// targets a kind that does not, and `RemoteSync` if an upload fails.
    pub fn build_payload(&self, record: &Record) -> SyncResult<Payload> {
        let kind = self.kind_of(record)?;
        let mut payload = Payload::new();

        for field in &kind.fields {
            if matches!(field.kind, FieldKind::OneToOne { .. }) {
                continue;
            }
            let Some(value) = record.get(&field.name) else {
                continue;
            };

            let encoded = match (&field.kind, value) {
                (_, FieldValue::Date(date)) => encode_date(*date),
                (_, FieldValue::DateTime(at)) => encode_date_time(at),
                (_, FieldValue::File(attachment)) => {
                    let name = attachment.upload_name();
                    let uploaded = self
                        .client
                        .upload_file(&name, &attachment.data)
                        .map_err(|source| SyncError::RemoteSync {
                            kind: kind.name.clone(),
                            source,
                        })?;
                    debug!(field = %field.name, name = %uploaded.name, "Uploaded file");
                    encode_file(&uploaded.name)
                }
                (FieldKind::ForeignKey { target }, FieldValue::Pointer(object_id)) => {
                    let target_kind = self.registry.get(target).ok_or_else(|| {
                        SyncError::Configuration(format!(
                            "{}.{} points to '{target}', which does not participate in sync",
                            kind.name, field.name
                        ))
                    })?;
                    encode_pointer(target_kind.class_name(), object_id)
                }
                (_, FieldValue::Pointer(_)) => {
                    return Err(SyncError::Configuration(format!(
                        "{}.{} holds a pointer but is not a foreign key",
                        kind.name, field.name
                    )));
                }
                (_, scalar) => {
                    let Some(plain) = scalar.to_plain_json() else {
                        warn!(kind = %kind.name, field = %field.name, "Value has no JSON form, omitted");
                        continue;
                    };
                    plain
                }
            };
            payload.insert(field.remote_name(), encoded);
        }

        Ok(payload)
    }

    /// Create or update the remote object for a record.
    ///
    /// A new record is created. An existing one is updated; if Parse no
    /// longer knows its id, a fresh object is created, the local row of the
    /// stale id is removed and the stale remote object is deleted on a
    /// best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSync` for any remote failure other than a stale id.
    pub fn sync_remote(&mut self, record: &mut Record, payload: &Payload) -> SyncResult<SyncOutcome> {
        let kind = self.kind_of(record)?;
        let class_name = kind.class_name();
        let remote_err = |source: RemoteError| SyncError::RemoteSync {
            kind: kind.name.clone(),
            source,
        };

        let Some(object_id) = record.object_id().map(String::from) else {
            let created = self.client.create(class_name, payload).map_err(remote_err)?;
            record.bind_remote(created.object_id.clone(), created.created_at);
            info!(kind = %kind.name, object_id = %created.object_id, "Created remote object");
            return Ok(SyncOutcome::Created {
                object_id: created.object_id,
            });
        };

        match self.client.update(class_name, &object_id, payload) {
            Ok(updated) => {
                record.updated_at = updated.updated_at;
                debug!(kind = %kind.name, object_id = %object_id, "Updated remote object");
                Ok(SyncOutcome::Updated { object_id })
            }
            Err(RemoteError::ObjectNotFound { .. }) => {
                warn!(kind = %kind.name, object_id = %object_id, "Remote object is gone, re-creating");
                let created = self.client.create(class_name, payload).map_err(remote_err)?;

                record.detach();
                record.bind_remote(created.object_id.clone(), created.created_at);
                self.storage
                    .delete_record(&kind.name, &object_id)
                    .map_err(|e| SyncError::LocalPersistence {
                        kind: kind.name.clone(),
                        object_id: object_id.clone(),
                        message: e.to_string(),
                    })?;
                if let Err(e) = self.client.delete(class_name, &object_id) {
                    debug!(kind = %kind.name, object_id = %object_id, error = %e, "Stale remote delete failed");
                }

                info!(
                    kind = %kind.name,
                    stale_id = %object_id,
                    object_id = %created.object_id,
                    "Re-created remote object"
                );
                Ok(SyncOutcome::Recreated {
                    stale_id: object_id,
                    object_id: created.object_id,
                })
            }
            Err(e) => Err(remote_err(e)),
        }
    }

    /// Write a record to the local store only.
    ///
    /// # Errors
    ///
    /// Returns `LocalPersistence` if the store rejects the record, including
    /// a record that was never created remotely.
    pub fn save_local(&mut self, record: &mut Record) -> SyncResult<i64> {
        let local_id = self
            .storage
            .save_record(record)
            .map_err(|e| SyncError::LocalPersistence {
                kind: record.kind().to_string(),
                object_id: record.object_id().unwrap_or_default().to_string(),
                message: e.to_string(),
            })?;
        record.set_local_id(local_id);
        Ok(local_id)
    }

    /// Push a record to Parse, then store it locally.
    ///
    /// # Errors
    ///
    /// See [`Self::build_payload`], [`Self::sync_remote`] and
    /// [`Self::save_local`].
    pub fn save(&mut self, record: &mut Record) -> SyncResult<SyncOutcome> {
        let payload = self.build_payload(record)?;
        let outcome = self.sync_remote(record, &payload)?;
        self.save_local(record)?;
        Ok(outcome)
    }

    /// Delete a record locally, then remotely on a best-effort basis.
    ///
    /// Returns whether a local row was removed.
    ///
    /// # Errors
    ///
    /// Returns `LocalPersistence` if the local delete fails.
    pub fn delete(&mut self, record: &Record) -> SyncResult<bool> {
        let kind = self.kind_of(record)?;
        let Some(object_id) = record.object_id() else {
            return Ok(false);
        };

        let removed = self
            .storage
            .delete_record(&kind.name, object_id)
            .map_err(|e| SyncError::LocalPersistence {
                kind: kind.name.clone(),
                object_id: object_id.to_string(),
                message: e.to_string(),
            })?;

        if let Err(e) = self.client.delete(kind.class_name(), object_id) {
            warn!(kind = %kind.name, object_id, error = %e, "Remote delete failed");
        }
        Ok(removed)
    }

    /// Save every local record of a kind.
    ///
    /// A remote failure for one record is collected and the others still go
    /// out.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for setup mistakes and `Database` if the
    /// records cannot be listed.
    pub fn push_kind(&mut self, kind: &str) -> SyncResult<PushReport> {
        let registry = self.registry;
        let record_kind = registry.require(kind)?;
        let records = self
            .storage
            .list_records(&record_kind.name)
            .map_err(|e| SyncError::Database(e.to_string()))?;

        let mut report = PushReport::new(&record_kind.name);
        for mut record in records {
            let object_id = record.object_id().unwrap_or_default().to_string();
            match self.save(&mut record) {
                Ok(outcome) => report.record(&outcome),
                Err(e @ SyncError::Configuration(_)) => return Err(e),
                Err(e) => {
                    warn!(kind = %record_kind.name, object_id = %object_id, error = %e, "Push failed");
                    report.failed.push(PushFailure {
                        object_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            kind = %record_kind.name,
            created = report.created,
            updated = report.updated,
            recreated = report.recreated,
            failed = report.failed.len(),
            "Push finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;
    use crate::remote::fake::{Call, FakeRemote};
    use crate::sync::fixtures::library;
    use crate::sync::hash::content_hash;
    use crate::sync::import::Importer;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::{json, Value};

    fn new_book(registry: &Registry) -> Record {
        Record::new(registry.get("Book").unwrap())
            .with("title", FieldValue::Text("Dune".into()))
            .with("pages", FieldValue::Integer(412))
    }

    #[test]
    fn test_payload_omits_null_system_and_one_to_one_fields() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let record = new_book(&registry)
            .with_object_id("b1")
            .with("author", FieldValue::Pointer("ab12".into()))
            .with("editor", FieldValue::Pointer("ed34".into()))
            .with("in_print", FieldValue::Boolean(false));
        let payload = Exporter::new(&mut storage, &registry, &remote)
            .build_payload(&record)
            .unwrap();

        assert_eq!(
            Value::Object(payload),
            json!({
                "title": "Dune",
                "pages": 412,
                "inPrint": false,
                "author": {"__type": "Pointer", "className": "Author", "objectId": "ab12"}
            })
        );
    }

    #[test]
    fn test_payload_omits_non_finite_float() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let record = new_book(&registry).with("rating", FieldValue::Float(f64::NAN));
        let payload = Exporter::new(&mut storage, &registry, &remote)
            .build_payload(&record)
            .unwrap();

        assert!(!payload.contains_key("rating"));
        assert!(payload.values().all(|v| !v.is_null()));
        assert_eq!(payload["pages"], json!(412));
    }

    #[test]
    fn test_payload_dates() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let record = new_book(&registry)
            .with(
                "released_at",
                FieldValue::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            )
            .with(
                "published_on",
                FieldValue::Date(NaiveDate::from_ymd_opt(1965, 8, 1).unwrap()),
            );
        let payload = Exporter::new(&mut storage, &registry, &remote)
            .build_payload(&record)
            .unwrap();

        assert_eq!(
            payload["releasedAt"],
            json!({"__type": "Date", "iso": "2024-03-01T00:00:00.000Z"})
        );
        assert_eq!(
            payload["publishedOn"],
            json!({"__type": "Date", "iso": "1965-08-01T00:00:00.000Z"})
        );
    }

    #[test]
    fn test_payload_round_trips_through_import() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let record = new_book(&registry)
            .with_object_id("b1")
            .with("author", FieldValue::Pointer("ab12".into()))
            .with("tags", FieldValue::Json(json!(["sf"])))
            .with(
                "released_at",
                FieldValue::DateTime(Utc.timestamp_millis_opt(1_709_251_200_123).unwrap()),
            )
            .with(
                "published_on",
                FieldValue::Date(NaiveDate::from_ymd_opt(1965, 8, 1).unwrap()),
            );
        let mut payload = Exporter::new(&mut storage, &registry, &remote)
            .build_payload(&record)
            .unwrap();
        payload.insert("objectId".into(), json!("b1"));

        let report = Importer::new(&mut storage, &registry, &remote)
            .import_batch("Book", &[Value::Object(payload)])
            .unwrap();
        assert!(report.issues.is_empty());

        let imported = storage.find_record("Book", "b1").unwrap().unwrap();
        for (name, value) in record.fields() {
            assert_eq!(imported.get(name), Some(value), "field {name}");
        }
    }

    #[test]
    fn test_two_foreign_keys_to_same_kind_round_trip() {
        let target = |name: &str| FieldKind::ForeignKey {
            target: name.to_string(),
        };
        let registry = Registry::new(vec![
            RecordKind::new("Author").with_field("name", FieldKind::Text),
            RecordKind::new("Book")
                .with_field("title", FieldKind::Text)
                .with_field("author", target("Author"))
                .with_field("translator", target("Author")),
        ])
        .unwrap();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let record = Record::new(registry.get("Book").unwrap())
            .with_object_id("b1")
            .with("title", FieldValue::Text("Solaris".into()))
            .with("author", FieldValue::Pointer("a1".into()))
            .with("translator", FieldValue::Pointer("t1".into()));
        let mut payload = Exporter::new(&mut storage, &registry, &remote)
            .build_payload(&record)
            .unwrap();
        assert_eq!(
            payload["translator"],
            json!({"__type": "Pointer", "className": "Author", "objectId": "t1"})
        );
        payload.insert("objectId".into(), json!("b1"));

        let report = Importer::new(&mut storage, &registry, &remote)
            .import_batch("Book", &[Value::Object(payload)])
            .unwrap();
        assert!(report.issues.is_empty());

        let imported = storage.find_record("Book", "b1").unwrap().unwrap();
        assert_eq!(imported.get("author"), Some(&FieldValue::Pointer("a1".into())));
        assert_eq!(imported.get("translator"), Some(&FieldValue::Pointer("t1".into())));
    }

    #[test]
    fn test_file_uploaded_under_content_hash() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let bytes = b"cover image".to_vec();

        let record = new_book(&registry).with(
            "cover",
            FieldValue::File(Attachment::new("my cover.png", bytes.clone())),
        );
        let payload = Exporter::new(&mut storage, &registry, &remote)
            .build_payload(&record)
            .unwrap();

        let name = format!("{}.png", content_hash(&bytes));
        assert_eq!(payload["cover"], json!({"__type": "File", "name": name}));
        assert_eq!(remote.uploaded(&name), Some(bytes));
    }

    #[test]
    fn test_foreign_key_to_non_participating_kind() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let record = Record::new(registry.get("Review").unwrap())
            .with("publisher", FieldValue::Pointer("p1".into()));
        let result = Exporter::new(&mut storage, &registry, &remote).build_payload(&record);
        assert!(matches!(result, Err(SyncError::Configuration(_))));
    }

    #[test]
    fn test_save_creates_then_updates() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = new_book(&registry);

        let outcome = Exporter::new(&mut storage, &registry, &remote)
            .save(&mut record)
            .unwrap();
        let SyncOutcome::Created { object_id } = outcome else {
            panic!("expected create, got {outcome:?}");
        };
        assert_eq!(record.object_id(), Some(object_id.as_str()));
        assert!(record.local_id().is_some());
        assert_eq!(remote.get("Book", &object_id).unwrap()["title"], "Dune");

        record.set("title", FieldValue::Text("Dune Messiah".into()));
        let outcome = Exporter::new(&mut storage, &registry, &remote)
            .save(&mut record)
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Updated { object_id: object_id.clone() });
        assert_eq!(remote.get("Book", &object_id).unwrap()["title"], "Dune Messiah");

        let stored = storage.find_record("Book", &object_id).unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&FieldValue::Text("Dune Messiah".into())));
        assert_eq!(storage.count_records("Book").unwrap(), 1);
    }

    #[test]
    fn test_stale_id_is_recreated() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = new_book(&registry);

        Exporter::new(&mut storage, &registry, &remote)
            .save(&mut record)
            .unwrap();
        let stale_id = record.object_id().unwrap().to_string();
        remote.forget("Book", &stale_id);

        let outcome = Exporter::new(&mut storage, &registry, &remote)
            .save(&mut record)
            .unwrap();
        let SyncOutcome::Recreated { stale_id: reported, object_id } = outcome else {
            panic!("expected re-create, got {outcome:?}");
        };

        assert_eq!(reported, stale_id);
        assert_ne!(object_id, stale_id);
        assert_eq!(record.object_id(), Some(object_id.as_str()));
        assert_eq!(storage.count_records("Book").unwrap(), 1);
        assert!(storage.find_record("Book", &stale_id).unwrap().is_none());
        assert!(storage.find_record("Book", &object_id).unwrap().is_some());
        assert_eq!(remote.object_count("Book"), 1);
        assert!(remote
            .calls()
            .contains(&Call::Delete("Book".into(), stale_id.clone())));
    }

    #[test]
    fn test_other_update_errors_are_fatal() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = new_book(&registry);
        Exporter::new(&mut storage, &registry, &remote)
            .save(&mut record)
            .unwrap();
        let object_id = record.object_id().unwrap().to_string();

        remote.fail_everything();
        record.set("title", FieldValue::Text("Changed".into()));
        let result = Exporter::new(&mut storage, &registry, &remote).save(&mut record);

        assert!(matches!(result, Err(SyncError::RemoteSync { .. })));
        let stored = storage.find_record("Book", &object_id).unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&FieldValue::Text("Dune".into())));
    }

    #[test]
    fn test_create_failure_stores_nothing() {
        let registry = library();
        let remote = FakeRemote::new();
        remote.fail_everything();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = new_book(&registry);

        let result = Exporter::new(&mut storage, &registry, &remote).save(&mut record);
        assert!(matches!(result, Err(SyncError::RemoteSync { .. })));
        assert!(record.is_new());
        assert_eq!(storage.count_records("Book").unwrap(), 0);
    }

    #[test]
    fn test_save_local_requires_object_id() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = new_book(&registry);

        let result = Exporter::new(&mut storage, &registry, &remote).save_local(&mut record);
        assert!(matches!(result, Err(SyncError::LocalPersistence { .. })));
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn test_delete_is_best_effort_remotely() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = new_book(&registry);
        Exporter::new(&mut storage, &registry, &remote)
            .save(&mut record)
            .unwrap();

        remote.fail_deletes();
        let removed = Exporter::new(&mut storage, &registry, &remote)
            .delete(&record)
            .unwrap();

        assert!(removed);
        assert_eq!(storage.count_records("Book").unwrap(), 0);
    }

    #[test]
    fn test_push_kind_collects_outcomes() {
        let registry = library();
        let remote = FakeRemote::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        for (id, title) in [("b1", "Dune"), ("b2", "Children of Dune"), ("b3", "Gone")] {
            let mut record = new_book(&registry)
                .with_object_id(id)
                .with("title", FieldValue::Text(title.into()));
            if id != "b3" {
                remote.insert("Book", id, Payload::new());
            }
            Exporter::new(&mut storage, &registry, &remote)
                .save_local(&mut record)
                .unwrap();
        }

        let report = Exporter::new(&mut storage, &registry, &remote)
            .push_kind("Book")
            .unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.recreated, 1);
        assert!(report.failed.is_empty());
        assert_eq!(storage.count_records("Book").unwrap(), 3);
        assert!(storage.find_record("Book", "b3").unwrap().is_none());
        assert_eq!(remote.get("Book", "b1").unwrap()["title"], "Dune");
    }

    #[test]
    fn test_push_kind_keeps_going_after_remote_failure() {
        let registry = library();
        let remote = FakeRemote::new();
        remote.fail_everything();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = new_book(&registry).with_object_id("b1");
        Exporter::new(&mut storage, &registry, &remote)
            .save_local(&mut record)
            .unwrap();

        let report = Exporter::new(&mut storage, &registry, &remote)
            .push_kind("Book")
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].object_id, "b1");
    }
}
