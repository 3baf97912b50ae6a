//! Local record model.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::RecordKind;
use crate::sync::hash::{content_hash, upload_name};

/// A file attached to one record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name (keeps the extension).
    pub name: String,
    /// File content.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Attachment {
    #[must_use]
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }

    /// SHA256 of the content.
    #[must_use]
    pub fn content_hash(&self) -> String {
        content_hash(&self.data)
    }

    /// Content-addressed name used when uploading: `<sha256><ext>`.
    #[must_use]
    pub fn upload_name(&self) -> String {
        upload_name(&self.name, &self.data)
    }
}

/// A typed field value. Null is represented by the field being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Json(Value),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Attachment; stored beside the record, not in its field map.
    File(Attachment),
    /// External id of the referenced record.
    Pointer(String),
}

impl FieldValue {
    /// Plain JSON form of a scalar value; `None` for typed values
    /// (dates, files, pointers), which need a typed-value shape, and for
    /// floats JSON cannot represent (NaN, infinities).
    #[must_use]
    pub fn to_plain_json(&self) -> Option<Value> {
        match self {
            Self::Text(s) => Some(Value::String(s.clone())),
            Self::Integer(n) => Some(Value::from(*n)),
            Self::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            Self::Boolean(b) => Some(Value::Bool(*b)),
            Self::Json(v) => Some(v.clone()),
            Self::Date(_) | Self::DateTime(_) | Self::File(_) | Self::Pointer(_) => None,
        }
    }
}

/// A local record of one record kind.
///
/// `object_id` is the external id assigned by Parse. A record without one is
/// new and has to be created remotely before it can be stored locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: String,
    local_id: Option<i64>,
    object_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// A new, empty record.
    #[must_use]
    pub fn new(kind: &RecordKind) -> Self {
        let now = Utc::now();
        Self {
            kind: kind.name.clone(),
            local_id: None,
            object_id: None,
            created_at: now,
            updated_at: now,
            fields: BTreeMap::new(),
        }
    }

    /// Builder: a record already known to Parse under `object_id`.
    #[must_use]
    pub fn with_object_id(mut self, object_id: &str) -> Self {
        self.object_id = Some(object_id.to_string());
        self
    }

    /// Builder: set a field.
    #[must_use]
    pub fn with(mut self, field: &str, value: FieldValue) -> Self {
        self.set(field, value);
        self
    }

    /// Rebuild a record read from the local store.
    pub(crate) fn from_stored(
        kind: &str,
        local_id: i64,
        object_id: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            local_id: Some(local_id),
            object_id: Some(object_id),
            created_at,
            updated_at,
            fields,
        }
    }

    /// Kind name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Local primary key, once the record has been stored.
    #[must_use]
    pub fn local_id(&self) -> Option<i64> {
        self.local_id
    }

    /// External id.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    /// True when the record has never been created remotely.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.object_id.is_none()
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Set a field value.
    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    /// Set a field to null.
    pub fn clear(&mut self, field: &str) {
        self.fields.remove(field);
    }

    /// All non-null fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn set_local_id(&mut self, local_id: i64) {
        self.local_id = Some(local_id);
    }

    /// Record the identity Parse assigned on create.
    pub(crate) fn bind_remote(&mut self, object_id: String, created_at: DateTime<Utc>) {
        self.object_id = Some(object_id);
        self.created_at = created_at;
        self.updated_at = created_at;
    }

    /// Drop the remote and local identity; the record becomes new again.
    pub(crate) fn detach(&mut self) {
        self.object_id = None;
        self.local_id = None;
    }
}
