//! Record kinds and the registry of kinds that participate in sync.
//!
//! A record kind is the local counterpart of a Parse class. Kinds are
//! declared in the configuration file:
//!
//! ```json
//! {
//!   "name": "Book",
//!   "fields": [
//!     { "name": "title", "type": "text" },
//!     { "name": "published_on", "type": "date" },
//!     { "name": "cover", "type": "image" },
//!     { "name": "author", "type": "foreign_key", "target": "Author" }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sync::casing::{is_round_trip_safe, to_camel_case};
use crate::sync::{SyncError, SyncResult};

/// Local field name of the external id.
pub const OBJECT_ID_FIELD: &str = "object_id";
/// Local field name of the creation timestamp.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Local field name of the last-update timestamp.
pub const UPDATED_AT_FIELD: &str = "updated_at";
/// System fields every kind carries; never declared, never exported.
pub const SYSTEM_FIELDS: [&str; 3] = [OBJECT_ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Kind of a declared field, selecting its encode/decode rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    /// Arbitrary JSON (arrays, nested objects), passed through untouched.
    Json,
    Date,
    DateTime,
    File,
    Image,
    /// Pointer to a record of another kind.
    ForeignKey { target: String },
    /// Imported like a foreign key, never exported.
    OneToOne { target: String },
}

impl FieldKind {
    /// Whether values of this kind are file attachments.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File | Self::Image)
    }

    /// Target kind name for pointer fields.
    #[must_use]
    pub fn pointer_target(&self) -> Option<&str> {
        match self {
            Self::ForeignKey { target } | Self::OneToOne { target } => Some(target),
            _ => None,
        }
    }
}

/// A declared field of a record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Local snake_case name.
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    /// Storage column; pointer fields hold the target id in `<name>_id`.
    #[must_use]
    pub fn column(&self) -> String {
        if self.kind.pointer_target().is_some() {
            format!("{}_id", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Parse field name.
    #[must_use]
    pub fn remote_name(&self) -> String {
        to_camel_case(&self.name)
    }
}

/// Local counterpart of a Parse class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKind {
    /// Local kind name.
    pub name: String,
    /// Parse class name, when it differs from `name` (e.g. `_User`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Declared fields, excluding the system fields.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl RecordKind {
    /// A kind with no declared fields.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            class_name: None,
            fields: Vec::new(),
        }
    }

    /// Builder: set the Parse class name.
    #[must_use]
    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = Some(class_name.to_string());
        self
    }

    /// Builder: declare a field.
    #[must_use]
    pub fn with_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldDef::new(name, kind));
        self
    }

    /// Parse class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or(&self.name)
    }

    /// Look up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a declared field by storage column.
    #[must_use]
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.column() == column)
    }

    fn validate(&self) -> SyncResult<()> {
        let mut columns = HashSet::new();
        for field in &self.fields {
            if SYSTEM_FIELDS.contains(&field.name.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "{}.{} redeclares a system field",
                    self.name, field.name
                )));
            }
            if !is_round_trip_safe(&field.name) {
                return Err(SyncError::Configuration(format!(
                    "{}.{} does not map back from its Parse name '{}'",
                    self.name,
                    field.name,
                    field.remote_name()
                )));
            }
            if !columns.insert(field.column()) {
                return Err(SyncError::Configuration(format!(
                    "{}.{} collides with another field's column",
                    self.name, field.name
                )));
            }
        }
        Ok(())
    }
}

/// Normalize a kind name for lookup: lowercase, spaces removed.
#[must_use]
pub fn normalize_kind_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The set of record kinds that participate in sync.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    kinds: Vec<RecordKind>,
}

impl Registry {
    /// Build a registry, validating every kind.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Configuration` if a kind name is declared twice,
    /// a field redeclares a system field, or a field name does not survive
    /// the snake_case/camelCase round trip.
    pub fn new(kinds: Vec<RecordKind>) -> SyncResult<Self> {
        let mut names = HashSet::new();
        for kind in &kinds {
            if !names.insert(normalize_kind_name(&kind.name)) {
                return Err(SyncError::Configuration(format!(
                    "record kind '{}' is declared twice",
                    kind.name
                )));
            }
            kind.validate()?;
        }
        Ok(Self { kinds })
    }

    /// All kinds in declaration order.
    #[must_use]
    pub fn kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    /// Exact lookup by kind name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RecordKind> {
        self.kinds.iter().find(|k| k.name == name)
    }

    /// Lookup tolerant of case and spaces (`"book review"` finds `BookReview`).
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&RecordKind> {
        let wanted = normalize_kind_name(name);
        self.kinds
            .iter()
            .find(|k| normalize_kind_name(&k.name) == wanted)
            .or_else(|| {
                self.kinds
                    .iter()
                    .find(|k| normalize_kind_name(k.class_name()) == wanted)
            })
    }

    /// Whether a kind name participates in sync.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Require a participating kind.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Configuration` naming the missing kind.
    pub fn require(&self, name: &str) -> SyncResult<&RecordKind> {
        self.get(name).ok_or_else(|| {
            SyncError::Configuration(format!(
                "record kind '{name}' does not participate in sync"
            ))
        })
    }

    /// Order kinds so that pointer targets come before the kinds that point
    /// to them.
    ///
    /// Targets outside the registry and self references are ignored. Kinds
    /// caught in a cycle are appended in declaration order.
    #[must_use]
    pub fn import_order(&self) -> Vec<&RecordKind> {
        let mut pending: HashMap<&str, HashSet<&str>> = self
            .kinds
            .iter()
            .map(|kind| {
                let deps = kind
                    .fields
                    .iter()
                    .filter_map(|f| f.kind.pointer_target())
                    .filter(|target| *target != kind.name && self.contains(target))
                    .collect();
                (kind.name.as_str(), deps)
            })
            .collect();

        let mut ordered: Vec<&RecordKind> = Vec::with_capacity(self.kinds.len());
        loop {
            let ready: Vec<&RecordKind> = self
                .kinds
                .iter()
                .filter(|k| pending.get(k.name.as_str()).is_some_and(HashSet::is_empty))
                .collect();
            if ready.is_empty() {
                break;
            }
            for kind in ready {
                pending.remove(kind.name.as_str());
                for deps in pending.values_mut() {
                    deps.remove(kind.name.as_str());
                }
                ordered.push(kind);
            }
        }

        if !pending.is_empty() {
            let cyclic: Vec<&RecordKind> = self
                .kinds
                .iter()
                .filter(|k| pending.contains_key(k.name.as_str()))
                .collect();
            warn!(
                kinds = ?cyclic.iter().map(|k| k.name.as_str()).collect::<Vec<_>>(),
                "Pointer cycle between record kinds, keeping declaration order"
            );
            ordered.extend(cyclic);
        }

        ordered
    }
}
