//! Data models for parsesync.
//!
//! This module contains the local side of the sync:
//! - `RecordKind` / `Registry` - which Parse classes sync and their fields
//! - `Record` / `FieldValue` - a local record and its typed values
//! - `Attachment` - file content bound to a record field

pub mod kind;
pub mod record;

pub use kind::{
    normalize_kind_name, FieldDef, FieldKind, RecordKind, Registry, CREATED_AT_FIELD,
    OBJECT_ID_FIELD, SYSTEM_FIELDS, UPDATED_AT_FIELD,
};
pub use record::{Attachment, FieldValue, Record};
