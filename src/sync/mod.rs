//! Parse sync operations.
//!
//! This module translates between Parse objects and local records:
//!
//! - **Import**: Parse objects (snapshot file or paged query) → SQLite
//! - **Export**: local record → Parse payload → create/update, then SQLite
//! - **Codec**: the `Date` / `File` / `Pointer` typed-value shapes
//! - **Hashing**: content-addressed names for file attachments
//! - **Status**: per-kind record counts and pull cursors
//!
//! # Typed values
//!
//! Parse tags non-scalar values with `__type`:
//! ```json
//! {"__type":"Pointer","className":"Author","objectId":"ab12"}
//! ```
//! On import such a pointer sets the local `author_id` column; on export a
//! foreign key produces the same shape again.
//!
//! # Example
//!
//! ```ignore
//! use parsesync::sync::{Exporter, Importer};
//!
//! // Import a snapshot; per-record problems end up in the report
//! let report = Importer::new(&mut storage, &registry, &fetcher)
//!     .import_snapshot("Book", Path::new("Book.json"))?;
//!
//! // Push a local change; a stale remote id is re-created
//! let outcome = Exporter::new(&mut storage, &registry, &client).save(&mut record)?;
//! ```

pub mod casing;
pub mod codec;
mod export;
pub mod hash;
mod import;
mod status;
mod types;

#[cfg(test)]
mod fixtures;

pub use export::Exporter;
pub use import::{Importer, DEFAULT_PAGE_SIZE, IGNORED_KEYS};
pub use status::{get_sync_status, print_status, KindStatus};
pub use types::{
    ImportIssue, ImportReport, IssueKind, PushFailure, PushReport, SyncError, SyncOutcome,
    SyncResult,
};
