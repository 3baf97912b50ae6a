//! Sync types: errors, reports and save outcomes.
//!
//! Errors fall into two groups. Data-shape problems (malformed items,
//! unsupported values, attachment failures, local persistence during import)
//! are recorded in an [`ImportReport`] and never abort a batch. Configuration
//! errors and remote failures on an explicit save propagate to the caller.

use serde::Serialize;

use crate::remote::RemoteError;

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An imported item is not an object or has no `objectId`.
    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord {
        /// Position of the item in its batch (0-indexed).
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// A value whose shape or tag cannot be translated for its field.
    #[error("Unsupported value for field '{field}': {detail}")]
    UnsupportedValue {
        /// Local field name.
        field: String,
        /// Description of the offending value.
        detail: String,
    },

    /// A remote key with no declared local field.
    #[error("Unknown field '{field}' on {kind}")]
    UnknownField {
        /// Record kind name.
        kind: String,
        /// Local field name derived from the remote key.
        field: String,
    },

    /// Downloading a file attachment failed.
    #[error("Failed to fetch attachment for '{field}' from {url}: {message}")]
    AttachmentFetch {
        /// Local field name.
        field: String,
        /// Source URL.
        url: String,
        /// Underlying cause.
        message: String,
    },

    /// Persisting a downloaded attachment failed.
    #[error("Failed to bind attachment '{name}' to field '{field}': {message}")]
    AttachmentBind {
        /// Local field name.
        field: String,
        /// Attachment file name.
        name: String,
        /// Underlying cause.
        message: String,
    },

    /// Writing a record to the local store failed.
    #[error("Failed to save {kind} {object_id}: {message}")]
    LocalPersistence {
        /// Record kind name.
        kind: String,
        /// External id of the record (empty when it has none yet).
        object_id: String,
        /// Underlying cause.
        message: String,
    },

    /// A remote operation failed during an explicit save.
    #[error("Remote sync failed for {kind}: {source}")]
    RemoteSync {
        /// Record kind name.
        kind: String,
        /// Remote failure.
        #[source]
        source: RemoteError,
    },

    /// A setup mistake, such as a pointer to a kind that does not sync.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error outside of per-record persistence.
    #[error("Database error: {0}")]
    Database(String),

    /// Snapshot file not found.
    #[error("Snapshot file not found: {0}")]
    SnapshotNotFound(String),

    /// Snapshot file is not a `{"results": [...]}` document.
    #[error("Invalid snapshot {path}: {message}")]
    InvalidSnapshot {
        /// Snapshot path.
        path: String,
        /// What is wrong with it.
        message: String,
    },
}

impl SyncError {
    /// The report category for a recoverable error, `None` for fatal ones.
    #[must_use]
    pub const fn issue_kind(&self) -> Option<IssueKind> {
        match self {
            Self::MalformedRecord { .. } => Some(IssueKind::MalformedRecord),
            Self::UnsupportedValue { .. } => Some(IssueKind::UnsupportedValue),
            Self::UnknownField { .. } => Some(IssueKind::UnknownField),
            Self::AttachmentFetch { .. } => Some(IssueKind::AttachmentFetch),
            Self::AttachmentBind { .. } => Some(IssueKind::AttachmentBind),
            Self::LocalPersistence { .. } => Some(IssueKind::LocalPersistence),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Category of a recoverable problem recorded during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Item skipped: not an object or missing `objectId`.
    MalformedRecord,
    /// Field skipped: value could not be translated.
    UnsupportedValue,
    /// Field skipped: no declared local field.
    UnknownField,
    /// Attachment skipped: download failed.
    AttachmentFetch,
    /// Attachment skipped: could not be stored.
    AttachmentBind,
    /// Record skipped: local store rejected it.
    LocalPersistence,
}

impl IssueKind {
    /// Short label for human-readable output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRecord => "malformed",
            Self::UnsupportedValue => "unsupported",
            Self::UnknownField => "unknown field",
            Self::AttachmentFetch => "fetch",
            Self::AttachmentBind => "attachment",
            Self::LocalPersistence => "save",
        }
    }

    /// Whether the whole record was dropped (as opposed to one field or file).
    #[must_use]
    pub const fn skips_record(self) -> bool {
        matches!(self, Self::MalformedRecord | Self::LocalPersistence)
    }
}

/// A recoverable problem recorded during import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportIssue {
    /// Position of the item in the imported sequence.
    pub index: usize,
    /// External id of the item, when it had one.
    pub object_id: Option<String>,
    /// Problem category.
    pub kind: IssueKind,
    /// Human-readable description.
    pub message: String,
}

/// Statistics and diagnostics for one import run over a record kind.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    /// Record kind name.
    pub kind: String,
    /// Number of new local records created.
    pub created: usize,
    /// Number of existing local records updated.
    pub updated: usize,
    /// Number of items that were not persisted.
    pub failed: usize,
    /// Number of attachments bound.
    pub attachments: usize,
    /// Every recoverable problem, in encounter order.
    pub issues: Vec<ImportIssue>,
}

impl ImportReport {
    /// Empty report for a kind.
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    /// Record a recoverable error. Fatal errors are not recorded; callers
    /// propagate them instead.
    pub fn record(&mut self, index: usize, object_id: Option<&str>, err: &SyncError) {
        if let Some(kind) = err.issue_kind() {
            if kind.skips_record() {
                self.failed += 1;
            }
            self.issues.push(ImportIssue {
                index,
                object_id: object_id.map(String::from),
                kind,
                message: err.to_string(),
            });
        }
    }

    /// Total number of items processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.failed
    }

    /// Number of recorded issues of one category.
    #[must_use]
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    /// Fold a later batch into this report, shifting its item indices.
    pub fn merge(&mut self, other: ImportReport, index_offset: usize) {
        self.created += other.created;
        self.updated += other.updated;
        self.failed += other.failed;
        self.attachments += other.attachments;
        self.issues
            .extend(other.issues.into_iter().map(|mut issue| {
                issue.index += index_offset;
                issue
            }));
    }
}

/// What a save did on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A new remote object was created.
    Created {
        /// New external id.
        object_id: String,
    },
    /// The existing remote object was updated.
    Updated {
        /// External id.
        object_id: String,
    },
    /// The stored external id no longer existed remotely; a new object was created.
    Recreated {
        /// The id that was not found.
        stale_id: String,
        /// New external id.
        object_id: String,
    },
}

impl SyncOutcome {
    /// External id the record ended up with.
    #[must_use]
    pub fn object_id(&self) -> &str {
        match self {
            Self::Created { object_id }
            | Self::Updated { object_id }
            | Self::Recreated { object_id, .. } => object_id,
        }
    }
}

/// A record that could not be pushed.
#[derive(Debug, Clone, Serialize)]
pub struct PushFailure {
    /// External id of the record.
    pub object_id: String,
    /// Human-readable cause.
    pub message: String,
}

/// Statistics for pushing a record kind to Parse.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PushReport {
    /// Record kind name.
    pub kind: String,
    /// Records created remotely.
    pub created: usize,
    /// Records updated remotely.
    pub updated: usize,
    /// Records re-created after a stale id.
    pub recreated: usize,
    /// Records that failed.
    pub failed: Vec<PushFailure>,
}

impl PushReport {
    /// Empty report for a kind.
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    /// Count an outcome.
    pub fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created { .. } => self.created += 1,
            SyncOutcome::Updated { .. } => self.updated += 1,
            SyncOutcome::Recreated { .. } => self.recreated += 1,
        }
    }

    /// Total number of records processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.recreated + self.failed.len()
    }
}
