//! Error types for parsesync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for `--json` consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::sync::SyncError;

/// Result type alias for parsesync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    KindNotFound,
    RecordNotFound,
    SnapshotNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Sync (exit 5)
    SyncError,

    // Remote (exit 6)
    RemoteError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::KindNotFound => "KIND_NOT_FOUND",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::SnapshotNotFound => "SNAPSHOT_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SyncError => "SYNC_ERROR",
            Self::RemoteError => "REMOTE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::KindNotFound | Self::RecordNotFound | Self::SnapshotNotFound => 3,
            Self::InvalidArgument => 4,
            Self::SyncError => 5,
            Self::RemoteError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether running the same command again could succeed.
    ///
    /// True for transient failures (busy database, unreachable server) and
    /// for input that can be corrected.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::KindNotFound | Self::DatabaseError | Self::RemoteError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in parsesync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown record kind: {name}")]
    KindNotFound {
        name: String,
        /// Names of the configured kinds, for the hint.
        available: Vec<String>,
    },

    #[error("Record not found: {kind} {object_id}")]
    RecordNotFound { kind: String, object_id: String },

    #[error("Config file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::KindNotFound { .. } => ErrorCode::KindNotFound,
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::ConfigNotFound { .. } | Self::Config(_) => ErrorCode::ConfigError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Sync(err) => match err {
                SyncError::Configuration(_) => ErrorCode::ConfigError,
                SyncError::RemoteSync { .. } => ErrorCode::RemoteError,
                SyncError::SnapshotNotFound(_) => ErrorCode::SnapshotNotFound,
                SyncError::Database(_) => ErrorCode::DatabaseError,
                SyncError::Io(_) => ErrorCode::IoError,
                SyncError::Json(_) | SyncError::InvalidSnapshot { .. } => ErrorCode::JsonError,
                _ => ErrorCode::SyncError,
            },
            Self::Remote(RemoteError::InvalidSettings(_)) => ErrorCode::ConfigError,
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::KindNotFound { available, .. } => {
                if available.is_empty() {
                    Some("No record kinds are configured. Add them under \"kinds\" in the config file.".to_string())
                } else {
                    Some(format!(
                        "Configured kinds: {}. Use `parsesync kinds` to list their fields.",
                        available.join(", ")
                    ))
                }
            }

            Self::RecordNotFound { kind, .. } => Some(format!(
                "Run `parsesync pull {kind}` to fetch the latest records."
            )),

            Self::ConfigNotFound { path } => Some(format!(
                "Create {} or pass --config <FILE> (or set PARSESYNC_CONFIG).",
                path.display()
            )),

            Self::Sync(SyncError::SnapshotNotFound(_)) => {
                Some("Snapshot files are Parse exports of the form {\"results\": [...]}.".to_string())
            }

            Self::Sync(SyncError::RemoteSync { source, .. }) | Self::Remote(source)
                if source.is_transient() =>
            {
                Some("The Parse server could not be reached. Check server_url and retry.".to_string())
            }

            Self::Remote(RemoteError::InvalidSettings(_)) => Some(
                "Set server_url, application_id and rest_api_key or master_key in the config \
                 file, or PARSE_SERVER_URL / PARSE_APPLICATION_ID / PARSE_REST_API_KEY / \
                 PARSE_MASTER_KEY."
                    .to_string(),
            ),

            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_configuration_maps_to_config_error() {
        let err = Error::from(SyncError::Configuration("bad pointer".into()));
        assert_eq!(err.error_code(), ErrorCode::ConfigError);
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_remote_sync_maps_to_remote_error() {
        let err = Error::from(SyncError::RemoteSync {
            kind: "Book".into(),
            source: RemoteError::Http("connection refused".into()),
        });
        assert_eq!(err.error_code(), ErrorCode::RemoteError);
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_structured_json() {
        let err = Error::KindNotFound {
            name: "Publisher".into(),
            available: vec!["Author".into(), "Book".into()],
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "KIND_NOT_FOUND");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].as_str().unwrap().contains("Author, Book"));
    }
}
