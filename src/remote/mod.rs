//! Remote side of the sync: the Parse REST API.
//!
//! The translators never talk HTTP directly. They take a `&dyn RemoteClient`
//! (create/update/delete/upload/query) and a `&dyn FileFetcher` (plain
//! downloads), so tests can script the remote side.

mod parse;

#[cfg(test)]
pub(crate) mod fake;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::sync::codec::format_iso;

pub use parse::{HttpFetcher, ParseClient};

/// A Parse object as JSON.
pub type RemoteObject = Map<String, Value>;

/// Body sent to create/update.
pub type Payload = Map<String, Value>;

/// Parse error code for "object not found".
pub const OBJECT_NOT_FOUND: i64 = 101;

/// Errors from the remote side.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The object id does not exist (Parse code 101).
    #[error("Object not found: {class_name}/{object_id}")]
    ObjectNotFound {
        /// Parse class.
        class_name: String,
        /// Requested id.
        object_id: String,
    },

    /// Parse answered with an error body.
    #[error("Parse error {code}: {message}")]
    Api {
        /// Parse error code.
        code: i64,
        /// Parse error message.
        message: String,
    },

    /// Transport failure or non-JSON error status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A success response without the expected members.
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// Client could not be built from the settings.
    #[error("Invalid remote settings: {0}")]
    InvalidSettings(String),
}

impl RemoteError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Response to a create call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedObject {
    pub object_id: String,
    pub created_at: DateTime<Utc>,
}

/// Response to an update call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedObject {
    pub updated_at: DateTime<Utc>,
}

/// Response to a file upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    /// Name Parse stored the file under.
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A class query: constraints, ordering and one page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `where` constraints.
    pub constraints: Option<Value>,
    /// Sort key, e.g. `updatedAt` or `-createdAt`.
    pub order: Option<String>,
    pub limit: usize,
    pub skip: usize,
}

impl Query {
    /// Page `page` of objects updated at or after `cursor`, oldest first.
    ///
    /// With no cursor every object matches.
    #[must_use]
    pub fn updated_since(cursor: Option<&DateTime<Utc>>, limit: usize, page: usize) -> Self {
        let constraints = cursor.map(|at| {
            json!({ "updatedAt": { "$gte": { "__type": "Date", "iso": format_iso(at) } } })
        });
        Self {
            constraints,
            order: Some("updatedAt".to_string()),
            limit,
            skip: page * limit,
        }
    }
}

/// Write access to Parse classes.
pub trait RemoteClient {
    /// Create an object.
    ///
    /// # Errors
    ///
    /// Any remote failure.
    fn create(&self, class_name: &str, payload: &Payload) -> RemoteResult<CreatedObject>;

    /// Update an object.
    ///
    /// # Errors
    ///
    /// `RemoteError::ObjectNotFound` if the id no longer exists, or any other
    /// remote failure.
    fn update(
        &self,
        class_name: &str,
        object_id: &str,
        payload: &Payload,
    ) -> RemoteResult<UpdatedObject>;

    /// Delete an object.
    ///
    /// # Errors
    ///
    /// Any remote failure, including `ObjectNotFound`.
    fn delete(&self, class_name: &str, object_id: &str) -> RemoteResult<()>;

    /// Upload file content under `name`.
    ///
    /// # Errors
    ///
    /// Any remote failure.
    fn upload_file(&self, name: &str, data: &[u8]) -> RemoteResult<UploadedFile>;

    /// Run a query against a class.
    ///
    /// # Errors
    ///
    /// Any remote failure.
    fn query(&self, class_name: &str, query: &Query) -> RemoteResult<Vec<RemoteObject>>;
}

/// Read-only download of file attachments.
pub trait FileFetcher {
    /// Download the bytes behind `url`.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-success status.
    fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_created_object_from_parse_json() {
        let created: CreatedObject = serde_json::from_value(json!({
            "objectId": "Ed1nuqPvcm",
            "createdAt": "2011-08-20T02:06:57.931Z"
        }))
        .unwrap();
        assert_eq!(created.object_id, "Ed1nuqPvcm");
        assert_eq!(created.created_at.timestamp_subsec_millis(), 931);
    }

    #[test]
    fn test_query_without_cursor() {
        let query = Query::updated_since(None, 100, 2);
        assert!(query.constraints.is_none());
        assert_eq!(query.skip, 200);
        assert_eq!(query.order.as_deref(), Some("updatedAt"));
    }

    #[test]
    fn test_query_with_cursor() {
        let cursor = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let query = Query::updated_since(Some(&cursor), 50, 0);
        assert_eq!(
            query.constraints,
            Some(json!({"updatedAt": {"$gte": {"__type": "Date", "iso": "2024-03-01T00:00:00.000Z"}}}))
        );
    }
}
