//! Error types for document store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The networked backend could not be reached within the configured timeout.
    #[error("backend unavailable: {reason}")]
    ConnectionUnavailable {
        /// Why the connection attempt failed.
        reason: String,
    },

    /// A unique index rejected the write.
    #[error("duplicate key in collection {collection}: {field}")]
    DuplicateKey {
        /// The collection holding the index.
        collection: String,
        /// The indexed field whose value collided.
        field: String,
    },

    /// The backend failed while executing an operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A collection or field name cannot be used by the backend.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// A document could not be converted to or from its stored form.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Creates a connection unavailable error.
    pub fn connection_unavailable(reason: impl Into<String>) -> Self {
        Self::ConnectionUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            field: field.into(),
        }
    }

    /// Returns true if this error is a uniqueness violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<postgres::Error> for StoreError {
    fn from(err: postgres::Error) -> Self {
        Self::Backend(describe_postgres(&err))
    }
}

/// Renders a client error with the server's code and message when present.
///
/// The client's own `Display` prints only `db error` for server-side
/// failures.
pub(crate) fn describe_postgres(err: &postgres::Error) -> String {
    if let Some(db) = err.as_db_error() {
        let mut text = format!("{} {}: {}", db.severity(), db.code().code(), db.message());
        if let Some(detail) = db.detail() {
            text.push_str(" (");
            text.push_str(detail);
            text.push(')');
        }
        return text;
    }
    let text = err.to_string();
    match std::error::Error::source(err).map(ToString::to_string) {
        Some(cause) if !text.contains(&cause) => format!("{text}: {cause}"),
        _ => text,
    }
}
