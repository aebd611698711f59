use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backing store could not be reached. Callers fall back to defaults
    /// and retry later.
    #[error("profile store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("corrupt profile data: {0}")]
    Serialization(String),

    #[error("persistence worker has shut down")]
    Closed,
}

impl StorageError {
    /// Whether trying again later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StorageError::Serialization(err.to_string()),
            other => StorageError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
