//! Error types for the session store and its adapters.

use tower_sessions::session_store;

/// Errors reported by an [`Adapter`](crate::Adapter) implementation.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A batch delete was issued with more keys than the store accepts.
    #[error("batch delete accepts at most {limit} keys, got {requested}")]
    BatchTooLarge { limit: usize, requested: usize },

    /// The SQL backend rejected a query.
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Stored attributes could not be packed or unpacked.
    #[error("attribute packing error: {0}")]
    Packing(String),

    /// Any other transport or store-side failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure to map a session to a record or back.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("failed to encode session property `{field}`: {source}")]
    Encode {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode record attribute `{field}`: {source}")]
    Decode {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// An opaque-blob record has no `session` attribute.
    #[error("record has no `{0}` attribute")]
    MissingBlob(&'static str),

    /// A per-field session property would overwrite a reserved attribute.
    #[error("session property `{0}` collides with a reserved record attribute")]
    ReservedAttribute(String),

    #[error("record attribute `expires` is not an integer timestamp: {0:?}")]
    InvalidExpiry(String),
}

impl SerializationError {
    /// Whether this error happened while writing (as opposed to reading) a record.
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Encode { .. } | Self::ReservedAttribute(_))
    }
}

/// Top-level error returned by [`SdbStore`](crate::SdbStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid construction options.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for session_store::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Serialization(e) if e.is_encode() => session_store::Error::Encode(e.to_string()),
            Error::Serialization(e) => session_store::Error::Decode(e.to_string()),
            other => session_store::Error::Backend(other.to_string()),
        }
    }
}
