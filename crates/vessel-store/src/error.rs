use vessel_types::BlobRef;

/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A blob already exists under the key being written.
    #[error("blob already exists: {0}")]
    KeyConflict(BlobRef),

    /// The backend expects the caller to supply a key and none was given.
    #[error("backend requires a caller-assigned key")]
    KeyRequired,

    /// The key cannot be represented by this backend.
    #[error("invalid key {key}: {reason}")]
    InvalidKey { key: BlobRef, reason: String },

    /// The content length differs from the declared size.
    #[error("declared size {declared} but received {actual} bytes")]
    SizeMismatch { declared: u64, actual: u64 },

    /// Metadata could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
