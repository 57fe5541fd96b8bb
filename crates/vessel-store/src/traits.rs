use std::fmt;
use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vessel_model::{ContentSource, StoreBlobRequest};
use vessel_types::{AttributeDiff, Attributes, BlobRef};

use crate::error::BackendResult;

/// Who chooses the key of a new blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAssignment {
    /// The facade generates a key and passes it to `write`.
    Caller,
    /// The backend picks the key itself; `write` receives `None`.
    Backend,
}

/// What the facade hands to the backend alongside the content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSpec {
    pub original_name: String,
    pub content_type: String,
    pub declared_size: Option<u64>,
    pub attributes: Attributes,
}

impl From<&StoreBlobRequest> for WriteSpec {
    fn from(request: &StoreBlobRequest) -> Self {
        Self {
            original_name: request.original_name().to_string(),
            content_type: request.content_type().to_string(),
            declared_size: request.declared_size(),
            attributes: request.attributes().clone(),
        }
    }
}

/// Metadata as confirmed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMetadata {
    pub key: BlobRef,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Attributes,
    /// Backend-specific content checksum, if the backend computes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A blob as returned by [`BlobBackend::read`]: metadata plus a handle that
/// opens the content lazily.
#[derive(Clone)]
pub struct BackendBlob {
    pub metadata: BackendMetadata,
    pub content: Arc<dyn ContentSource>,
}

impl fmt::Debug for BackendBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendBlob")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// The port every storage driver implements.
///
/// All implementations must satisfy these invariants:
/// - A successful `write` has persisted both content and metadata.
/// - `read` does not read the content; it returns a source that does.
/// - Missing blobs are reported as `Ok(None)` / `Ok(false)`, never as `Err`.
/// - Calls may block. Timeouts and cancellation are the driver's concern
///   and are documented on each driver.
pub trait BlobBackend: Send + Sync {
    /// Short driver name for logs (e.g. "memory", "fs").
    fn kind(&self) -> &'static str;

    /// Whether the caller or the backend assigns keys to new blobs.
    fn key_assignment(&self) -> KeyAssignment {
        KeyAssignment::Caller
    }

    /// Write a new blob.
    ///
    /// `key` is `Some` exactly when [`key_assignment`](Self::key_assignment)
    /// is [`KeyAssignment::Caller`]. Fails with `SizeMismatch` (persisting
    /// nothing) if `spec.declared_size` is set and differs from the number of
    /// bytes read.
    fn write(
        &self,
        key: Option<&BlobRef>,
        content: &mut dyn Read,
        spec: &WriteSpec,
    ) -> BackendResult<BackendMetadata>;

    /// Look up a blob. Returns `Ok(None)` if it does not exist.
    fn read(&self, key: &BlobRef) -> BackendResult<Option<BackendBlob>>;

    /// Check whether a blob exists.
    fn exists(&self, key: &BlobRef) -> BackendResult<bool>;

    /// Delete a blob. Returns `true` if it existed.
    fn delete(&self, key: &BlobRef) -> BackendResult<bool>;

    /// Apply attribute changes and bump the last-modified time.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    fn update_metadata(
        &self,
        key: &BlobRef,
        diff: &AttributeDiff,
    ) -> BackendResult<Option<BackendMetadata>>;
}

impl<T: BlobBackend + ?Sized> BlobBackend for Arc<T> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn key_assignment(&self) -> KeyAssignment {
        (**self).key_assignment()
    }

    fn write(
        &self,
        key: Option<&BlobRef>,
        content: &mut dyn Read,
        spec: &WriteSpec,
    ) -> BackendResult<BackendMetadata> {
        (**self).write(key, content, spec)
    }

    fn read(&self, key: &BlobRef) -> BackendResult<Option<BackendBlob>> {
        (**self).read(key)
    }

    fn exists(&self, key: &BlobRef) -> BackendResult<bool> {
        (**self).exists(key)
    }

    fn delete(&self, key: &BlobRef) -> BackendResult<bool> {
        (**self).delete(key)
    }

    fn update_metadata(
        &self,
        key: &BlobRef,
        diff: &AttributeDiff,
    ) -> BackendResult<Option<BackendMetadata>> {
        (**self).update_metadata(key, diff)
    }
}
