use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vessel_types::{BlobRef, StorageId};

/// Classification of blob events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobEventKind {
    /// A new blob was stored.
    Upload,
    /// A blob was deleted.
    Delete,
    /// A blob's attributes were changed.
    UpdateAttributes,
}

impl BlobEventKind {
    /// Every kind, in declaration order.
    pub const ALL: [BlobEventKind; 3] = [Self::Upload, Self::Delete, Self::UpdateAttributes];
}

impl fmt::Display for BlobEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Upload => "Upload",
            Self::Delete => "Delete",
            Self::UpdateAttributes => "UpdateAttributes",
        };
        write!(f, "{s}")
    }
}

/// A completed blob mutation.
///
/// Events are immutable values. They name the originating storage by its
/// [`StorageId`] and never hold backend resources, so listeners may keep
/// them as long as they like.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlobEvent {
    Upload {
        storage: StorageId,
        blob_ref: BlobRef,
        timestamp: DateTime<Utc>,
    },
    Delete {
        storage: StorageId,
        blob_ref: BlobRef,
        timestamp: DateTime<Utc>,
    },
    UpdateAttributes {
        storage: StorageId,
        blob_ref: BlobRef,
        timestamp: DateTime<Utc>,
    },
}

impl BlobEvent {
    /// Create an event of `kind` stamped with the given time.
    pub fn at(
        kind: BlobEventKind,
        storage: StorageId,
        blob_ref: BlobRef,
        timestamp: DateTime<Utc>,
    ) -> Self {
        match kind {
            BlobEventKind::Upload => Self::Upload {
                storage,
                blob_ref,
                timestamp,
            },
            BlobEventKind::Delete => Self::Delete {
                storage,
                blob_ref,
                timestamp,
            },
            BlobEventKind::UpdateAttributes => Self::UpdateAttributes {
                storage,
                blob_ref,
                timestamp,
            },
        }
    }

    /// Create an event of `kind` stamped now.
    pub fn now(kind: BlobEventKind, storage: StorageId, blob_ref: BlobRef) -> Self {
        Self::at(kind, storage, blob_ref, Utc::now())
    }

    pub fn upload(storage: StorageId, blob_ref: BlobRef) -> Self {
        Self::now(BlobEventKind::Upload, storage, blob_ref)
    }

    pub fn delete(storage: StorageId, blob_ref: BlobRef) -> Self {
        Self::now(BlobEventKind::Delete, storage, blob_ref)
    }

    pub fn update_attributes(storage: StorageId, blob_ref: BlobRef) -> Self {
        Self::now(BlobEventKind::UpdateAttributes, storage, blob_ref)
    }

    pub fn kind(&self) -> BlobEventKind {
        match self {
            Self::Upload { .. } => BlobEventKind::Upload,
            Self::Delete { .. } => BlobEventKind::Delete,
            Self::UpdateAttributes { .. } => BlobEventKind::UpdateAttributes,
        }
    }

    /// The storage that published this event.
    pub fn storage(&self) -> &StorageId {
        match self {
            Self::Upload { storage, .. }
            | Self::Delete { storage, .. }
            | Self::UpdateAttributes { storage, .. } => storage,
        }
    }

    pub fn blob_ref(&self) -> &BlobRef {
        match self {
            Self::Upload { blob_ref, .. }
            | Self::Delete { blob_ref, .. }
            | Self::UpdateAttributes { blob_ref, .. } => blob_ref,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Upload { timestamp, .. }
            | Self::Delete { timestamp, .. }
            | Self::UpdateAttributes { timestamp, .. } => *timestamp,
        }
    }
}

impl fmt::Display for BlobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.kind(), self.storage(), self.blob_ref())
    }
}
