use std::fmt;

use vessel_keys::KeyError;
use vessel_model::ModelError;
use vessel_policy::PolicyError;
use vessel_store::BackendError;
use vessel_types::BlobRef;

use crate::config::ConfigError;

/// The facade operation an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Store,
    Retrieve,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Store => "store",
            Self::Retrieve => "retrieve",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

fn describe_ref(blob_ref: &Option<BlobRef>) -> String {
    blob_ref
        .as_ref()
        .map(|r| format!(" on {r}"))
        .unwrap_or_default()
}

/// Errors returned by [`BlobStorage`](crate::BlobStorage).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The blob does not exist or is not visible to the caller.
    #[error("blob not found: {0}")]
    NotFound(BlobRef),

    /// The backend failed. `blob_ref` is `None` when the backend assigns
    /// keys and failed before assigning one.
    #[error("backend failure{}: {source}", describe_ref(.blob_ref))]
    StoreFailure {
        blob_ref: Option<BlobRef>,
        #[source]
        source: BackendError,
    },

    /// A policy handler refused the operation.
    #[error("{operation} denied: {reason}")]
    PolicyDenied { operation: Operation, reason: String },

    /// The request is malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The key strategy could not produce a key.
    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] KeyError),

    /// A policy handler failed for a reason other than denial.
    #[error("policy error: {0}")]
    Policy(PolicyError),

    /// The storage could not be built from its configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StorageError {
    /// Wrap a backend error, lifting size mismatches to validation errors.
    pub(crate) fn backend(blob_ref: Option<&BlobRef>, source: BackendError) -> Self {
        match source {
            BackendError::SizeMismatch { declared, actual } => Self::Validation(format!(
                "declared size {declared} but received {actual} bytes"
            )),
            source => Self::StoreFailure {
                blob_ref: blob_ref.cloned(),
                source,
            },
        }
    }

    /// Attach operation context to a policy error.
    pub(crate) fn policy(operation: Operation, error: PolicyError) -> Self {
        match error {
            PolicyError::Denied { handler, reason } => Self::PolicyDenied {
                operation,
                reason: format!("{handler}: {reason}"),
            },
            PolicyError::Model(e) => Self::Validation(e.to_string()),
            other => Self::Policy(other),
        }
    }

    /// Returns `true` for [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for [`StorageError::PolicyDenied`].
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::PolicyDenied { .. })
    }
}

impl From<ModelError> for StorageError {
    fn from(e: ModelError) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
