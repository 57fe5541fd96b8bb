use vessel_model::{StoreBlobRequest, StoredBlobObject, UpdateAttributesRequest};

use crate::error::PolicyResult;

/// A pluggable interceptor around storage operations.
///
/// Every hook defaults to a pass-through, so a handler only implements the
/// hooks it cares about. Hooks take values by ownership where they may
/// return a rewritten copy; use [`Rebuild::with_changes`] to derive one.
///
/// Returning [`PolicyError::Denied`](crate::PolicyError::Denied) from
/// `before_store` or `before_update` aborts the operation with a denial.
/// The boolean hooks express visibility and permission instead: `false`
/// from `after_retrieve` makes the blob look absent, and `false` from
/// `before_delete` turns the delete into a no-op.
///
/// [`Rebuild::with_changes`]: vessel_model::Rebuild::with_changes
pub trait BlobPolicyHandler: Send + Sync {
    /// Short name used in logs and denial messages.
    fn name(&self) -> &str;

    /// Rewrite or deny a store request before the backend sees it.
    fn before_store(&self, request: StoreBlobRequest) -> PolicyResult<StoreBlobRequest> {
        Ok(request)
    }

    /// Transform a blob before it is handed to the caller.
    ///
    /// Runs after store, retrieve and update.
    fn post_handle_blob(&self, stored: StoredBlobObject) -> PolicyResult<StoredBlobObject> {
        Ok(stored)
    }

    /// Decide whether a retrieved blob is visible.
    fn after_retrieve(&self, _stored: &StoredBlobObject) -> PolicyResult<bool> {
        Ok(true)
    }

    /// Rewrite or deny an attribute update.
    fn before_update(
        &self,
        _stored: &StoredBlobObject,
        request: UpdateAttributesRequest,
    ) -> PolicyResult<UpdateAttributesRequest> {
        Ok(request)
    }

    /// Decide whether a blob may be deleted.
    fn before_delete(&self, _stored: &StoredBlobObject) -> PolicyResult<bool> {
        Ok(true)
    }
}
