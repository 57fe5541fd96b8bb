use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::debug;
use vessel_model::{StoreBlobRequest, StoredBlobObject, UpdateAttributesRequest};

use crate::error::PolicyResult;
use crate::handler::BlobPolicyHandler;

type HandlerList = Arc<Vec<Arc<dyn BlobPolicyHandler>>>;

fn same_handler(a: &Arc<dyn BlobPolicyHandler>, b: &Arc<dyn BlobPolicyHandler>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// An ordered pipeline of policy handlers.
///
/// The handler list is copy-on-write: each hook runs against a snapshot
/// taken under a short read lock, so handlers added or removed while an
/// operation is in flight only affect later operations.
///
/// A `PolicyChain` is itself a [`BlobPolicyHandler`], so chains nest.
#[derive(Default)]
pub struct PolicyChain {
    handlers: RwLock<HandlerList>,
}

impl PolicyChain {
    /// Create an empty chain. An empty chain passes everything through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chain from handlers, in order.
    pub fn with_handlers(handlers: impl IntoIterator<Item = Arc<dyn BlobPolicyHandler>>) -> Self {
        Self {
            handlers: RwLock::new(Arc::new(handlers.into_iter().collect())),
        }
    }

    /// Append a handler to the end of the chain.
    pub fn add_handler(&self, handler: Arc<dyn BlobPolicyHandler>) {
        let mut guard = self.handlers.write().expect("lock poisoned");
        let mut next: Vec<_> = guard.iter().cloned().collect();
        debug!(handler = handler.name(), position = next.len(), "policy handler added");
        next.push(handler);
        *guard = Arc::new(next);
    }

    /// Remove a handler instance. Returns `false` if it was not in the chain.
    pub fn remove_handler(&self, handler: &Arc<dyn BlobPolicyHandler>) -> bool {
        let mut guard = self.handlers.write().expect("lock poisoned");
        let Some(pos) = guard.iter().position(|h| same_handler(h, handler)) else {
            return false;
        };
        let mut next: Vec<_> = guard.iter().cloned().collect();
        next.remove(pos);
        *guard = Arc::new(next);
        true
    }

    /// Number of handlers in the chain.
    pub fn len(&self) -> usize {
        self.handlers.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().expect("lock poisoned").is_empty()
    }

    /// Handler names, in order.
    pub fn handler_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|h| h.name().to_string()).collect()
    }

    fn snapshot(&self) -> HandlerList {
        self.handlers.read().expect("lock poisoned").clone()
    }

    /// Run `before_store` through every handler.
    pub fn before_store(&self, request: StoreBlobRequest) -> PolicyResult<StoreBlobRequest> {
        self.snapshot()
            .iter()
            .try_fold(request, |request, h| h.before_store(request))
    }

    /// Run `post_handle_blob` through every handler.
    pub fn post_handle_blob(&self, stored: StoredBlobObject) -> PolicyResult<StoredBlobObject> {
        self.snapshot()
            .iter()
            .try_fold(stored, |stored, h| h.post_handle_blob(stored))
    }

    /// Returns `false` as soon as one handler hides the blob.
    pub fn after_retrieve(&self, stored: &StoredBlobObject) -> PolicyResult<bool> {
        for h in self.snapshot().iter() {
            if !h.after_retrieve(stored)? {
                debug!(handler = h.name(), blob_ref = %stored.blob().stored_ref(), "blob hidden");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run `before_update` through every handler.
    pub fn before_update(
        &self,
        stored: &StoredBlobObject,
        request: UpdateAttributesRequest,
    ) -> PolicyResult<UpdateAttributesRequest> {
        self.snapshot()
            .iter()
            .try_fold(request, |request, h| h.before_update(stored, request))
    }

    /// Returns `false` as soon as one handler refuses the delete.
    pub fn before_delete(&self, stored: &StoredBlobObject) -> PolicyResult<bool> {
        for h in self.snapshot().iter() {
            if !h.before_delete(stored)? {
                debug!(handler = h.name(), blob_ref = %stored.blob().stored_ref(), "delete refused");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl BlobPolicyHandler for PolicyChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn before_store(&self, request: StoreBlobRequest) -> PolicyResult<StoreBlobRequest> {
        PolicyChain::before_store(self, request)
    }

    fn post_handle_blob(&self, stored: StoredBlobObject) -> PolicyResult<StoredBlobObject> {
        PolicyChain::post_handle_blob(self, stored)
    }

    fn after_retrieve(&self, stored: &StoredBlobObject) -> PolicyResult<bool> {
        PolicyChain::after_retrieve(self, stored)
    }

    fn before_update(
        &self,
        stored: &StoredBlobObject,
        request: UpdateAttributesRequest,
    ) -> PolicyResult<UpdateAttributesRequest> {
        PolicyChain::before_update(self, stored, request)
    }

    fn before_delete(&self, stored: &StoredBlobObject) -> PolicyResult<bool> {
        PolicyChain::before_delete(self, stored)
    }
}

impl fmt::Debug for PolicyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyChain")
            .field("handlers", &self.handler_names())
            .finish()
    }
}
