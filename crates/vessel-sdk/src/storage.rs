use std::fmt;
use std::io::Read;
use std::sync::Arc;

use tracing::{debug, info, warn};
use vessel_events::{BlobEvent, EventRegistry, ListenerRegistry, NoopEventRegistry};
use vessel_keys::{KeyError, KeyGenerator, UuidKeyGenerator};
use vessel_model::{ContentSource, StoreBlobRequest, StoredBlobObject, UpdateAttributesRequest};
use vessel_policy::{BlobPolicyHandler, PolicyChain};
use vessel_store::{
    BackendMetadata, BlobBackend, FsBackend, InMemoryBackend, KeyAssignment, WriteSpec,
};
use vessel_types::{BlobRef, StorageId};

use crate::config::{BackendConfig, ConfigError, StorageConfig};
use crate::error::{Operation, StorageError, StorageResult};

/// Result of [`BlobStorage::remove_by_ref`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The blob was deleted and a Delete event published.
    Deleted,
    /// A policy handler refused; the backend was not touched.
    Denied,
}

impl DeleteOutcome {
    pub fn is_deleted(self) -> bool {
        self == Self::Deleted
    }
}

// ---------------------------------------------------------------------------
// BlobStorage
// ---------------------------------------------------------------------------

/// Backend-agnostic blob storage facade.
///
/// Every operation runs its steps in a fixed order: policy chain (pre),
/// backend I/O, object construction, policy chain (post), event. A failure
/// at any step stops the operation; no event is published for an operation
/// that did not complete.
///
/// The facade keeps no per-operation state and is `Send + Sync`; share it
/// behind an `Arc`.
pub struct BlobStorage {
    id: StorageId,
    backend: Arc<dyn BlobBackend>,
    keys: Arc<dyn KeyGenerator>,
    policies: Arc<PolicyChain>,
    events: Arc<dyn EventRegistry>,
}

impl BlobStorage {
    /// Start building a storage over `backend`.
    pub fn builder(backend: impl BlobBackend + 'static) -> BlobStorageBuilder {
        BlobStorageBuilder::new(Arc::new(backend))
    }

    /// Build a storage from configuration.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let id = StorageId::new(&config.name).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let backend: Arc<dyn BlobBackend> = match &config.backend {
            BackendConfig::Memory { backend_keys: false } => Arc::new(InMemoryBackend::new()),
            BackendConfig::Memory { backend_keys: true } => {
                Arc::new(InMemoryBackend::with_backend_keys())
            }
            BackendConfig::Fs { root } => {
                Arc::new(FsBackend::open(root).map_err(ConfigError::from)?)
            }
        };
        let policies = config.policy.build_chain().map_err(ConfigError::from)?;
        let events: Arc<dyn EventRegistry> = if config.events_enabled {
            Arc::new(ListenerRegistry::new())
        } else {
            Arc::new(NoopEventRegistry::new())
        };

        Ok(BlobStorageBuilder::new(backend)
            .id(id)
            .key_generator_arc(Arc::from(config.keys.build()))
            .policy_chain(Arc::new(policies))
            .event_registry(events)
            .build())
    }

    /// The storage id carried by published events.
    pub fn id(&self) -> &StorageId {
        &self.id
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    pub fn key_generator(&self) -> &Arc<dyn KeyGenerator> {
        &self.keys
    }

    /// The policy chain. Handlers may be added or removed at any time.
    pub fn policies(&self) -> &Arc<PolicyChain> {
        &self.policies
    }

    /// The event registry. Listeners may be added or removed at any time.
    pub fn events(&self) -> &Arc<dyn EventRegistry> {
        &self.events
    }

    // -- store --------------------------------------------------------------

    /// Store `content` as a new blob.
    ///
    /// The request is validated, passed through `before_store`, validated
    /// again, and written. The returned object reflects backend-confirmed
    /// metadata after `post_handle_blob`. If anything fails after the write,
    /// the written blob is deleted again and no event is published.
    pub fn store(
        &self,
        mut content: impl Read,
        request: StoreBlobRequest,
    ) -> StorageResult<StoredBlobObject> {
        request.validate()?;
        let request = self
            .policies
            .before_store(request)
            .map_err(|e| StorageError::policy(Operation::Store, e))?;
        request.validate()?;

        let key = match self.backend.key_assignment() {
            KeyAssignment::Caller => Some(self.next_key(&request)?),
            KeyAssignment::Backend => None,
        };

        let metadata = self
            .backend
            .write(key.as_ref(), &mut content, &WriteSpec::from(&request))
            .map_err(|e| StorageError::backend(key.as_ref(), e))?;
        let blob_ref = metadata.key.clone();

        let stored = match self.finish_store(&request, metadata) {
            Ok(stored) => stored,
            Err(e) => {
                self.rollback(&blob_ref, &e);
                return Err(e);
            }
        };

        self.events.publish(&BlobEvent::upload(self.id.clone(), blob_ref.clone()));
        info!(
            storage = %self.id,
            blob_ref = %blob_ref,
            size = stored.blob().size().unwrap_or_default(),
            "blob stored"
        );
        Ok(stored)
    }

    fn next_key(&self, request: &StoreBlobRequest) -> StorageResult<BlobRef> {
        let key = self.keys.create_key(Some(request.original_name()))?;
        let blob_ref = BlobRef::parse(&key).map_err(|e| KeyError::Failed(e.to_string()))?;
        debug!(storage = %self.id, blob_ref = %blob_ref, strategy = self.keys.name(), "key generated");
        Ok(blob_ref)
    }

    /// Steps after a successful write. Any error here triggers a rollback.
    fn finish_store(
        &self,
        request: &StoreBlobRequest,
        metadata: BackendMetadata,
    ) -> StorageResult<StoredBlobObject> {
        if let Some(declared) = request.declared_size() {
            if declared != metadata.size {
                return Err(StorageError::Validation(format!(
                    "declared size {declared} but backend stored {} bytes",
                    metadata.size
                )));
            }
        }
        let blob = self
            .backend
            .read(&metadata.key)
            .map_err(|e| StorageError::backend(Some(&metadata.key), e))?
            .ok_or_else(|| StorageError::NotFound(metadata.key.clone()))?;
        let stored = to_stored(&blob.metadata, blob.content)?;
        self.policies
            .post_handle_blob(stored)
            .map_err(|e| StorageError::policy(Operation::Store, e))
    }

    fn rollback(&self, blob_ref: &BlobRef, cause: &StorageError) {
        match self.backend.delete(blob_ref) {
            Ok(_) => warn!(
                storage = %self.id,
                blob_ref = %blob_ref,
                error = %cause,
                "store failed after write; blob removed"
            ),
            Err(e) => warn!(
                storage = %self.id,
                blob_ref = %blob_ref,
                error = %cause,
                rollback_error = %e,
                "store failed after write; blob could not be removed"
            ),
        }
    }

    // -- retrieve -----------------------------------------------------------

    /// Fetch a blob through the visibility path: `post_handle_blob`, then
    /// `after_retrieve`. A hidden blob, or one a handler denies, is `None`.
    fn visible(&self, blob_ref: &BlobRef) -> StorageResult<Option<StoredBlobObject>> {
        let Some(blob) = self
            .backend
            .read(blob_ref)
            .map_err(|e| StorageError::backend(Some(blob_ref), e))?
        else {
            return Ok(None);
        };
        let stored = to_stored(&blob.metadata, blob.content)?;

        let stored = match self.policies.post_handle_blob(stored) {
            Ok(stored) => stored,
            Err(e) if e.is_denied() => return Ok(self.hidden(blob_ref)),
            Err(e) => return Err(StorageError::policy(Operation::Retrieve, e)),
        };
        match self.policies.after_retrieve(&stored) {
            Ok(true) => Ok(Some(stored)),
            Ok(false) => Ok(self.hidden(blob_ref)),
            Err(e) if e.is_denied() => Ok(self.hidden(blob_ref)),
            Err(e) => Err(StorageError::policy(Operation::Retrieve, e)),
        }
    }

    fn hidden(&self, blob_ref: &BlobRef) -> Option<StoredBlobObject> {
        debug!(storage = %self.id, blob_ref = %blob_ref, "blob hidden by policy");
        None
    }

    /// Check whether a blob exists and is visible.
    ///
    /// With an empty policy chain this is a plain backend check and never
    /// reads the blob.
    pub fn exists_by_ref(&self, blob_ref: &BlobRef) -> StorageResult<bool> {
        let exists = self
            .backend
            .exists(blob_ref)
            .map_err(|e| StorageError::backend(Some(blob_ref), e))?;
        if !exists || self.policies.is_empty() {
            return Ok(exists);
        }
        Ok(self.visible(blob_ref)?.is_some())
    }

    /// Fetch a blob, failing with [`StorageError::NotFound`] if it is absent
    /// or hidden.
    pub fn get_by_ref(&self, blob_ref: &BlobRef) -> StorageResult<StoredBlobObject> {
        self.find_by_ref(blob_ref)?
            .ok_or_else(|| StorageError::NotFound(blob_ref.clone()))
    }

    /// Fetch a blob, returning `None` if it is absent or hidden.
    pub fn find_by_ref(&self, blob_ref: &BlobRef) -> StorageResult<Option<StoredBlobObject>> {
        self.visible(blob_ref)
    }

    // -- update -------------------------------------------------------------

    /// Apply attribute changes to a visible blob.
    ///
    /// If the policy chain leaves no changes, the backend is not touched, no
    /// event is published and the current object is returned.
    pub fn update_by_ref(
        &self,
        blob_ref: &BlobRef,
        request: UpdateAttributesRequest,
    ) -> StorageResult<StoredBlobObject> {
        let current = self
            .visible(blob_ref)?
            .ok_or_else(|| StorageError::NotFound(blob_ref.clone()))?;
        let request = self
            .policies
            .before_update(&current, request)
            .map_err(|e| StorageError::policy(Operation::Update, e))?;
        if request.is_empty() {
            debug!(
                storage = %self.id,
                blob_ref = %blob_ref,
                "no attribute changes left; update skipped"
            );
            return Ok(current);
        }

        let metadata = self
            .backend
            .update_metadata(blob_ref, request.changes())
            .map_err(|e| StorageError::backend(Some(blob_ref), e))?
            .ok_or_else(|| StorageError::NotFound(blob_ref.clone()))?;

        let updated = to_stored(&metadata, current.source().clone())?;
        let updated = self
            .policies
            .post_handle_blob(updated)
            .map_err(|e| StorageError::policy(Operation::Update, e))?;

        self.events
            .publish(&BlobEvent::update_attributes(self.id.clone(), blob_ref.clone()));
        info!(
            storage = %self.id,
            blob_ref = %blob_ref,
            changes = request.changes().len(),
            "blob attributes updated"
        );
        Ok(updated)
    }

    // -- delete -------------------------------------------------------------

    /// Delete a visible blob. Returns `false` if a policy refused.
    pub fn delete_by_ref(&self, blob_ref: &BlobRef) -> StorageResult<bool> {
        self.remove_by_ref(blob_ref).map(DeleteOutcome::is_deleted)
    }

    /// Delete a visible blob, reporting a policy refusal as
    /// [`DeleteOutcome::Denied`].
    pub fn remove_by_ref(&self, blob_ref: &BlobRef) -> StorageResult<DeleteOutcome> {
        let current = self
            .visible(blob_ref)?
            .ok_or_else(|| StorageError::NotFound(blob_ref.clone()))?;

        let allowed = match self.policies.before_delete(&current) {
            Ok(allowed) => allowed,
            Err(e) if e.is_denied() => false,
            Err(e) => return Err(StorageError::policy(Operation::Delete, e)),
        };
        if !allowed {
            debug!(storage = %self.id, blob_ref = %blob_ref, "delete denied by policy");
            return Ok(DeleteOutcome::Denied);
        }

        let deleted = self
            .backend
            .delete(blob_ref)
            .map_err(|e| StorageError::backend(Some(blob_ref), e))?;
        if !deleted {
            return Err(StorageError::NotFound(blob_ref.clone()));
        }

        self.events.publish(&BlobEvent::delete(self.id.clone(), blob_ref.clone()));
        info!(storage = %self.id, blob_ref = %blob_ref, "blob deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

/// Wrap backend metadata and a content source as a model object.
fn to_stored(
    metadata: &BackendMetadata,
    source: Arc<dyn ContentSource>,
) -> StorageResult<StoredBlobObject> {
    let mut builder = StoredBlobObject::builder();
    builder
        .blob()
        .original_name(metadata.original_name.clone())
        .stored_ref(metadata.key.clone())
        .content_type(metadata.content_type.clone())
        .uploaded_at(metadata.uploaded_at)
        .last_modified_at(metadata.last_modified_at)
        .size(Some(metadata.size))
        .attributes(metadata.attributes.clone());
    builder.source(source);
    Ok(builder.build()?)
}

impl fmt::Debug for BlobStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStorage")
            .field("id", &self.id)
            .field("backend", &self.backend.kind())
            .field("keys", &self.keys.name())
            .field("policies", &self.policies)
            .field("listeners", &self.events.listener_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BlobStorageBuilder
// ---------------------------------------------------------------------------

/// Builder for [`BlobStorage`].
///
/// Defaults: storage id `default`, UUIDv7 keys, an empty policy chain and a
/// [`ListenerRegistry`].
pub struct BlobStorageBuilder {
    id: StorageId,
    backend: Arc<dyn BlobBackend>,
    keys: Option<Arc<dyn KeyGenerator>>,
    policies: Option<Arc<PolicyChain>>,
    handlers: Vec<Arc<dyn BlobPolicyHandler>>,
    events: Option<Arc<dyn EventRegistry>>,
}

impl BlobStorageBuilder {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self {
            id: StorageId::default(),
            backend,
            keys: None,
            policies: None,
            handlers: Vec::new(),
            events: None,
        }
    }

    pub fn id(mut self, id: StorageId) -> Self {
        self.id = id;
        self
    }

    pub fn key_generator(self, keys: impl KeyGenerator + 'static) -> Self {
        self.key_generator_arc(Arc::new(keys))
    }

    pub fn key_generator_arc(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Use an existing (possibly shared) chain.
    pub fn policy_chain(mut self, chain: Arc<PolicyChain>) -> Self {
        self.policies = Some(chain);
        self
    }

    /// Append a handler to the chain.
    pub fn policy_handler(mut self, handler: impl BlobPolicyHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn event_registry(mut self, events: Arc<dyn EventRegistry>) -> Self {
        self.events = Some(events);
        self
    }

    /// Drop all events.
    pub fn events_disabled(self) -> Self {
        self.event_registry(Arc::new(NoopEventRegistry::new()))
    }

    pub fn build(self) -> BlobStorage {
        let policies = self.policies.unwrap_or_default();
        for handler in self.handlers {
            policies.add_handler(handler);
        }
        let storage = BlobStorage {
            id: self.id,
            backend: self.backend,
            keys: self.keys.unwrap_or_else(|| Arc::new(UuidKeyGenerator)),
            policies,
            events: self
                .events
                .unwrap_or_else(|| Arc::new(ListenerRegistry::new())),
        };
        info!(
            storage = %storage.id,
            backend = storage.backend.kind(),
            keys = storage.keys.name(),
            handlers = storage.policies.len(),
            "storage ready"
        );
        storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::{self, Cursor};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::thread;

    use vessel_events::{BlobEventKind, BlobEventListener, KindListener, ListenerResult};
    use vessel_keys::{CompositeKeyGenerator, NameKeyGenerator, SequentialKeyGenerator};
    use vessel_model::Rebuild;
    use vessel_policy::{
        AttributeInjector, AttributeMatch, AttributeRedactor, PolicyError, PolicyResult,
        PolicyRule, ProtectedAttributes, RulePolicyHandler,
    };
    use vessel_store::{BackendBlob, BackendError, BackendResult};
    use vessel_types::{AttributeDiff, Attributes};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn request(name: &str) -> StoreBlobRequest {
        StoreBlobRequest::builder()
            .original_name(name)
            .content_type("text/plain")
            .attribute("owner", "u1")
            .build()
            .unwrap()
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().copied().collect()
    }

    /// Records every event.
    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<BlobEvent>>,
    }

    impl EventLog {
        fn kinds(&self) -> Vec<BlobEventKind> {
            self.events.lock().unwrap().iter().map(BlobEvent::kind).collect()
        }
    }

    impl BlobEventListener for EventLog {
        fn supports_event_type(&self, _kind: BlobEventKind) -> bool {
            true
        }

        fn on_event(&self, event: &BlobEvent) -> ListenerResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn storage_with_log(builder: BlobStorageBuilder) -> (BlobStorage, Arc<EventLog>) {
        let storage = builder.build();
        let log = Arc::new(EventLog::default());
        storage.events().add_listener(log.clone());
        (storage, log)
    }

    fn memory() -> BlobStorageBuilder {
        BlobStorage::builder(InMemoryBackend::new())
    }

    /// Wraps the in-memory backend with switchable failures.
    #[derive(Default)]
    struct FlakyBackend {
        inner: InMemoryBackend,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
        fail_deletes: AtomicBool,
    }

    fn io_error() -> BackendError {
        BackendError::Io(io::Error::new(io::ErrorKind::Other, "injected"))
    }

    impl BlobBackend for FlakyBackend {
        fn kind(&self) -> &'static str {
            "flaky"
        }

        fn write(
            &self,
            key: Option<&BlobRef>,
            content: &mut dyn Read,
            spec: &WriteSpec,
        ) -> BackendResult<BackendMetadata> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io_error());
            }
            self.inner.write(key, content, spec)
        }

        fn read(&self, key: &BlobRef) -> BackendResult<Option<BackendBlob>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(io_error());
            }
            self.inner.read(key)
        }

        fn exists(&self, key: &BlobRef) -> BackendResult<bool> {
            self.inner.exists(key)
        }

        fn delete(&self, key: &BlobRef) -> BackendResult<bool> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(io_error());
            }
            self.inner.delete(key)
        }

        fn update_metadata(
            &self,
            key: &BlobRef,
            diff: &AttributeDiff,
        ) -> BackendResult<Option<BackendMetadata>> {
            self.inner.update_metadata(key, diff)
        }
    }

    /// Fails `post_handle_blob` with a non-denial error while armed.
    struct BrokenPostHandler {
        armed: AtomicBool,
    }

    impl BlobPolicyHandler for BrokenPostHandler {
        fn name(&self) -> &str {
            "broken"
        }

        fn post_handle_blob(&self, stored: StoredBlobObject) -> PolicyResult<StoredBlobObject> {
            if self.armed.load(Ordering::SeqCst) {
                return Err(PolicyError::handler("broken", "boom"));
            }
            Ok(stored)
        }
    }

    // -----------------------------------------------------------------------
    // Store & retrieve
    // -----------------------------------------------------------------------

    #[test]
    fn store_then_get_roundtrip() {
        let (storage, log) = storage_with_log(memory());
        let stored = storage.store(&b"hello"[..], request("a.txt")).unwrap();
        let blob_ref = stored.blob().stored_ref().clone();

        let fetched = storage.get_by_ref(&blob_ref).unwrap();
        assert_eq!(fetched.blob().original_name(), "a.txt");
        assert_eq!(fetched.blob().content_type(), "text/plain");
        assert_eq!(fetched.blob().attributes(), &attrs(&[("owner", "u1")]));
        assert_eq!(fetched.blob().size(), Some(5));
        assert_eq!(fetched.read_to_vec().unwrap(), b"hello");
        assert_eq!(fetched, stored);

        assert_eq!(log.kinds(), vec![BlobEventKind::Upload]);
        let events = log.events.lock().unwrap();
        assert_eq!(events[0].blob_ref(), &blob_ref);
        assert_eq!(events[0].storage(), storage.id());
    }

    #[test]
    fn missing_blob_is_not_found() {
        let storage = memory().build();
        let r = BlobRef::new("nope");
        assert!(storage.get_by_ref(&r).unwrap_err().is_not_found());
        assert!(storage.find_by_ref(&r).unwrap().is_none());
        assert!(!storage.exists_by_ref(&r).unwrap());
        assert!(storage.delete_by_ref(&r).unwrap_err().is_not_found());
        let update = UpdateAttributesRequest::builder().set("a", "1").build().unwrap();
        assert!(storage.update_by_ref(&r, update).unwrap_err().is_not_found());
    }

    #[test]
    fn keys_come_from_the_generator() {
        let keys = CompositeKeyGenerator::new()
            .with(SequentialKeyGenerator::new(1, 1).with_width(3))
            .with(NameKeyGenerator);
        let storage = memory().key_generator(keys).build();
        let a = storage.store(&b"1"[..], request("a.txt")).unwrap();
        let b = storage.store(&b"2"[..], request("b.txt")).unwrap();
        assert_eq!(a.blob().stored_ref().as_str(), "001/a.txt");
        assert_eq!(b.blob().stored_ref().as_str(), "002/b.txt");
    }

    #[test]
    fn backend_assigned_keys_skip_the_generator() {
        let storage = BlobStorage::builder(InMemoryBackend::with_backend_keys())
            .key_generator(vessel_keys::DelegatingKeyGenerator::new("never", |_| {
                Err(KeyError::Failed("should not be called".into()))
            }))
            .build();
        let stored = storage.store(&b"x"[..], request("a.txt")).unwrap();
        assert_eq!(stored.blob().stored_ref().as_str(), "mem-1");
    }

    #[test]
    fn key_generation_failure_stores_nothing() {
        let backend = Arc::new(InMemoryBackend::new());
        let (storage, log) = storage_with_log(
            BlobStorage::builder(backend.clone())
                .key_generator(vessel_keys::DelegatingKeyGenerator::new("broken", |_| {
                    Err(KeyError::Failed("nope".into()))
                })),
        );
        let err = storage.store(&b"x"[..], request("a.txt")).unwrap_err();
        assert!(matches!(err, StorageError::KeyGeneration(_)));
        assert!(backend.is_empty());
        assert!(log.kinds().is_empty());
    }

    #[test]
    fn declared_size_mismatch_is_validation_error() {
        let backend = Arc::new(InMemoryBackend::new());
        let (storage, log) = storage_with_log(BlobStorage::builder(backend.clone()));
        let req = request("a.txt")
            .with_changes(|b| {
                b.declared_size(Some(99));
            })
            .unwrap();
        let err = storage.store(&b"abc"[..], req).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert!(backend.is_empty());
        assert!(log.kinds().is_empty());
    }

    #[test]
    fn store_reads_from_any_reader() {
        let storage = memory().build();
        let stored = storage
            .store(Cursor::new(vec![7u8; 1000]), request("big.bin"))
            .unwrap();
        assert_eq!(stored.blob().size(), Some(1000));
    }

    // -----------------------------------------------------------------------
    // Policy interaction
    // -----------------------------------------------------------------------

    #[test]
    fn injector_and_redactor_scenario() {
        let backend = Arc::new(InMemoryBackend::new());
        let storage = BlobStorage::builder(backend.clone())
            .policy_handler(AttributeInjector::new([("tenant", "t1")]))
            .build();
        let stored = storage.store(&b"hi"[..], request("a.txt")).unwrap();
        let blob_ref = stored.blob().stored_ref().clone();
        assert_eq!(
            stored.blob().attributes(),
            &attrs(&[("owner", "u1"), ("tenant", "t1")])
        );

        storage
            .policies()
            .add_handler(Arc::new(AttributeRedactor::new(["tenant"])));
        let fetched = storage.get_by_ref(&blob_ref).unwrap();
        assert_eq!(fetched.blob().attributes(), &attrs(&[("owner", "u1")]));

        // The backend still has both.
        let raw = backend.read(&blob_ref).unwrap().unwrap();
        assert_eq!(raw.metadata.attributes.get("tenant"), Some("t1"));
    }

    #[test]
    fn store_denial_never_reaches_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let (storage, log) = storage_with_log(BlobStorage::builder(backend.clone()).policy_handler(
            RulePolicyHandler::new(
                "rules",
                vec![PolicyRule::AllowedContentTypes {
                    types: vec!["image/*".into()],
                }],
            )
            .unwrap(),
        ));
        let err = storage.store(&b"hi"[..], request("a.txt")).unwrap_err();
        assert!(matches!(
            err,
            StorageError::PolicyDenied {
                operation: Operation::Store,
                ..
            }
        ));
        assert!(backend.is_empty());
        assert!(log.kinds().is_empty());
    }

    #[test]
    fn invalid_rewrite_is_validation_error() {
        struct Blanker;
        impl BlobPolicyHandler for Blanker {
            fn name(&self) -> &str {
                "blanker"
            }
            fn before_store(&self, request: StoreBlobRequest) -> PolicyResult<StoreBlobRequest> {
                let mut builder = request.to_builder();
                builder.attributes_mut().insert("", "x");
                builder.build().map_err(PolicyError::from)
            }
        }
        let storage = memory().policy_handler(Blanker).build();
        let err = storage.store(&b"hi"[..], request("a.txt")).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn hidden_blob_is_not_found_everywhere() {
        let (storage, log) = storage_with_log(memory().policy_handler(
            RulePolicyHandler::new(
                "rules",
                vec![PolicyRule::HideWhen(AttributeMatch::key_value(
                    "status", "quarantined",
                ))],
            )
            .unwrap(),
        ));
        let req = request("a.txt")
            .with_changes(|b| {
                b.attribute("status", "quarantined");
            })
            .unwrap();
        let stored = storage.store(&b"hi"[..], req).unwrap();
        let r = stored.blob().stored_ref().clone();

        assert!(storage.find_by_ref(&r).unwrap().is_none());
        assert!(storage.get_by_ref(&r).unwrap_err().is_not_found());
        assert!(!storage.exists_by_ref(&r).unwrap());
        assert!(storage.delete_by_ref(&r).unwrap_err().is_not_found());
        // Store still published its event; nothing else did.
        assert_eq!(log.kinds(), vec![BlobEventKind::Upload]);
        assert!(storage.backend().exists(&r).unwrap());
    }

    #[test]
    fn denied_delete_returns_false_and_keeps_blob() {
        let (storage, log) = storage_with_log(memory().policy_handler(
            RulePolicyHandler::new(
                "rules",
                vec![PolicyRule::DenyDeleteWhen(AttributeMatch::key("legal-hold"))],
            )
            .unwrap(),
        ));
        let req = request("a.txt")
            .with_changes(|b| {
                b.attribute("legal-hold", "yes");
            })
            .unwrap();
        let r = storage
            .store(&b"hi"[..], req)
            .unwrap()
            .blob()
            .stored_ref()
            .clone();

        assert!(!storage.delete_by_ref(&r).unwrap());
        assert_eq!(storage.remove_by_ref(&r).unwrap(), DeleteOutcome::Denied);
        assert!(storage.get_by_ref(&r).is_ok());
        assert_eq!(log.kinds(), vec![BlobEventKind::Upload]);
    }

    #[test]
    fn delete_publishes_event_and_removes_blob() {
        let (storage, log) = storage_with_log(memory());
        let r = storage
            .store(&b"hi"[..], request("a.txt"))
            .unwrap()
            .blob()
            .stored_ref()
            .clone();
        assert!(storage.delete_by_ref(&r).unwrap());
        assert!(!storage.exists_by_ref(&r).unwrap());
        assert_eq!(log.kinds(), vec![BlobEventKind::Upload, BlobEventKind::Delete]);
    }

    #[test]
    fn update_applies_filtered_changes() {
        let (storage, log) = storage_with_log(
            memory()
                .policy_handler(AttributeInjector::new([("tenant", "t1")]))
                .policy_handler(ProtectedAttributes::new(["tenant"])),
        );
        let r = storage
            .store(&b"hi"[..], request("a.txt"))
            .unwrap()
            .blob()
            .stored_ref()
            .clone();

        let update = UpdateAttributesRequest::builder()
            .set("tenant", "t2")
            .set("tag", "blue")
            .remove("owner")
            .build()
            .unwrap();
        let updated = storage.update_by_ref(&r, update).unwrap();
        assert_eq!(
            updated.blob().attributes(),
            &attrs(&[("tenant", "t1"), ("tag", "blue")])
        );
        assert!(updated.blob().last_modified_at() >= updated.blob().uploaded_at());
        assert_eq!(updated.read_to_vec().unwrap(), b"hi");
        assert_eq!(
            log.kinds(),
            vec![BlobEventKind::Upload, BlobEventKind::UpdateAttributes]
        );
    }

    #[test]
    fn fully_stripped_update_is_a_no_op() {
        let backend = Arc::new(InMemoryBackend::new());
        let (storage, log) = storage_with_log(
            BlobStorage::builder(backend.clone()).policy_handler(ProtectedAttributes::new(["owner"])),
        );
        let r = storage
            .store(&b"hi"[..], request("a.txt"))
            .unwrap()
            .blob()
            .stored_ref()
            .clone();
        let modified = backend.read(&r).unwrap().unwrap().metadata.last_modified_at;

        let update = UpdateAttributesRequest::builder()
            .set("Owner", "u2")
            .build()
            .unwrap();
        let out = storage.update_by_ref(&r, update).unwrap();
        assert_eq!(out.blob().attribute("owner"), Some("u1"));
        assert_eq!(
            backend.read(&r).unwrap().unwrap().metadata.last_modified_at,
            modified
        );
        assert_eq!(log.kinds(), vec![BlobEventKind::Upload]);
    }

    #[test]
    fn update_denial_is_reported() {
        let (storage, log) = storage_with_log(
            memory().policy_handler(ProtectedAttributes::new(["owner"]).deny(true)),
        );
        let r = storage
            .store(&b"hi"[..], request("a.txt"))
            .unwrap()
            .blob()
            .stored_ref()
            .clone();
        let update = UpdateAttributesRequest::builder()
            .set("owner", "u2")
            .build()
            .unwrap();
        let err = storage.update_by_ref(&r, update).unwrap_err();
        assert!(matches!(
            err,
            StorageError::PolicyDenied {
                operation: Operation::Update,
                ..
            }
        ));
        assert_eq!(
            storage.get_by_ref(&r).unwrap().blob().attribute("owner"),
            Some("u1")
        );
        assert_eq!(log.kinds(), vec![BlobEventKind::Upload]);
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    #[test]
    fn backend_write_failure_is_store_failure() {
        let backend = Arc::new(FlakyBackend::default());
        backend.fail_writes.store(true, Ordering::SeqCst);
        let (storage, log) = storage_with_log(BlobStorage::builder(backend.clone()));
        let err = storage.store(&b"hi"[..], request("a.txt")).unwrap_err();
        match err {
            StorageError::StoreFailure { blob_ref, source } => {
                assert!(blob_ref.is_some());
                assert!(matches!(source, BackendError::Io(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(log.kinds().is_empty());
    }

    #[test]
    fn unusable_ref_on_fs_backend_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, log) =
            storage_with_log(BlobStorage::builder(FsBackend::open(dir.path()).unwrap()));
        storage.store(&b"hi"[..], request("a.txt")).unwrap();
        let update = UpdateAttributesRequest::builder().set("a", "1").build().unwrap();

        for raw in ["../x", "a//b", "./a"] {
            let r = BlobRef::new(raw);
            assert!(storage.get_by_ref(&r).unwrap_err().is_not_found(), "{raw:?}");
            assert!(storage.find_by_ref(&r).unwrap().is_none(), "{raw:?}");
            assert!(!storage.exists_by_ref(&r).unwrap(), "{raw:?}");
            assert!(storage.delete_by_ref(&r).unwrap_err().is_not_found(), "{raw:?}");
            assert!(
                storage.update_by_ref(&r, update.clone()).unwrap_err().is_not_found(),
                "{raw:?}"
            );
        }
        assert_eq!(log.kinds(), vec![BlobEventKind::Upload]);
    }

    #[test]
    fn backend_read_failure_is_not_conflated_with_absence() {
        let backend = Arc::new(FlakyBackend::default());
        let storage = BlobStorage::builder(backend.clone()).build();
        let r = storage
            .store(&b"hi"[..], request("a.txt"))
            .unwrap()
            .blob()
            .stored_ref()
            .clone();
        backend.fail_reads.store(true, Ordering::SeqCst);
        assert!(matches!(
            storage.get_by_ref(&r),
            Err(StorageError::StoreFailure { .. })
        ));
        assert!(matches!(
            storage.find_by_ref(&r),
            Err(StorageError::StoreFailure { .. })
        ));
    }

    #[test]
    fn failure_after_write_rolls_back() {
        let backend = Arc::new(FlakyBackend::default());
        let broken = Arc::new(BrokenPostHandler {
            armed: AtomicBool::new(true),
        });
        let (storage, log) = storage_with_log(BlobStorage::builder(backend.clone()));
        storage.policies().add_handler(broken.clone());

        let err = storage.store(&b"hi"[..], request("a.txt")).unwrap_err();
        assert!(matches!(err, StorageError::Policy(_)));
        assert!(backend.inner.is_empty());
        assert!(log.kinds().is_empty());
    }

    #[test]
    fn failed_rollback_still_reports_original_error() {
        let backend = Arc::new(FlakyBackend::default());
        backend.fail_deletes.store(true, Ordering::SeqCst);
        let storage = BlobStorage::builder(backend.clone())
            .policy_handler(BrokenPostHandler {
                armed: AtomicBool::new(true),
            })
            .build();
        let err = storage.store(&b"hi"[..], request("a.txt")).unwrap_err();
        assert!(matches!(err, StorageError::Policy(_)));
        assert_eq!(backend.inner.len(), 1);
    }

    #[test]
    fn failing_listener_does_not_fail_operation() {
        let storage = memory().build();
        storage.events().add_listener(Arc::new(KindListener::new(
            "broken",
            BlobEventKind::Upload,
            |_| panic!("listener bug"),
        )));
        assert!(storage.store(&b"hi"[..], request("a.txt")).is_ok());
    }

    // -----------------------------------------------------------------------
    // Events & configuration
    // -----------------------------------------------------------------------

    #[test]
    fn removed_listener_misses_later_events() {
        let storage = memory().build();
        let log = Arc::new(EventLog::default());
        let listener: Arc<dyn BlobEventListener> = log.clone();
        storage.events().add_listener(listener.clone());
        storage.store(&b"1"[..], request("a.txt")).unwrap();
        storage.events().remove_listener(&listener);
        storage.store(&b"2"[..], request("b.txt")).unwrap();
        assert_eq!(log.kinds(), vec![BlobEventKind::Upload]);
    }

    #[test]
    fn disabled_events_are_dropped() {
        let (storage, log) = storage_with_log(memory().events_disabled());
        storage.store(&b"1"[..], request("a.txt")).unwrap();
        assert!(log.kinds().is_empty());
        assert_eq!(storage.events().listener_count(), 0);
    }

    #[test]
    fn from_config_wires_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::from_toml_str(&format!(
            r#"
            name = "media"

            [backend]
            kind = "fs"
            root = "{}"

            [keys]
            kind = "sequential"
            width = 4

            [policy]
            redact = ["tenant"]

            [policy.inject]
            tenant = "t1"
            "#,
            dir.path().display().to_string().replace('\\', "/")
        ))
        .unwrap();
        let (storage, log) = {
            let storage = BlobStorage::from_config(&config).unwrap();
            let log = Arc::new(EventLog::default());
            storage.events().add_listener(log.clone());
            (storage, log)
        };

        let stored = storage.store(&b"hello"[..], request("a.txt")).unwrap();
        assert_eq!(stored.blob().stored_ref().as_str(), "0001");
        assert!(stored.blob().attribute("tenant").is_none());
        assert_eq!(storage.id().as_str(), "media");
        assert_eq!(storage.backend().kind(), "fs");
        assert!(dir.path().join("data/0001").is_file());
        assert_eq!(
            storage.get_by_ref(stored.blob().stored_ref()).unwrap().read_to_vec().unwrap(),
            b"hello"
        );
        assert_eq!(log.events.lock().unwrap()[0].storage().as_str(), "media");
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_stores_get_distinct_keys() {
        let storage = memory()
            .key_generator(SequentialKeyGenerator::new(1, 1))
            .build();
        thread::scope(|s| {
            for t in 0..4 {
                let storage = &storage;
                s.spawn(move || {
                    for i in 0..25 {
                        storage
                            .store(&b"x"[..], request(&format!("{t}-{i}.txt")))
                            .unwrap();
                    }
                });
            }
        });
        for n in 1..=100 {
            assert!(storage.exists_by_ref(&BlobRef::new(n.to_string())).unwrap());
        }
    }

    // -----------------------------------------------------------------------
    // Round-trip property
    // -----------------------------------------------------------------------

    fn content_types() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-z0-9][a-z0-9.+-]{0,12}").prop_map(|(t, s)| format!("{t}/{s}"))
    }

    proptest! {
        #[test]
        fn store_then_get_preserves_request(
            name in "[A-Za-z0-9_][A-Za-z0-9_. -]{0,24}",
            content_type in content_types(),
            pairs in prop::collection::vec(("[a-zA-Z][a-zA-Z0-9-]{0,8}", ".{0,12}"), 0..6),
            payload in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let mut builder = StoreBlobRequest::builder();
            builder.original_name(name.clone()).content_type(content_type.clone());
            for (key, value) in &pairs {
                builder.attribute(key.clone(), value.clone());
            }
            let request = builder.build().unwrap();
            let expected = request.attributes().clone();

            let storage = memory().build();
            let stored = storage.store(&payload[..], request).unwrap();
            let fetched = storage.get_by_ref(stored.blob().stored_ref()).unwrap();

            prop_assert_eq!(fetched.blob().original_name(), name.as_str());
            prop_assert_eq!(fetched.blob().content_type(), content_type.as_str());
            prop_assert_eq!(fetched.blob().attributes(), &expected);
            for (key, value) in expected.iter() {
                prop_assert_eq!(fetched.blob().attribute(&key.to_uppercase()), Some(value));
                prop_assert_eq!(fetched.blob().attribute(&key.to_lowercase()), Some(value));
            }
            prop_assert_eq!(fetched.blob().size(), Some(payload.len() as u64));
            prop_assert_eq!(fetched.read_to_vec().unwrap(), payload);
        }
    }
}
