//! High-level storage facade for Vessel.
//!
//! [`BlobStorage`] is the main entry point for applications. It ties
//! together a backend, a key generator, a policy chain and an event
//! registry, and runs every operation through them in a fixed order:
//! policy, backend, model, policy, event.
//!
//! ```rust
//! use vessel_sdk::{BlobStorage, StoreBlobRequest, InMemoryBackend};
//!
//! let storage = BlobStorage::builder(InMemoryBackend::new()).build();
//! let request = StoreBlobRequest::builder()
//!     .original_name("hello.txt")
//!     .content_type("text/plain")
//!     .build()
//!     .unwrap();
//! let stored = storage.store(&b"hello"[..], request).unwrap();
//!
//! let fetched = storage.get_by_ref(stored.blob().stored_ref()).unwrap();
//! assert_eq!(fetched.read_to_vec().unwrap(), b"hello");
//! ```

pub mod config;
pub mod error;
pub mod storage;

pub use config::{BackendConfig, ConfigError, StorageConfig};
pub use error::{Operation, StorageError, StorageResult};
pub use storage::{BlobStorage, BlobStorageBuilder, DeleteOutcome};

// Re-export the types callers need alongside the facade.
pub use vessel_events::{
    BlobEvent, BlobEventKind, BlobEventListener, EventFilter, EventRegistry, FilteredListener,
    KindListener, ListenerRegistry, LoggingListener, NoopEventRegistry,
};
pub use vessel_keys::{KeyGenerator, KeyStrategy};
pub use vessel_model::{
    BlobObject, Rebuild, StoreBlobRequest, StoredBlobObject, UpdateAttributesRequest,
};
pub use vessel_policy::{BlobPolicyHandler, PolicyChain, PolicyConfig};
pub use vessel_store::{BlobBackend, FsBackend, InMemoryBackend};
pub use vessel_types::{Attributes, BlobRef, StorageId};
