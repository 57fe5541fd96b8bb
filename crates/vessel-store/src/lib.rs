//! Backend port for Vessel blob storage.
//!
//! The storage facade never touches bytes or files itself; it talks to a
//! [`BlobBackend`]. A backend owns its key space, its wire protocol or file
//! layout, and any timeout behavior of its I/O calls.
//!
//! # Drivers
//!
//! - [`InMemoryBackend`] -- `HashMap`-based store for tests and embedding
//! - [`FsBackend`] -- one data file plus a JSON metadata sidecar per blob
//!
//! # Rules
//!
//! 1. A key, once written, names the same blob until it is deleted.
//! 2. `write` either persists both content and metadata or nothing.
//! 3. Content is exposed as a [`ContentSource`](vessel_model::ContentSource)
//!    and read only when the caller opens it.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use fs::FsBackend;
pub use memory::InMemoryBackend;
pub use traits::{BackendBlob, BackendMetadata, BlobBackend, KeyAssignment, WriteSpec};
