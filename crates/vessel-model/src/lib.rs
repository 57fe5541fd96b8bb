//! Immutable value types for Vessel.
//!
//! Every type here is constructed through a flat builder and never mutated
//! afterwards. To derive a modified copy, use [`Rebuild::with_changes`],
//! which round-trips a value through its builder.
//!
//! # Types
//!
//! - [`BlobObject`] -- metadata of a stored blob
//! - [`StoredBlobObject`] -- a [`BlobObject`] plus a lazily opened content stream
//! - [`StoreBlobRequest`] -- what a caller asks to store
//! - [`UpdateAttributesRequest`] -- attribute set/remove changes
//! - [`ContentSource`] -- opens a blob's bytes on demand

pub mod blob;
pub mod content;
pub mod error;
pub mod rebuild;
pub mod request;
pub mod stored;

pub use blob::{BlobObject, BlobObjectBuilder};
pub use content::{BytesSource, ContentReader, ContentSource};
pub use error::{ModelError, ModelResult};
pub use rebuild::Rebuild;
pub use request::{
    StoreBlobRequest, StoreBlobRequestBuilder, UpdateAttributesRequest,
    UpdateAttributesRequestBuilder, DEFAULT_CONTENT_TYPE,
};
pub use stored::{StoredBlobObject, StoredBlobObjectBuilder};
