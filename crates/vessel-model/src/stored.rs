use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use crate::blob::{BlobObject, BlobObjectBuilder};
use crate::content::{ContentReader, ContentSource};
use crate::error::{ModelError, ModelResult};
use crate::rebuild::Rebuild;

/// A stored blob: its metadata plus a handle for reading the content.
///
/// The content is not read until [`open`](Self::open) is called, and every
/// call returns a new reader owned by the caller. The object itself holds
/// no open file or connection, so it is safe to cache.
#[derive(Clone)]
pub struct StoredBlobObject {
    blob: BlobObject,
    source: Arc<dyn ContentSource>,
}

impl StoredBlobObject {
    pub fn new(blob: BlobObject, source: Arc<dyn ContentSource>) -> Self {
        Self { blob, source }
    }

    /// Start building from scratch.
    pub fn builder() -> StoredBlobObjectBuilder {
        StoredBlobObjectBuilder::default()
    }

    /// The blob's metadata.
    pub fn blob(&self) -> &BlobObject {
        &self.blob
    }

    /// Drop the content handle and keep the metadata.
    pub fn into_blob(self) -> BlobObject {
        self.blob
    }

    /// The content handle, shareable with other objects for the same blob.
    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    /// Open the content for reading.
    pub fn open(&self) -> io::Result<ContentReader> {
        self.source.open()
    }

    /// Read the whole content into memory.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl PartialEq for StoredBlobObject {
    /// Two stored objects are equal when their metadata is equal; content
    /// handles are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.blob == other.blob
    }
}

impl fmt::Debug for StoredBlobObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredBlobObject")
            .field("blob", &self.blob)
            .finish_non_exhaustive()
    }
}

/// Flat builder for [`StoredBlobObject`].
///
/// Metadata fields are set through [`blob`](Self::blob); the content source
/// through [`source`](Self::source).
#[derive(Clone, Default)]
pub struct StoredBlobObjectBuilder {
    blob: BlobObjectBuilder,
    source: Option<Arc<dyn ContentSource>>,
}

impl StoredBlobObjectBuilder {
    /// Metadata builder.
    pub fn blob(&mut self) -> &mut BlobObjectBuilder {
        &mut self.blob
    }

    pub fn source(&mut self, source: Arc<dyn ContentSource>) -> &mut Self {
        self.source = Some(source);
        self
    }

    pub fn build(&self) -> ModelResult<StoredBlobObject> {
        let source = self
            .source
            .clone()
            .ok_or(ModelError::MissingField("source"))?;
        Ok(StoredBlobObject {
            blob: self.blob.build()?,
            source,
        })
    }
}

impl fmt::Debug for StoredBlobObjectBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredBlobObjectBuilder")
            .field("blob", &self.blob)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl Rebuild for StoredBlobObject {
    type Builder = StoredBlobObjectBuilder;

    fn to_builder(&self) -> StoredBlobObjectBuilder {
        StoredBlobObjectBuilder {
            blob: self.blob.to_builder(),
            source: Some(self.source.clone()),
        }
    }

    fn from_builder(builder: &StoredBlobObjectBuilder) -> ModelResult<Self> {
        builder.build()
    }
}
