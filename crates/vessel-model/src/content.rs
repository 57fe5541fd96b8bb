use std::fmt;
use std::io::{self, Cursor, Read};

use bytes::Bytes;

/// A readable blob content stream. Dropping it closes the stream.
pub type ContentReader = Box<dyn Read + Send>;

/// Opens a blob's content on demand.
///
/// Backends hand out a `ContentSource` instead of bytes so that retrieving
/// a blob's metadata never reads its payload. Each call to [`open`] returns
/// an independent reader owned by the caller.
///
/// [`open`]: ContentSource::open
pub trait ContentSource: Send + Sync {
    /// Open a fresh reader positioned at the start of the content.
    fn open(&self) -> io::Result<ContentReader>;
}

/// Content held in memory.
#[derive(Clone)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ContentSource for BytesSource {
    fn open(&self) -> io::Result<ContentReader> {
        // Bytes clones share the buffer; nothing is copied here.
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

impl fmt::Debug for BytesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytesSource")
            .field("len", &self.data.len())
            .finish()
    }
}
