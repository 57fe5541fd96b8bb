//! Local filesystem driver.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/data/<key>        blob content
//! <root>/meta/<key>.json   BackendMetadata sidecar
//! <root>/tmp/              staging area for atomic writes
//! ```
//!
//! Keys may contain `/`, which maps to subdirectories. A key cannot be both
//! a blob and a directory prefix of another blob. Writing `a` while `a/b`
//! exists is a [`BackendError::KeyConflict`]; writing `a/b` while `a` exists
//! fails with an I/O error. Either way the existing blob is left intact.
//!
//! Only [`write`](BlobBackend::write) rejects keys that are not a plain
//! relative path. Lookups treat such keys as absent, since no blob can be
//! stored under them.
//!
//! Every call blocks on local disk I/O. No timeout is applied.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use vessel_model::{ContentReader, ContentSource};
use vessel_types::{AttributeDiff, BlobRef};

use crate::error::{BackendError, BackendResult};
use crate::traits::{BackendBlob, BackendMetadata, BlobBackend, KeyAssignment, WriteSpec};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Opens a blob's data file when the caller asks for the content.
#[derive(Clone, Debug)]
struct FileSource {
    path: PathBuf,
}

impl ContentSource for FileSource {
    fn open(&self) -> io::Result<ContentReader> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Filesystem-backed blob store with caller-assigned keys.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    chunk_size: usize,
    // Serializes the check-then-persist sequences of write/update/delete.
    write_lock: Mutex<()>,
}

impl FsBackend {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();
        for dir in ["data", "meta", "tmp"] {
            fs::create_dir_all(root.join(dir))?;
        }
        info!(root = %root.display(), "filesystem backend opened");
        Ok(Self {
            root,
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_lock: Mutex::new(()),
        })
    }

    /// Use `chunk_size` bytes per read while copying content in.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject keys that are not a plain relative path.
    fn relative_path(key: &BlobRef) -> BackendResult<PathBuf> {
        let invalid = |reason: &str| BackendError::InvalidKey {
            key: key.clone(),
            reason: reason.to_string(),
        };
        let raw = key.as_str();
        if raw.is_empty() {
            return Err(invalid("empty key"));
        }
        if raw.contains('\\') || raw.contains('\0') {
            return Err(invalid("backslash or NUL in key"));
        }
        if raw.split('/').any(|seg| seg.is_empty()) {
            return Err(invalid("empty path segment"));
        }
        let path = PathBuf::from(raw);
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid("key must be a relative path without '.' or '..'"));
        }
        Ok(path)
    }

    fn data_path(&self, key: &BlobRef) -> BackendResult<PathBuf> {
        Ok(self.root.join("data").join(Self::relative_path(key)?))
    }

    fn meta_path(&self, key: &BlobRef) -> BackendResult<PathBuf> {
        let mut rel = Self::relative_path(key)?.into_os_string();
        rel.push(".json");
        Ok(self.root.join("meta").join(rel))
    }

    /// Sidecar path for a lookup, or `None` if no blob can have this key.
    fn lookup_meta_path(&self, key: &BlobRef) -> Option<PathBuf> {
        match self.meta_path(key) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(key = %key, error = %e, "lookup with unusable key");
                None
            }
        }
    }

    fn staging_file(&self) -> io::Result<NamedTempFile> {
        NamedTempFile::new_in(self.root.join("tmp"))
    }

    fn load_metadata(path: &Path) -> BackendResult<Option<BackendMetadata>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn persist_metadata(&self, path: &Path, metadata: &BackendMetadata) -> BackendResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.staging_file()?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), metadata)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
        Ok(())
    }

    /// Copy `content` into `out`, returning the byte count and BLAKE3 hex.
    fn copy_hashed(&self, content: &mut dyn Read, out: &mut File) -> io::Result<(u64, String)> {
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut size = 0u64;
        loop {
            let n = match content.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n])?;
            size += n as u64;
        }
        out.sync_all()?;
        Ok((size, hasher.finalize().to_hex().to_string()))
    }
}

impl BlobBackend for FsBackend {
    fn kind(&self) -> &'static str {
        "fs"
    }

    fn key_assignment(&self) -> KeyAssignment {
        KeyAssignment::Caller
    }

    fn write(
        &self,
        key: Option<&BlobRef>,
        content: &mut dyn Read,
        spec: &WriteSpec,
    ) -> BackendResult<BackendMetadata> {
        let key = key.ok_or(BackendError::KeyRequired)?;
        let data_path = self.data_path(key)?;
        let meta_path = self.meta_path(key)?;

        // Stage content outside the lock; only the publish step is serialized.
        let mut staged = self.staging_file()?;
        let (size, checksum) = self.copy_hashed(content, staged.as_file_mut())?;
        if let Some(declared) = spec.declared_size {
            if declared != size {
                return Err(BackendError::SizeMismatch {
                    declared,
                    actual: size,
                });
            }
        }

        let _guard = self.write_lock.lock().expect("lock poisoned");
        if meta_path.exists() || data_path.exists() {
            return Err(BackendError::KeyConflict(key.clone()));
        }
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent)?;
        }
        staged
            .persist(&data_path)
            .map_err(|e| BackendError::Io(e.error))?;

        let now = Utc::now();
        let metadata = BackendMetadata {
            key: key.clone(),
            original_name: spec.original_name.clone(),
            content_type: spec.content_type.clone(),
            size,
            uploaded_at: now,
            last_modified_at: now,
            attributes: spec.attributes.clone(),
            checksum: Some(checksum),
        };
        if let Err(e) = self.persist_metadata(&meta_path, &metadata) {
            if let Err(cleanup) = fs::remove_file(&data_path) {
                warn!(key = %key, error = %cleanup, "failed to remove orphaned data file");
            }
            return Err(e);
        }

        debug!(key = %key, size, "blob written to filesystem");
        Ok(metadata)
    }

    fn read(&self, key: &BlobRef) -> BackendResult<Option<BackendBlob>> {
        let Some(meta_path) = self.lookup_meta_path(key) else {
            return Ok(None);
        };
        let Some(metadata) = Self::load_metadata(&meta_path)? else {
            return Ok(None);
        };
        Ok(Some(BackendBlob {
            metadata,
            content: Arc::new(FileSource {
                path: self.data_path(key)?,
            }),
        }))
    }

    fn exists(&self, key: &BlobRef) -> BackendResult<bool> {
        Ok(self.lookup_meta_path(key).is_some_and(|path| path.is_file()))
    }

    fn delete(&self, key: &BlobRef) -> BackendResult<bool> {
        let Some(meta_path) = self.lookup_meta_path(key) else {
            return Ok(false);
        };
        let data_path = self.data_path(key)?;
        let _guard = self.write_lock.lock().expect("lock poisoned");

        // Metadata goes first: once it is gone the blob is invisible, even if
        // removing the data file fails below.
        match fs::remove_file(&meta_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(&data_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(key = %key, "data file already missing on delete");
            }
            Err(e) => return Err(e.into()),
        }
        debug!(key = %key, "blob deleted from filesystem");
        Ok(true)
    }

    fn update_metadata(
        &self,
        key: &BlobRef,
        diff: &AttributeDiff,
    ) -> BackendResult<Option<BackendMetadata>> {
        let Some(meta_path) = self.lookup_meta_path(key) else {
            return Ok(None);
        };
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let Some(mut metadata) = Self::load_metadata(&meta_path)? else {
            return Ok(None);
        };
        metadata.attributes.apply(diff);
        metadata.last_modified_at = Utc::now().max(metadata.uploaded_at);
        self.persist_metadata(&meta_path, &metadata)?;
        Ok(Some(metadata))
    }
}
