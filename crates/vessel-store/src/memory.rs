use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::Utc;
use tracing::debug;
use vessel_model::BytesSource;
use vessel_types::{AttributeDiff, BlobRef};

use crate::error::{BackendError, BackendResult};
use crate::traits::{BackendBlob, BackendMetadata, BlobBackend, KeyAssignment, WriteSpec};

struct Entry {
    metadata: BackendMetadata,
    content: Arc<BytesSource>,
}

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. Content is held as shared [`Bytes`],
/// so handing out a content source never copies the payload. Calls never
/// block on I/O.
pub struct InMemoryBackend {
    blobs: RwLock<HashMap<BlobRef, Entry>>,
    assignment: KeyAssignment,
    next_id: AtomicU64,
}

impl InMemoryBackend {
    /// Create an empty backend that expects caller-assigned keys.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            assignment: KeyAssignment::Caller,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create an empty backend that assigns `mem-<n>` keys itself.
    pub fn with_backend_keys() -> Self {
        Self {
            assignment: KeyAssignment::Backend,
            ..Self::new()
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|e| e.metadata.size)
            .sum()
    }

    /// Sorted list of all stored keys.
    pub fn keys(&self) -> Vec<BlobRef> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut keys: Vec<BlobRef> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn resolve_key(&self, key: Option<&BlobRef>) -> BackendResult<BlobRef> {
        match (self.assignment, key) {
            (KeyAssignment::Caller, Some(key)) => Ok(key.clone()),
            (KeyAssignment::Caller, None) => Err(BackendError::KeyRequired),
            // Backend-assigned: any caller key is ignored.
            (KeyAssignment::Backend, _) => {
                let n = self.next_id.fetch_add(1, Ordering::Relaxed);
                Ok(BlobRef::new(format!("mem-{n}")))
            }
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobBackend for InMemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn key_assignment(&self) -> KeyAssignment {
        self.assignment
    }

    fn write(
        &self,
        key: Option<&BlobRef>,
        content: &mut dyn Read,
        spec: &WriteSpec,
    ) -> BackendResult<BackendMetadata> {
        let key = self.resolve_key(key)?;

        let mut buf = Vec::new();
        content.read_to_end(&mut buf)?;
        let size = buf.len() as u64;
        if let Some(declared) = spec.declared_size {
            if declared != size {
                return Err(BackendError::SizeMismatch {
                    declared,
                    actual: size,
                });
            }
        }

        let now = Utc::now();
        let metadata = BackendMetadata {
            key: key.clone(),
            original_name: spec.original_name.clone(),
            content_type: spec.content_type.clone(),
            size,
            uploaded_at: now,
            last_modified_at: now,
            attributes: spec.attributes.clone(),
            checksum: None,
        };

        let mut map = self.blobs.write().expect("lock poisoned");
        if map.contains_key(&key) {
            return Err(BackendError::KeyConflict(key));
        }
        map.insert(
            key.clone(),
            Entry {
                metadata: metadata.clone(),
                content: Arc::new(BytesSource::new(Bytes::from(buf))),
            },
        );
        debug!(key = %key, size, "blob written to memory");
        Ok(metadata)
    }

    fn read(&self, key: &BlobRef) -> BackendResult<Option<BackendBlob>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(key).map(|entry| BackendBlob {
            metadata: entry.metadata.clone(),
            content: entry.content.clone(),
        }))
    }

    fn exists(&self, key: &BlobRef) -> BackendResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    fn delete(&self, key: &BlobRef) -> BackendResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    fn update_metadata(
        &self,
        key: &BlobRef,
        diff: &AttributeDiff,
    ) -> BackendResult<Option<BackendMetadata>> {
        let mut map = self.blobs.write().expect("lock poisoned");
        let Some(entry) = map.get_mut(key) else {
            return Ok(None);
        };
        entry.metadata.attributes.apply(diff);
        entry.metadata.last_modified_at = Utc::now().max(entry.metadata.uploaded_at);
        Ok(Some(entry.metadata.clone()))
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("blob_count", &self.len())
            .field("assignment", &self.assignment)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;
    use vessel_types::Attributes;

    fn spec(name: &str) -> WriteSpec {
        WriteSpec {
            original_name: name.into(),
            content_type: "text/plain".into(),
            declared_size: None,
            attributes: [("owner", "u1")].into_iter().collect(),
        }
    }

    fn write(backend: &InMemoryBackend, key: &str, data: &[u8]) -> BackendMetadata {
        backend
            .write(Some(&BlobRef::new(key)), &mut Cursor::new(data.to_vec()), &spec("a.txt"))
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_back() {
        let backend = InMemoryBackend::new();
        let meta = write(&backend, "k1", b"hello");
        assert_eq!(meta.size, 5);
        assert_eq!(meta.key.as_str(), "k1");

        let blob = backend.read(&BlobRef::new("k1")).unwrap().expect("should exist");
        assert_eq!(blob.metadata, meta);
        let mut out = Vec::new();
        blob.content.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn read_missing_is_none() {
        let backend = InMemoryBackend::new();
        assert!(backend.read(&BlobRef::new("nope")).unwrap().is_none());
        assert!(!backend.exists(&BlobRef::new("nope")).unwrap());
    }

    #[test]
    fn delete_reports_existence() {
        let backend = InMemoryBackend::new();
        write(&backend, "k1", b"x");
        assert!(backend.delete(&BlobRef::new("k1")).unwrap());
        assert!(!backend.delete(&BlobRef::new("k1")).unwrap());
        assert!(backend.is_empty());
    }

    #[test]
    fn duplicate_key_conflicts() {
        let backend = InMemoryBackend::new();
        write(&backend, "k1", b"x");
        let err = backend
            .write(Some(&BlobRef::new("k1")), &mut Cursor::new(b"y".to_vec()), &spec("b"))
            .unwrap_err();
        assert!(matches!(err, BackendError::KeyConflict(_)));
    }

    #[test]
    fn caller_mode_requires_key() {
        let backend = InMemoryBackend::new();
        let err = backend
            .write(None, &mut Cursor::new(b"y".to_vec()), &spec("b"))
            .unwrap_err();
        assert!(matches!(err, BackendError::KeyRequired));
    }

    #[test]
    fn backend_mode_assigns_keys() {
        let backend = InMemoryBackend::with_backend_keys();
        assert_eq!(backend.key_assignment(), KeyAssignment::Backend);
        let a = backend
            .write(None, &mut Cursor::new(b"1".to_vec()), &spec("a"))
            .unwrap();
        let b = backend
            .write(None, &mut Cursor::new(b"2".to_vec()), &spec("b"))
            .unwrap();
        assert_eq!(a.key.as_str(), "mem-1");
        assert_eq!(b.key.as_str(), "mem-2");
    }

    #[test]
    fn size_mismatch_persists_nothing() {
        let backend = InMemoryBackend::new();
        let mut s = spec("a");
        s.declared_size = Some(10);
        let err = backend
            .write(Some(&BlobRef::new("k")), &mut Cursor::new(b"abc".to_vec()), &s)
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::SizeMismatch {
                declared: 10,
                actual: 3
            }
        ));
        assert!(backend.is_empty());
    }

    // -----------------------------------------------------------------------
    // Metadata updates
    // -----------------------------------------------------------------------

    #[test]
    fn update_applies_diff_and_bumps_modified() {
        let backend = InMemoryBackend::new();
        let before = write(&backend, "k1", b"x");
        let mut diff = AttributeDiff::new();
        diff.set("tag", "blue");
        diff.remove("owner");
        let after = backend
            .update_metadata(&BlobRef::new("k1"), &diff)
            .unwrap()
            .expect("exists");
        let expected: Attributes = [("tag", "blue")].into_iter().collect();
        assert_eq!(after.attributes, expected);
        assert!(after.last_modified_at >= before.last_modified_at);
        assert_eq!(after.uploaded_at, before.uploaded_at);
    }

    #[test]
    fn update_missing_is_none() {
        let backend = InMemoryBackend::new();
        assert!(backend
            .update_metadata(&BlobRef::new("nope"), &AttributeDiff::new())
            .unwrap()
            .is_none());
    }

    // -----------------------------------------------------------------------
    // Concurrency & bookkeeping
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writes_to_distinct_keys() {
        let backend = InMemoryBackend::new();
        thread::scope(|s| {
            for t in 0..4 {
                let backend = &backend;
                s.spawn(move || {
                    for i in 0..50 {
                        write(backend, &format!("t{t}-{i}"), b"data");
                    }
                });
            }
        });
        assert_eq!(backend.len(), 200);
        assert_eq!(backend.total_bytes(), 800);
    }

    #[test]
    fn keys_are_sorted() {
        let backend = InMemoryBackend::new();
        write(&backend, "b", b"1");
        write(&backend, "a", b"1");
        let keys: Vec<String> = backend.keys().into_iter().map(BlobRef::into_string).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
