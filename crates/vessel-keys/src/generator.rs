use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{KeyError, KeyResult};

/// Produces reference keys for newly stored blobs.
///
/// Implementations must be `Send + Sync`; a single generator is shared by
/// every caller of a storage facade. A generator is deterministic only as
/// far as its strategy says so.
pub trait KeyGenerator: Send + Sync {
    /// Short strategy name used in errors and logs.
    fn name(&self) -> &str;

    /// Create a key, optionally informed by the blob's original name.
    fn create_key(&self, original_name: Option<&str>) -> KeyResult<String>;
}

impl<T: KeyGenerator + ?Sized> KeyGenerator for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn create_key(&self, original_name: Option<&str>) -> KeyResult<String> {
        (**self).create_key(original_name)
    }
}

impl<T: KeyGenerator + ?Sized> KeyGenerator for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn create_key(&self, original_name: Option<&str>) -> KeyResult<String> {
        (**self).create_key(original_name)
    }
}

// ---------------------------------------------------------------------------
// UuidKeyGenerator
// ---------------------------------------------------------------------------

/// Random, time-ordered UUIDv7 keys in hyphenated lowercase form.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn name(&self) -> &str {
        "uuid"
    }

    fn create_key(&self, _original_name: Option<&str>) -> KeyResult<String> {
        Ok(Uuid::now_v7().to_string())
    }
}

// ---------------------------------------------------------------------------
// NameKeyGenerator
// ---------------------------------------------------------------------------

/// Derives a path-safe slug from the original name.
///
/// Any character outside `[A-Za-z0-9._-]` becomes `_`, and leading dots are
/// stripped so the key can never name a hidden file or a parent directory.
/// Fails when no name is supplied or nothing usable remains.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameKeyGenerator;

impl NameKeyGenerator {
    fn slug(name: &str) -> String {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let cleaned: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        cleaned.trim_start_matches('.').to_string()
    }
}

impl KeyGenerator for NameKeyGenerator {
    fn name(&self) -> &str {
        "name"
    }

    fn create_key(&self, original_name: Option<&str>) -> KeyResult<String> {
        let name = original_name.ok_or(KeyError::NameRequired { strategy: "name" })?;
        let slug = Self::slug(name);
        if slug.is_empty() {
            return Err(KeyError::EmptyKey {
                strategy: "name".into(),
            });
        }
        Ok(slug)
    }
}

// ---------------------------------------------------------------------------
// DelegatingKeyGenerator
// ---------------------------------------------------------------------------

type KeyFn = dyn Fn(Option<&str>) -> KeyResult<String> + Send + Sync;

/// Delegates key creation to a caller-supplied closure.
pub struct DelegatingKeyGenerator {
    name: String,
    delegate: Box<KeyFn>,
}

impl DelegatingKeyGenerator {
    /// Wrap a closure under the given strategy name.
    pub fn new<F>(name: impl Into<String>, delegate: F) -> Self
    where
        F: Fn(Option<&str>) -> KeyResult<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            delegate: Box::new(delegate),
        }
    }
}

impl KeyGenerator for DelegatingKeyGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_key(&self, original_name: Option<&str>) -> KeyResult<String> {
        (self.delegate)(original_name)
    }
}

impl fmt::Debug for DelegatingKeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatingKeyGenerator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
