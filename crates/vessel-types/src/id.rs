use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable key identifying a stored blob within one backend.
///
/// A `BlobRef` is assigned exactly once, either by a key generator on the
/// facade side or by the backend itself, and never changes afterwards.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    /// Wrap an already-trusted key (e.g. one returned by a backend).
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Parse a user-supplied key, rejecting empty values and control
    /// characters.
    pub fn parse(key: &str) -> Result<Self, TypeError> {
        if key.is_empty() {
            return Err(TypeError::EmptyRef);
        }
        if let Some(ch) = key.chars().find(|c| c.is_control()) {
            return Err(TypeError::InvalidRefChar {
                value: key.to_string(),
                ch,
            });
        }
        Ok(Self(key.to_string()))
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the ref and return the raw key.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({})", self.0)
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlobRef {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for BlobRef {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Name of a storage facade instance.
///
/// Events carry a `StorageId` so listeners can tell which facade produced
/// them. Cloning is a reference-count bump; the id holds no backend
/// resources.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageId(Arc<str>);

impl StorageId {
    /// Create a storage id from a non-empty name.
    pub fn new(name: &str) -> Result<Self, TypeError> {
        if name.trim().is_empty() {
            return Err(TypeError::EmptyStorageId);
        }
        Ok(Self(Arc::from(name)))
    }

    /// The storage name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StorageId {
    fn default() -> Self {
        Self(Arc::from("default"))
    }
}

impl fmt::Debug for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageId({})", self.0)
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorageId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<StorageId> for String {
    fn from(id: StorageId) -> Self {
        id.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_path_like_keys() {
        let r = BlobRef::parse("2024/10/a.txt").unwrap();
        assert_eq!(r.as_str(), "2024/10/a.txt");
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(BlobRef::parse(""), Err(TypeError::EmptyRef));
    }

    #[test]
    fn parse_rejects_control_chars() {
        let err = BlobRef::parse("a\nb").unwrap_err();
        assert!(matches!(err, TypeError::InvalidRefChar { ch: '\n', .. }));
    }

    #[test]
    fn display_is_raw_key() {
        let r = BlobRef::new("k-1");
        assert_eq!(format!("{r}"), "k-1");
        assert_eq!(format!("{r:?}"), "BlobRef(k-1)");
    }

    #[test]
    fn blob_ref_serde_is_transparent() {
        let r = BlobRef::new("abc");
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"abc\"");
    }

    #[test]
    fn storage_id_rejects_blank() {
        assert_eq!(StorageId::new("  "), Err(TypeError::EmptyStorageId));
    }

    #[test]
    fn storage_id_clones_compare_equal() {
        let a = StorageId::new("media").unwrap();
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(b.as_str(), "media");
    }

    #[test]
    fn storage_id_serde_roundtrip() {
        let id = StorageId::new("media").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"media\"");
        let parsed: StorageId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<StorageId>("\"\"").is_err());
    }
}
