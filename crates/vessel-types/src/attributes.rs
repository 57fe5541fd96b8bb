//! Case-insensitive attribute maps.
//!
//! Attribute keys compare without regard to ASCII or Unicode case: `Owner`
//! and `owner` name the same attribute. The casing of the most recent write
//! is kept for display and serialization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

fn fold(key: &str) -> String {
    key.to_lowercase()
}

/// User-defined blob metadata: string keys to string values.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Attributes {
    // folded key -> (key as written, value)
    entries: BTreeMap<String, (String, String)>,
}

impl Attributes {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by key, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&fold(key)).map(|(_, v)| v.as_str())
    }

    /// Returns `true` if the key is present, ignoring case.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    /// Set a value, returning the previous value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        self.entries
            .insert(fold(&key), (key, value.into()))
            .map(|(_, old)| old)
    }

    /// Remove a key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&fold(key)).map(|(_, v)| v)
    }

    /// Keep only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.entries.retain(|_, (k, v)| keep(k, v));
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs, ordered by folded key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys as written.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(k, _)| k.as_str())
    }

    /// Apply a set of changes: `Some` values are set, `None` values removed.
    pub fn apply(&mut self, diff: &AttributeDiff) {
        for (key, change) in diff.iter() {
            match change {
                Some(value) => {
                    self.insert(key, value);
                }
                None => {
                    self.remove(key);
                }
            }
        }
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(folded, (_, v))| other.entries.get(folded).map(|(_, ov)| ov) == Some(v))
    }
}

impl Eq for Attributes {}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Attributes {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl From<BTreeMap<String, String>> for Attributes {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Attributes> for BTreeMap<String, String> {
    fn from(attrs: Attributes) -> Self {
        attrs.entries.into_values().collect()
    }
}

/// A set of attribute changes.
///
/// A `Some(value)` entry sets the attribute; a `None` entry removes it.
/// Keys not present in the diff are left untouched when the diff is applied.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Option<String>>",
    into = "BTreeMap<String, Option<String>>"
)]
pub struct AttributeDiff {
    changes: BTreeMap<String, (String, Option<String>)>,
}

impl AttributeDiff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` should be set to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.changes.insert(fold(&key), (key, Some(value.into())));
    }

    /// Record that `key` should be removed.
    pub fn remove(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.changes.insert(fold(&key), (key, None));
    }

    /// The change recorded for `key`: `None` if the key is untouched,
    /// `Some(None)` for a removal, `Some(Some(v))` for a set.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.changes
            .get(&fold(key))
            .map(|(_, change)| change.as_deref())
    }

    /// Returns `true` if the diff touches `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.changes.contains_key(&fold(key))
    }

    /// Drop a key from the diff so it is left untouched.
    pub fn discard(&mut self, key: &str) -> bool {
        self.changes.remove(&fold(key)).is_some()
    }

    /// Keep only changes whose key satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.changes.retain(|_, (k, _)| keep(k));
    }

    /// Iterate over `(key, change)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.changes
            .values()
            .map(|(k, change)| (k.as_str(), change.as_deref()))
    }

    /// Number of touched keys.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if the diff touches nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl fmt::Debug for AttributeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl From<BTreeMap<String, Option<String>>> for AttributeDiff {
    fn from(map: BTreeMap<String, Option<String>>) -> Self {
        let mut diff = Self::new();
        for (k, change) in map {
            match change {
                Some(v) => diff.set(k, v),
                None => diff.remove(k),
            }
        }
        diff
    }
}

impl From<AttributeDiff> for BTreeMap<String, Option<String>> {
    fn from(diff: AttributeDiff) -> Self {
        diff.changes.into_values().collect()
    }
}
