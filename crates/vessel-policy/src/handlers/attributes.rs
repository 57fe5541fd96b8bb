use tracing::debug;
use vessel_model::{Rebuild, StoreBlobRequest, StoredBlobObject, UpdateAttributesRequest};
use vessel_types::Attributes;

use crate::error::{PolicyError, PolicyResult};
use crate::handler::BlobPolicyHandler;

// ---------------------------------------------------------------------------
// AttributeInjector
// ---------------------------------------------------------------------------

/// Adds fixed attributes to every store request.
///
/// By default an attribute the caller already set is kept; call
/// [`overwrite`](Self::overwrite) to force the injected value.
#[derive(Clone, Debug)]
pub struct AttributeInjector {
    attributes: Attributes,
    overwrite: bool,
}

impl AttributeInjector {
    pub fn new<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().collect(),
            overwrite: false,
        }
    }

    /// Replace caller-supplied values for injected keys.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl BlobPolicyHandler for AttributeInjector {
    fn name(&self) -> &str {
        "attribute-injector"
    }

    fn before_store(&self, request: StoreBlobRequest) -> PolicyResult<StoreBlobRequest> {
        let injected = request.with_changes(|b| {
            let attrs = b.attributes_mut();
            for (key, value) in self.attributes.iter() {
                if self.overwrite || !attrs.contains_key(key) {
                    attrs.insert(key, value);
                }
            }
        })?;
        Ok(injected)
    }
}

// ---------------------------------------------------------------------------
// AttributeRedactor
// ---------------------------------------------------------------------------

/// Hides attributes from every blob handed back to callers.
///
/// The attributes stay in the backend; only the returned objects lose them.
#[derive(Clone, Debug)]
pub struct AttributeRedactor {
    keys: Vec<String>,
}

impl AttributeRedactor {
    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl BlobPolicyHandler for AttributeRedactor {
    fn name(&self) -> &str {
        "attribute-redactor"
    }

    fn post_handle_blob(&self, stored: StoredBlobObject) -> PolicyResult<StoredBlobObject> {
        let attrs = stored.blob().attributes();
        if !self.keys.iter().any(|k| attrs.contains_key(k)) {
            return Ok(stored);
        }
        let redacted = stored.with_changes(|b| {
            for key in &self.keys {
                b.blob().remove_attribute(key);
            }
        })?;
        Ok(redacted)
    }
}

// ---------------------------------------------------------------------------
// ProtectedAttributes
// ---------------------------------------------------------------------------

/// Keeps attribute updates away from protected keys.
///
/// Changes to a protected key are silently dropped from the request, or,
/// with [`deny`](Self::deny), rejected outright.
#[derive(Clone, Debug)]
pub struct ProtectedAttributes {
    keys: Vec<String>,
    deny: bool,
}

impl ProtectedAttributes {
    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            deny: false,
        }
    }

    /// Reject the whole update instead of stripping protected changes.
    pub fn deny(mut self, deny: bool) -> Self {
        self.deny = deny;
        self
    }
}

impl BlobPolicyHandler for ProtectedAttributes {
    fn name(&self) -> &str {
        "protected-attributes"
    }

    fn before_update(
        &self,
        stored: &StoredBlobObject,
        request: UpdateAttributesRequest,
    ) -> PolicyResult<UpdateAttributesRequest> {
        let touched: Vec<&str> = self
            .keys
            .iter()
            .map(String::as_str)
            .filter(|k| request.changes().contains_key(k))
            .collect();
        if touched.is_empty() {
            return Ok(request);
        }
        if self.deny {
            return Err(PolicyError::denied(
                self.name(),
                format!("attribute '{}' is protected", touched[0]),
            ));
        }
        debug!(
            blob_ref = %stored.blob().stored_ref(),
            keys = ?touched,
            "stripping protected attribute changes"
        );
        let stripped = request.with_changes(|b| {
            for key in &touched {
                b.discard(key);
            }
        })?;
        Ok(stripped)
    }
}
