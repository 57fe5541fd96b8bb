use serde::{Deserialize, Serialize};
use vessel_types::{AttributeDiff, Attributes};

use crate::blob::{validate_attribute_keys, validate_content_type};
use crate::error::{ModelError, ModelResult};
use crate::rebuild::Rebuild;

/// Content type used when a store request does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// StoreBlobRequest
// ---------------------------------------------------------------------------

/// A request to store a new blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreBlobRequest {
    original_name: String,
    content_type: String,
    declared_size: Option<u64>,
    attributes: Attributes,
}

impl StoreBlobRequest {
    pub fn builder() -> StoreBlobRequestBuilder {
        StoreBlobRequestBuilder::default()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Size the caller claims the content has, if any.
    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Re-run builder validation, for requests rewritten by a policy.
    pub fn validate(&self) -> ModelResult<()> {
        self.to_builder().build().map(|_| ())
    }
}

/// Flat builder for [`StoreBlobRequest`].
#[derive(Clone, Debug, Default)]
pub struct StoreBlobRequestBuilder {
    original_name: Option<String>,
    content_type: Option<String>,
    declared_size: Option<u64>,
    attributes: Attributes,
}

impl StoreBlobRequestBuilder {
    pub fn original_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn declared_size(&mut self, size: Option<u64>) -> &mut Self {
        self.declared_size = size;
        self
    }

    pub fn attributes(&mut self, attributes: Attributes) -> &mut Self {
        self.attributes = attributes;
        self
    }

    pub fn attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn remove_attribute(&mut self, key: &str) -> &mut Self {
        self.attributes.remove(key);
        self
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Validate and build. The content type defaults to
    /// [`DEFAULT_CONTENT_TYPE`].
    pub fn build(&self) -> ModelResult<StoreBlobRequest> {
        let original_name = self
            .original_name
            .clone()
            .ok_or(ModelError::MissingField("original_name"))?;
        if original_name.trim().is_empty() {
            return Err(ModelError::BlankName);
        }
        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        validate_content_type(&content_type)?;
        validate_attribute_keys(&self.attributes)?;

        Ok(StoreBlobRequest {
            original_name,
            content_type,
            declared_size: self.declared_size,
            attributes: self.attributes.clone(),
        })
    }
}

impl Rebuild for StoreBlobRequest {
    type Builder = StoreBlobRequestBuilder;

    fn to_builder(&self) -> StoreBlobRequestBuilder {
        StoreBlobRequestBuilder {
            original_name: Some(self.original_name.clone()),
            content_type: Some(self.content_type.clone()),
            declared_size: self.declared_size,
            attributes: self.attributes.clone(),
        }
    }

    fn from_builder(builder: &StoreBlobRequestBuilder) -> ModelResult<Self> {
        builder.build()
    }
}

// ---------------------------------------------------------------------------
// UpdateAttributesRequest
// ---------------------------------------------------------------------------

/// A request to change a blob's attributes.
///
/// Only the keys listed are touched: a set entry overwrites, a removal entry
/// deletes, and every other attribute on the stored blob is left as is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAttributesRequest {
    changes: AttributeDiff,
}

impl UpdateAttributesRequest {
    pub fn builder() -> UpdateAttributesRequestBuilder {
        UpdateAttributesRequestBuilder::default()
    }

    /// The set/remove changes.
    pub fn changes(&self) -> &AttributeDiff {
        &self.changes
    }

    /// Returns `true` if the request touches no attribute.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Compute the attributes that result from applying this request.
    pub fn apply_to(&self, attributes: &Attributes) -> Attributes {
        let mut updated = attributes.clone();
        updated.apply(&self.changes);
        updated
    }
}

/// Flat builder for [`UpdateAttributesRequest`].
#[derive(Clone, Debug, Default)]
pub struct UpdateAttributesRequestBuilder {
    changes: AttributeDiff,
}

impl UpdateAttributesRequestBuilder {
    /// Set `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.changes.set(key, value);
        self
    }

    /// Remove `key`.
    pub fn remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.changes.remove(key);
        self
    }

    /// Set when `value` is `Some`, remove when `None`.
    pub fn change(&mut self, key: impl Into<String>, value: Option<String>) -> &mut Self {
        match value {
            Some(v) => self.changes.set(key, v),
            None => self.changes.remove(key),
        }
        self
    }

    /// Leave `key` untouched.
    pub fn discard(&mut self, key: &str) -> &mut Self {
        self.changes.discard(key);
        self
    }

    pub fn changes_mut(&mut self) -> &mut AttributeDiff {
        &mut self.changes
    }

    pub fn build(&self) -> ModelResult<UpdateAttributesRequest> {
        if self.changes.iter().any(|(k, _)| k.is_empty()) {
            return Err(ModelError::EmptyAttributeKey);
        }
        Ok(UpdateAttributesRequest {
            changes: self.changes.clone(),
        })
    }
}

impl Rebuild for UpdateAttributesRequest {
    type Builder = UpdateAttributesRequestBuilder;

    fn to_builder(&self) -> UpdateAttributesRequestBuilder {
        UpdateAttributesRequestBuilder {
            changes: self.changes.clone(),
        }
    }

    fn from_builder(builder: &UpdateAttributesRequestBuilder) -> ModelResult<Self> {
        builder.build()
    }
}
