use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vessel_types::{Attributes, BlobRef};

use crate::error::{ModelError, ModelResult};
use crate::rebuild::Rebuild;

/// Check that `value` looks like `type/subtype` (parameters allowed).
pub(crate) fn validate_content_type(value: &str) -> ModelResult<()> {
    let essence = value.split(';').next().unwrap_or_default().trim();
    let valid = match essence.split_once('/') {
        Some((kind, sub)) => {
            !kind.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && !essence.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidContentType(value.to_string()))
    }
}

pub(crate) fn validate_attribute_keys(attrs: &Attributes) -> ModelResult<()> {
    if attrs.keys().any(str::is_empty) {
        return Err(ModelError::EmptyAttributeKey);
    }
    Ok(())
}

/// Metadata of a blob held by a backend.
///
/// The stored ref is assigned once, at construction, and never changes.
/// `size` is `None` only for objects built before the backend confirmed the
/// byte count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobObject {
    original_name: String,
    stored_ref: BlobRef,
    content_type: String,
    uploaded_at: DateTime<Utc>,
    last_modified_at: DateTime<Utc>,
    size: Option<u64>,
    attributes: Attributes,
}

impl BlobObject {
    /// Start building a new object.
    pub fn builder() -> BlobObjectBuilder {
        BlobObjectBuilder::default()
    }

    /// Name the blob was uploaded under.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Backend key.
    pub fn stored_ref(&self) -> &BlobRef {
        &self.stored_ref
    }

    /// MIME type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    pub fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }

    /// Size in bytes, once known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Shorthand for `attributes().get(key)`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }
}

/// Flat builder for [`BlobObject`].
#[derive(Clone, Debug, Default)]
pub struct BlobObjectBuilder {
    original_name: Option<String>,
    stored_ref: Option<BlobRef>,
    content_type: Option<String>,
    uploaded_at: Option<DateTime<Utc>>,
    last_modified_at: Option<DateTime<Utc>>,
    size: Option<u64>,
    attributes: Attributes,
}

impl BlobObjectBuilder {
    pub fn original_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn stored_ref(&mut self, stored_ref: impl Into<BlobRef>) -> &mut Self {
        self.stored_ref = Some(stored_ref.into());
        self
    }

    pub fn content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn uploaded_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.uploaded_at = Some(at);
        self
    }

    pub fn last_modified_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.last_modified_at = Some(at);
        self
    }

    pub fn size(&mut self, size: Option<u64>) -> &mut Self {
        self.size = size;
        self
    }

    /// Replace all attributes.
    pub fn attributes(&mut self, attributes: Attributes) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Set a single attribute.
    pub fn attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key, value);
        self
    }

    /// Remove a single attribute.
    pub fn remove_attribute(&mut self, key: &str) -> &mut Self {
        self.attributes.remove(key);
        self
    }

    /// Mutable access to the attribute map being built.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Validate and build.
    ///
    /// `uploaded_at` defaults to now and `last_modified_at` defaults to
    /// `uploaded_at`.
    pub fn build(&self) -> ModelResult<BlobObject> {
        let stored_ref = self
            .stored_ref
            .clone()
            .ok_or(ModelError::MissingField("stored_ref"))?;
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
            .ok_or(ModelError::MissingField("content_type"))?;
        validate_content_type(&content_type)?;
        validate_attribute_keys(&self.attributes)?;

        let uploaded_at = self.uploaded_at.unwrap_or_else(Utc::now);
        let last_modified_at = self.last_modified_at.unwrap_or(uploaded_at);
        if last_modified_at < uploaded_at {
            return Err(ModelError::TimeOrder);
        }

        Ok(BlobObject {
            original_name,
            stored_ref,
            content_type,
            uploaded_at,
            last_modified_at,
            size: self.size,
            attributes: self.attributes.clone(),
        })
    }
}

impl Rebuild for BlobObject {
    type Builder = BlobObjectBuilder;

    fn to_builder(&self) -> BlobObjectBuilder {
        BlobObjectBuilder {
            original_name: Some(self.original_name.clone()),
            stored_ref: Some(self.stored_ref.clone()),
            content_type: Some(self.content_type.clone()),
            uploaded_at: Some(self.uploaded_at),
            last_modified_at: Some(self.last_modified_at),
            size: self.size,
            attributes: self.attributes.clone(),
        }
    }

    fn from_builder(builder: &BlobObjectBuilder) -> ModelResult<Self> {
        builder.build()
    }
}
