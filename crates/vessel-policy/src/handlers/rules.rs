use serde::{Deserialize, Serialize};
use tracing::debug;
use vessel_model::{StoreBlobRequest, StoredBlobObject, UpdateAttributesRequest};
use vessel_types::Attributes;

use crate::error::{PolicyError, PolicyResult};
use crate::handler::BlobPolicyHandler;

/// Matches a blob attribute by key, and optionally by value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMatch {
    pub key: String,
    /// If unset, any value matches as long as the key is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl AttributeMatch {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Returns `true` if `attributes` satisfy this match.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match (attributes.get(&self.key), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }
}

/// A declarative policy rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PolicyRule {
    /// Store requests must declare a size of at most `bytes`.
    MaxSize { bytes: u64 },
    /// Only these content types may be stored. `type/*` matches a whole
    /// top-level type.
    AllowedContentTypes { types: Vec<String> },
    /// Store requests must carry these attributes.
    RequireAttributes { keys: Vec<String> },
    /// Blobs matching are hidden from callers.
    HideWhen(AttributeMatch),
    /// Blobs matching cannot be deleted.
    DenyDeleteWhen(AttributeMatch),
    /// Blobs matching cannot have their attributes changed.
    DenyUpdateWhen(AttributeMatch),
}

impl PolicyRule {
    /// The attribute match of a rule that judges stored blobs.
    ///
    /// These rules see blobs after `post_handle_blob`, so an attribute a
    /// redactor removed is never visible to them.
    pub fn attribute_match(&self) -> Option<&AttributeMatch> {
        match self {
            Self::HideWhen(m) | Self::DenyDeleteWhen(m) | Self::DenyUpdateWhen(m) => Some(m),
            _ => None,
        }
    }

    /// Check that the rule is well-formed.
    pub fn validate(&self) -> PolicyResult<()> {
        let fail = |msg: String| Err(PolicyError::Config(msg));
        match self {
            Self::AllowedContentTypes { types } => {
                if types.is_empty() {
                    return fail("allowed_content_types needs at least one type".into());
                }
                if let Some(bad) = types.iter().find(|t| !t.contains('/')) {
                    return fail(format!("content type pattern {bad:?} is not type/subtype"));
                }
                Ok(())
            }
            Self::RequireAttributes { keys } if keys.iter().any(String::is_empty) => {
                fail("require_attributes has an empty key".into())
            }
            Self::HideWhen(m) | Self::DenyDeleteWhen(m) | Self::DenyUpdateWhen(m)
                if m.key.is_empty() =>
            {
                fail("attribute match has an empty key".into())
            }
            _ => Ok(()),
        }
    }
}

fn content_type_matches(pattern: &str, content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match pattern.strip_suffix("/*") {
        Some(top) => essence
            .split_once('/')
            .is_some_and(|(t, _)| t.eq_ignore_ascii_case(top)),
        None => essence.eq_ignore_ascii_case(pattern),
    }
}

// ---------------------------------------------------------------------------
// RulePolicyHandler
// ---------------------------------------------------------------------------

/// Evaluates a list of [`PolicyRule`]s at the matching hooks.
///
/// All rules must pass. The first failing rule decides the outcome.
#[derive(Clone, Debug)]
pub struct RulePolicyHandler {
    name: String,
    rules: Vec<PolicyRule>,
}

impl RulePolicyHandler {
    /// Build a handler, rejecting malformed rules.
    pub fn new(name: impl Into<String>, rules: Vec<PolicyRule>) -> PolicyResult<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self {
            name: name.into(),
            rules,
        })
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    fn deny<T>(&self, reason: String) -> PolicyResult<T> {
        Err(PolicyError::denied(&self.name, reason))
    }
}

impl BlobPolicyHandler for RulePolicyHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn before_store(&self, request: StoreBlobRequest) -> PolicyResult<StoreBlobRequest> {
        for rule in &self.rules {
            match rule {
                PolicyRule::MaxSize { bytes } => match request.declared_size() {
                    None => return self.deny(format!("size must be declared (limit {bytes} bytes)")),
                    Some(size) if size > *bytes => {
                        return self.deny(format!("size {size} exceeds limit of {bytes} bytes"))
                    }
                    Some(_) => {}
                },
                PolicyRule::AllowedContentTypes { types } => {
                    let ct = request.content_type();
                    if !types.iter().any(|p| content_type_matches(p, ct)) {
                        return self.deny(format!("content type '{ct}' is not allowed"));
                    }
                }
                PolicyRule::RequireAttributes { keys } => {
                    if let Some(missing) = keys.iter().find(|k| !request.attributes().contains_key(k)) {
                        return self.deny(format!("required attribute '{missing}' is missing"));
                    }
                }
                _ => {}
            }
        }
        Ok(request)
    }

    fn after_retrieve(&self, stored: &StoredBlobObject) -> PolicyResult<bool> {
        let attrs = stored.blob().attributes();
        let hidden = self.rules.iter().any(|rule| match rule {
            PolicyRule::HideWhen(m) => m.matches(attrs),
            _ => false,
        });
        Ok(!hidden)
    }

    fn before_update(
        &self,
        stored: &StoredBlobObject,
        request: UpdateAttributesRequest,
    ) -> PolicyResult<UpdateAttributesRequest> {
        for rule in &self.rules {
            if let PolicyRule::DenyUpdateWhen(m) = rule {
                if m.matches(stored.blob().attributes()) {
                    return self.deny(format!("blob is read-only while '{}' is set", m.key));
                }
            }
        }
        Ok(request)
    }

    fn before_delete(&self, stored: &StoredBlobObject) -> PolicyResult<bool> {
        for rule in &self.rules {
            if let PolicyRule::DenyDeleteWhen(m) = rule {
                if m.matches(stored.blob().attributes()) {
                    debug!(
                        handler = %self.name,
                        blob_ref = %stored.blob().stored_ref(),
                        key = %m.key,
                        "delete refused by rule"
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
