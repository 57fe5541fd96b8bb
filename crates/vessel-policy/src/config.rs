use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chain::PolicyChain;
use crate::error::{PolicyError, PolicyResult};
use crate::handler::BlobPolicyHandler;
use crate::handlers::{
    AttributeInjector, AttributeRedactor, PolicyRule, ProtectedAttributes, RulePolicyHandler,
};

/// Declarative policy setup, typically the `[policy]` table of a storage
/// config file.
///
/// [`build_chain`](Self::build_chain) turns it into handlers in a fixed
/// order: rules, injector, protected attributes, redactor. Rules run first
/// so they judge the request as the caller sent it.
///
/// Redaction applies to every blob read through the facade, and the
/// `hide_when`, `deny_delete_when` and `deny_update_when` rules judge that
/// redacted blob. A rule keyed on a redacted attribute could never match,
/// so [`build_chain`](Self::build_chain) rejects that combination.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Attributes added to every store request.
    pub inject: BTreeMap<String, String>,
    /// Whether injected values replace caller-supplied ones.
    pub overwrite_injected: bool,
    /// Attributes hidden from every returned blob.
    pub redact: Vec<String>,
    /// Attributes that updates may not change.
    pub protect: Vec<String>,
    /// Reject updates touching protected attributes instead of stripping them.
    pub deny_protected_updates: bool,
    /// Declarative rules.
    pub rules: Vec<PolicyRule>,
}

impl PolicyConfig {
    /// Returns `true` if this config produces no handlers.
    pub fn is_empty(&self) -> bool {
        self.inject.is_empty()
            && self.redact.is_empty()
            && self.protect.is_empty()
            && self.rules.is_empty()
    }

    fn check_keys<'a>(
        section: &str,
        keys: impl IntoIterator<Item = &'a String>,
    ) -> PolicyResult<()> {
        if keys.into_iter().any(|k| k.trim().is_empty()) {
            return Err(PolicyError::Config(format!(
                "empty attribute key in '{section}'"
            )));
        }
        Ok(())
    }

    fn check_redacted_rules(&self) -> PolicyResult<()> {
        let redacted: Vec<String> = self.redact.iter().map(|k| k.to_lowercase()).collect();
        let blind = self
            .rules
            .iter()
            .filter_map(PolicyRule::attribute_match)
            .find(|m| redacted.contains(&m.key.to_lowercase()));
        match blind {
            Some(m) => Err(PolicyError::Config(format!(
                "rule on attribute '{}' can never match because it is redacted",
                m.key
            ))),
            None => Ok(()),
        }
    }

    /// Validate and build the handler chain.
    pub fn build_chain(&self) -> PolicyResult<PolicyChain> {
        Self::check_keys("inject", self.inject.keys())?;
        Self::check_keys("redact", &self.redact)?;
        Self::check_keys("protect", &self.protect)?;
        self.check_redacted_rules()?;

        let mut handlers: Vec<Arc<dyn BlobPolicyHandler>> = Vec::new();
        if !self.rules.is_empty() {
            handlers.push(Arc::new(RulePolicyHandler::new("rules", self.rules.clone())?));
        }
        if !self.inject.is_empty() {
            handlers.push(Arc::new(
                AttributeInjector::new(self.inject.clone()).overwrite(self.overwrite_injected),
            ));
        }
        if !self.protect.is_empty() {
            handlers.push(Arc::new(
                ProtectedAttributes::new(self.protect.clone()).deny(self.deny_protected_updates),
            ));
        }
        if !self.redact.is_empty() {
            handlers.push(Arc::new(AttributeRedactor::new(self.redact.clone())));
        }
        Ok(PolicyChain::with_handlers(handlers))
    }
}
