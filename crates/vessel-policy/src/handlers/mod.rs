//! Built-in policy handlers.

pub mod attributes;
pub mod rules;

pub use attributes::{AttributeInjector, AttributeRedactor, ProtectedAttributes};
pub use rules::{AttributeMatch, PolicyRule, RulePolicyHandler};
