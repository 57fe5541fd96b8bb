//! Policy interception chain for Vessel.
//!
//! Every storage facade operation passes through a [`PolicyChain`] before it
//! reaches the backend and again before its result reaches the caller. A
//! handler can rewrite a request, hide attributes from a result, hide a blob
//! entirely, or deny an operation.
//!
//! Handlers run in registration order as a pipeline: each sees the output of
//! the previous one. Boolean hooks stop at the first handler that says no.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vessel_model::StoreBlobRequest;
//! use vessel_policy::{AttributeInjector, PolicyChain};
//!
//! let chain = PolicyChain::new();
//! chain.add_handler(Arc::new(AttributeInjector::new([("tenant", "t1")])));
//!
//! let request = StoreBlobRequest::builder()
//!     .original_name("a.txt")
//!     .build()
//!     .unwrap();
//! let request = chain.before_store(request).unwrap();
//! assert_eq!(request.attributes().get("tenant"), Some("t1"));
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;

pub use chain::PolicyChain;
pub use config::PolicyConfig;
pub use error::{PolicyError, PolicyResult};
pub use handler::BlobPolicyHandler;
pub use handlers::attributes::{AttributeInjector, AttributeRedactor, ProtectedAttributes};
pub use handlers::rules::{AttributeMatch, PolicyRule, RulePolicyHandler};
