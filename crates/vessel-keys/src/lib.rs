//! Key generation for Vessel.
//!
//! A [`KeyGenerator`] produces the reference string under which a new blob
//! is written. Strategies compose: a [`CompositeKeyGenerator`] joins the
//! output of its parts with [`KEY_SEPARATOR`], in registration order.
//!
//! # Strategies
//!
//! - [`UuidKeyGenerator`] -- random time-ordered UUIDs (the default)
//! - [`SequentialKeyGenerator`] -- strictly increasing numbers, safe under
//!   concurrent callers
//! - [`NameKeyGenerator`] -- path-safe slug of the original file name
//! - [`DelegatingKeyGenerator`] -- caller-supplied closure
//! - [`CompositeKeyGenerator`] -- ordered join of other generators

pub mod composite;
pub mod error;
pub mod generator;
pub mod sequential;
pub mod strategy;

pub use composite::{CompositeKeyGenerator, KEY_SEPARATOR};
pub use error::{KeyError, KeyResult};
pub use generator::{DelegatingKeyGenerator, KeyGenerator, NameKeyGenerator, UuidKeyGenerator};
pub use sequential::SequentialKeyGenerator;
pub use strategy::KeyStrategy;
