//! Foundation types for Vessel.
//!
//! This crate provides the identifier and attribute types shared by every
//! other Vessel crate.
//!
//! # Key Types
//!
//! - [`BlobRef`] — Stable backend key identifying a stored blob
//! - [`StorageId`] — Lightweight name of a storage facade, carried by events
//! - [`Attributes`] — String map with case-insensitive keys
//! - [`AttributeDiff`] — Set/remove changes applied to an [`Attributes`] map

pub mod attributes;
pub mod error;
pub mod id;

pub use attributes::{AttributeDiff, Attributes};
pub use error::TypeError;
pub use id::{BlobRef, StorageId};
