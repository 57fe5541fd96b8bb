//! Blob lifecycle events for Vessel.
//!
//! A storage facade publishes one [`BlobEvent`] per completed mutation
//! (upload, delete, attribute update) to an [`EventRegistry`]. Listeners
//! declare which event kinds they handle through
//! [`BlobEventListener::supports_event_type`]; the registry only calls them
//! for those kinds, in registration order.
//!
//! Publishing never fails the caller. A listener that returns an error or
//! panics is logged and skipped, and the remaining listeners still run.

pub mod error;
pub mod event;
pub mod listener;
pub mod registry;

pub use error::{ListenerError, ListenerResult};
pub use event::{BlobEvent, BlobEventKind};
pub use listener::{BlobEventListener, EventFilter, FilteredListener, KindListener, LoggingListener};
pub use registry::{DispatchSummary, EventRegistry, ListenerRegistry, NoopEventRegistry};
