use std::fmt;
use std::sync::Arc;

use tracing::debug;
use vessel_types::StorageId;

use crate::error::ListenerResult;
use crate::event::{BlobEvent, BlobEventKind};

/// Receives blob events from a registry.
pub trait BlobEventListener: Send + Sync {
    /// Whether this listener wants events of `kind`.
    fn supports_event_type(&self, kind: BlobEventKind) -> bool;

    /// Handle one event. Only called for supported kinds.
    fn on_event(&self, event: &BlobEvent) -> ListenerResult<()>;

    /// Whether this listener wants this particular event.
    ///
    /// Defaults to [`supports_event_type`](Self::supports_event_type) on the
    /// event's kind. Override to filter on other event fields.
    fn accepts(&self, event: &BlobEvent) -> bool {
        self.supports_event_type(event.kind())
    }

    /// Name used in dispatch logs.
    fn name(&self) -> &str {
        "listener"
    }
}

impl<T: BlobEventListener + ?Sized> BlobEventListener for Arc<T> {
    fn supports_event_type(&self, kind: BlobEventKind) -> bool {
        (**self).supports_event_type(kind)
    }

    fn on_event(&self, event: &BlobEvent) -> ListenerResult<()> {
        (**self).on_event(event)
    }

    fn accepts(&self, event: &BlobEvent) -> bool {
        (**self).accepts(event)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// KindListener
// ---------------------------------------------------------------------------

/// A closure bound to one event kind.
pub struct KindListener<F> {
    name: String,
    kind: BlobEventKind,
    handler: F,
}

impl<F> KindListener<F>
where
    F: Fn(&BlobEvent) -> ListenerResult<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, kind: BlobEventKind, handler: F) -> Self {
        Self {
            name: name.into(),
            kind,
            handler,
        }
    }

    /// The kind this listener handles.
    pub fn kind(&self) -> BlobEventKind {
        self.kind
    }
}

impl<F> BlobEventListener for KindListener<F>
where
    F: Fn(&BlobEvent) -> ListenerResult<()> + Send + Sync,
{
    fn supports_event_type(&self, kind: BlobEventKind) -> bool {
        kind == self.kind
    }

    fn on_event(&self, event: &BlobEvent) -> ListenerResult<()> {
        (self.handler)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for KindListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindListener")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventFilter / FilteredListener
// ---------------------------------------------------------------------------

/// Filter for routing a subset of blob events to a listener.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// If set, only events of these kinds pass.
    pub kinds: Option<Vec<BlobEventKind>>,
    /// If set, only events from these storages pass.
    pub storages: Option<Vec<StorageId>>,
}

impl EventFilter {
    /// A filter that lets everything through.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = BlobEventKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_storages(mut self, storages: impl IntoIterator<Item = StorageId>) -> Self {
        self.storages = Some(storages.into_iter().collect());
        self
    }

    /// Returns `true` if events of `kind` can pass this filter.
    pub fn allows_kind(&self, kind: BlobEventKind) -> bool {
        self.kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind))
    }

    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &BlobEvent) -> bool {
        if !self.allows_kind(event.kind()) {
            return false;
        }
        if let Some(ref storages) = self.storages {
            if !storages.contains(event.storage()) {
                return false;
            }
        }
        true
    }
}

/// Wraps a listener so it only sees events matching an [`EventFilter`].
#[derive(Debug)]
pub struct FilteredListener<L> {
    filter: EventFilter,
    inner: L,
}

impl<L: BlobEventListener> FilteredListener<L> {
    pub fn new(filter: EventFilter, inner: L) -> Self {
        Self { filter, inner }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: BlobEventListener> BlobEventListener for FilteredListener<L> {
    fn supports_event_type(&self, kind: BlobEventKind) -> bool {
        self.filter.allows_kind(kind) && self.inner.supports_event_type(kind)
    }

    fn on_event(&self, event: &BlobEvent) -> ListenerResult<()> {
        self.inner.on_event(event)
    }

    fn accepts(&self, event: &BlobEvent) -> bool {
        self.filter.matches(event) && self.inner.accepts(event)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ---------------------------------------------------------------------------
// LoggingListener
// ---------------------------------------------------------------------------

/// Logs every event at `debug` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingListener;

impl BlobEventListener for LoggingListener {
    fn supports_event_type(&self, _kind: BlobEventKind) -> bool {
        true
    }

    fn on_event(&self, event: &BlobEvent) -> ListenerResult<()> {
        debug!(
            kind = %event.kind(),
            storage = %event.storage(),
            blob_ref = %event.blob_ref(),
            timestamp = %event.timestamp(),
            "blob event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}
