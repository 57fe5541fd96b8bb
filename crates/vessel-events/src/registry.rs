use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{debug, error, warn};

use crate::event::BlobEvent;
use crate::listener::BlobEventListener;

/// Outcome of one [`EventRegistry::publish`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Listeners that handled the event successfully.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

impl DispatchSummary {
    /// Listeners that were called at all.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// A registry that routes blob events to listeners.
pub trait EventRegistry: Send + Sync {
    /// Register a listener. Returns `false` if this exact instance is already
    /// registered (or the registry discards listeners).
    fn add_listener(&self, listener: Arc<dyn BlobEventListener>) -> bool;

    /// Unregister a listener. Returns `false` if it was not registered.
    fn remove_listener(&self, listener: &Arc<dyn BlobEventListener>) -> bool;

    /// Deliver `event` to every interested listener. Never fails.
    fn publish(&self, event: &BlobEvent) -> DispatchSummary;

    /// Number of registered listeners.
    fn listener_count(&self) -> usize;
}

impl<T: EventRegistry + ?Sized> EventRegistry for Arc<T> {
    fn add_listener(&self, listener: Arc<dyn BlobEventListener>) -> bool {
        (**self).add_listener(listener)
    }

    fn remove_listener(&self, listener: &Arc<dyn BlobEventListener>) -> bool {
        (**self).remove_listener(listener)
    }

    fn publish(&self, event: &BlobEvent) -> DispatchSummary {
        (**self).publish(event)
    }

    fn listener_count(&self) -> usize {
        (**self).listener_count()
    }
}

type ListenerList = Arc<Vec<Arc<dyn BlobEventListener>>>;

/// Identity of a listener instance. Only the data pointer is compared; vtable
/// pointers for the same type may differ between codegen units.
fn same_listener(a: &Arc<dyn BlobEventListener>, b: &Arc<dyn BlobEventListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// ListenerRegistry
// ---------------------------------------------------------------------------

/// Copy-on-write listener registry.
///
/// Registration replaces the whole listener list; `publish` clones the
/// current `Arc` under a short read lock and dispatches without holding it.
/// A listener may therefore add or remove listeners (itself included) from
/// inside `on_event`; the change applies from the next publish onwards.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<ListenerList>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> ListenerList {
        self.listeners.read().expect("lock poisoned").clone()
    }
}

impl EventRegistry for ListenerRegistry {
    fn add_listener(&self, listener: Arc<dyn BlobEventListener>) -> bool {
        let mut guard = self.listeners.write().expect("lock poisoned");
        if guard.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        debug!(listener = listener.name(), "listener registered");
        next.push(listener);
        *guard = Arc::new(next);
        true
    }

    fn remove_listener(&self, listener: &Arc<dyn BlobEventListener>) -> bool {
        let mut guard = self.listeners.write().expect("lock poisoned");
        let Some(pos) = guard.iter().position(|l| same_listener(l, listener)) else {
            return false;
        };
        let mut next: Vec<_> = guard.iter().cloned().collect();
        next.remove(pos);
        *guard = Arc::new(next);
        debug!(listener = listener.name(), "listener removed");
        true
    }

    fn publish(&self, event: &BlobEvent) -> DispatchSummary {
        let listeners = self.snapshot();
        let mut summary = DispatchSummary::default();

        for listener in listeners.iter() {
            if !listener.accepts(event) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => summary.delivered += 1,
                Ok(Err(e)) => {
                    summary.failed += 1;
                    warn!(
                        listener = listener.name(),
                        kind = %event.kind(),
                        blob_ref = %event.blob_ref(),
                        error = %e,
                        "listener failed"
                    );
                }
                Err(payload) => {
                    summary.failed += 1;
                    error!(
                        listener = listener.name(),
                        kind = %event.kind(),
                        blob_ref = %event.blob_ref(),
                        panic = panic_message(payload.as_ref()),
                        "listener panicked"
                    );
                }
            }
        }

        debug!(
            kind = %event.kind(),
            storage = %event.storage(),
            blob_ref = %event.blob_ref(),
            delivered = summary.delivered,
            failed = summary.failed,
            "event published"
        );
        summary
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().expect("lock poisoned").len()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.snapshot().iter().map(|l| l.name().to_string()).collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &names)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// NoopEventRegistry
// ---------------------------------------------------------------------------

/// Registry for storages with eventing turned off.
///
/// Accepts registrations without keeping them and drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventRegistry;

impl NoopEventRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl EventRegistry for NoopEventRegistry {
    fn add_listener(&self, _listener: Arc<dyn BlobEventListener>) -> bool {
        false
    }

    fn remove_listener(&self, _listener: &Arc<dyn BlobEventListener>) -> bool {
        false
    }

    fn publish(&self, _event: &BlobEvent) -> DispatchSummary {
        DispatchSummary::default()
    }

    fn listener_count(&self) -> usize {
        0
    }
}
