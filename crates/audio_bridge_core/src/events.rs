//! Host-side event listeners attached to node wrappers.
//!
//! Listeners run synchronously, in registration order, when the owning
//! context routes a native notification to the node. Nothing is queued
//! here; an event with no listeners is simply dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::schema::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: String,
    pub target: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<Mutex<dyn FnMut(&Event) + Send>>;

#[derive(Clone)]
struct ListenerRef {
    id: ListenerId,
    event_type: String,
    /// Set for `on<type>` handler slots.
    handler: bool,
    listener: Listener,
}

#[derive(Default)]
pub struct EventTarget {
    next_id: AtomicU64,
    listeners: Mutex<Vec<ListenerRef>>,
}

impl std::fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn add_listener<F>(&self, event_type: &str, listener: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = self.next_id();
        self.listeners.lock().push(ListenerRef {
            id,
            event_type: event_type.to_string(),
            handler: false,
            listener: Arc::new(Mutex::new(listener)),
        });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Set or clear the `on<type>` handler. A handler keeps the position it
    /// was first given when it is replaced.
    pub fn set_handler<F>(&self, event_type: &str, handler: Option<F>)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let mut listeners = self.listeners.lock();
        let slot = listeners
            .iter()
            .position(|l| l.handler && l.event_type == event_type);

        match (slot, handler) {
            (Some(i), Some(handler)) => listeners[i].listener = Arc::new(Mutex::new(handler)),
            (Some(i), None) => {
                listeners.remove(i);
            }
            (None, Some(handler)) => {
                let id = self.next_id();
                listeners.push(ListenerRef {
                    id,
                    event_type: event_type.to_string(),
                    handler: true,
                    listener: Arc::new(Mutex::new(handler)),
                });
            }
            (None, None) => {}
        }
    }

    pub fn has_handler(&self, event_type: &str) -> bool {
        self.listeners
            .lock()
            .iter()
            .any(|l| l.handler && l.event_type == event_type)
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|l| l.event_type == event_type)
            .count()
    }

    /// Invoke every listener registered for the event's type. Listeners added
    /// while dispatching are not called for the current event. Returns the
    /// number of listeners invoked.
    pub fn dispatch(&self, event: &Event) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .filter(|l| l.event_type == event.event_type)
            .map(|l| Arc::clone(&l.listener))
            .collect();
        tracing::trace!(
            event_type = %event.event_type,
            target = %event.target,
            listeners = snapshot.len(),
            "dispatching event"
        );

        let mut invoked = 0;
        for listener in snapshot {
            // a listener re-dispatching to itself is skipped
            if let Some(mut f) = listener.try_lock() {
                (*f)(event);
                invoked += 1;
            }
        }
        invoked
    }
}
