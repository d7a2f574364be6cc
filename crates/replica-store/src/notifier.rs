use std::sync::{PoisonError, RwLock};

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::event::{EventKind, StoreEvent};

/// Filter for subscribing to a subset of store events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
    /// If set, only events whose path starts with this string are delivered.
    pub path_prefix: Option<String>,
}

impl EventFilter {
    /// Every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only events of one kind.
    pub fn kind(kind: EventKind) -> Self {
        Self {
            kinds: Some(vec![kind]),
            path_prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &StoreEvent) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        if let Some(ref prefix) = self.path_prefix {
            if !event.path().has_prefix(prefix) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for store events.
pub type EventStream = broadcast::Receiver<StoreEvent>;

/// The events of one initial-state seeding. Unbounded, so nothing is lost to
/// lag; yields `None` once every event has been received.
pub type InitialStream = mpsc::UnboundedReceiver<StoreEvent>;

/// Queue the events matching `filter` on a fresh [`InitialStream`].
pub fn seed(filter: &EventFilter, events: Vec<StoreEvent>) -> InitialStream {
    let (tx, rx) = mpsc::unbounded_channel();
    for event in events.into_iter().filter(|event| filter.matches(event)) {
        // The receiver is still held here, so sending cannot fail.
        let _ = tx.send(event);
    }
    rx
}

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<StoreEvent>,
}

/// Fan-out of committed events to filtered subscribers.
///
/// Only the store publishes, and only with the outbox of a unit of work that
/// has already committed.
pub struct Notifier {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber with the given filter.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (tx, rx) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Deliver committed events in order.
    pub fn publish(&self, events: Vec<StoreEvent>) {
        if events.is_empty() {
            return;
        }
        let count = events.len();
        for event in &events {
            self.route(event);
        }
        debug!(count, "events published");
    }

    /// Route an event to all matching subscribers.
    /// Subscribers whose receivers are gone are pruned.
    fn route(&self, event: &StoreEvent) {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}
