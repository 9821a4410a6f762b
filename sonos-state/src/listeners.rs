//! Observer registry shared by devices, rooms and the controller
//!
//! Each emitting entity owns a [`Listeners`] list. Any number of callbacks can
//! be registered, either for every event or for one [`EventKind`], and
//! removed again by the [`ListenerId`] returned at registration.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Events that can be filtered by kind
pub trait EventKind {
    /// Fieldless discriminant of the event
    type Kind: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`Listeners::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback<S, E> = Arc<dyn Fn(&S, &E) + Send + Sync>;

struct Entry<S, E: EventKind> {
    id: ListenerId,
    kind: Option<E::Kind>,
    callback: Callback<S, E>,
}

/// Registered callbacks for events of type `E` emitted by a source `S`
pub struct Listeners<S, E: EventKind> {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry<S, E>>>,
}

impl<S, E: EventKind> Listeners<S, E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback for every event
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&S, &E) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(callback))
    }

    /// Register a callback for events of one kind only
    pub fn subscribe_to<F>(&self, kind: E::Kind, callback: F) -> ListenerId
    where
        F: Fn(&S, &E) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(callback))
    }

    /// Remove a callback. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Invoke every matching callback in registration order.
    ///
    /// Callbacks run without the registry lock held, so they may subscribe
    /// or unsubscribe.
    pub fn emit(&self, source: &S, event: &E) {
        let kind = event.kind();
        let matching: Vec<Callback<S, E>> = self
            .entries
            .read()
            .iter()
            .filter(|entry| entry.kind.map_or(true, |k| k == kind))
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for callback in matching {
            callback(source, event);
        }
    }

    fn register(&self, kind: Option<E::Kind>, callback: Callback<S, E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Entry { id, kind, callback });
        id
    }
}

impl<S, E: EventKind> Default for Listeners<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, E: EventKind> fmt::Debug for Listeners<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}
