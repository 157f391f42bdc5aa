//! Typed event registry for waveform notifications
//!
//! Listeners subscribe to an [`EventKind`] and receive the matching
//! [`WaveformEvent`]. Dispatch iterates a snapshot of the listener list, so
//! a listener may subscribe or unsubscribe (itself included) while an event
//! is being delivered without affecting that delivery.
//!
//! The registry is single-threaded (`Rc` + `RefCell`) and never holds a
//! borrow while a listener runs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::WaveformError;

/// Notification names a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    RenderStart,
    RenderComplete,
    Seek,
    ProgressChange,
    Resize,
    Error,
    Destroy,
}

/// Notification payloads
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformEvent {
    /// First animation frame completed after construction
    Ready,
    RenderStart,
    RenderComplete,
    /// User clicked or tapped at a normalized position
    Seek(f32),
    /// Stored progress changed
    ProgressChange(f32),
    /// Host element settled at a new logical size
    Resize { width: f32, height: f32 },
    Error(WaveformError),
    Destroy,
}

impl WaveformEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WaveformEvent::Ready => EventKind::Ready,
            WaveformEvent::RenderStart => EventKind::RenderStart,
            WaveformEvent::RenderComplete => EventKind::RenderComplete,
            WaveformEvent::Seek(_) => EventKind::Seek,
            WaveformEvent::ProgressChange(_) => EventKind::ProgressChange,
            WaveformEvent::Resize { .. } => EventKind::Resize,
            WaveformEvent::Error(_) => EventKind::Error,
            WaveformEvent::Destroy => EventKind::Destroy,
        }
    }
}

/// Handle returned by [`EventRegistry::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&WaveformEvent)>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    listener: Listener,
    once: bool,
    /// Set once a `once` listener has fired (or was removed mid-dispatch)
    spent: Rc<Cell<bool>>,
}

/// Event-name to listener-list registry
#[derive(Default)]
pub struct EventRegistry {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every event of `kind`
    pub fn subscribe(&self, kind: EventKind, listener: impl Fn(&WaveformEvent) + 'static) -> SubscriptionId {
        self.insert(kind, Rc::new(listener), false)
    }

    /// Register a listener that is removed after its first delivery
    pub fn once(&self, kind: EventKind, listener: impl Fn(&WaveformEvent) + 'static) -> SubscriptionId {
        self.insert(kind, Rc::new(listener), true)
    }

    /// Remove a listener; returns false when it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        match subs.iter().position(|s| s.id == id) {
            Some(idx) => {
                let removed = subs.remove(idx);
                removed.spent.set(true);
                true
            }
            None => false,
        }
    }

    /// Remove every listener of every kind
    pub fn clear(&self) {
        let mut subs = self.subscriptions.borrow_mut();
        for sub in subs.iter() {
            sub.spent.set(true);
        }
        subs.clear();
    }

    /// Number of listeners currently registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Deliver an event to a snapshot of the matching listeners
    pub fn emit(&self, event: WaveformEvent) {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, Listener, bool, Rc<Cell<bool>>)> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, Rc::clone(&s.listener), s.once, Rc::clone(&s.spent)))
            .collect();

        for (id, listener, once, spent) in snapshot {
            if once {
                if spent.replace(true) {
                    continue;
                }
                self.unsubscribe(id);
            }
            listener(&event);
        }
    }

    fn insert(&self, kind: EventKind, listener: Listener, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            kind,
            listener,
            once,
            spent: Rc::new(Cell::new(false)),
        });
        id
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("listeners", &self.subscriptions.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl Fn(&WaveformEvent) + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, move |_: &WaveformEvent| c.set(c.get() + 1))
    }

    #[test]
    fn test_emit_reaches_matching_kind_only() {
        let registry = EventRegistry::new();
        let (seeks, on_seek) = counter();
        let (readies, on_ready) = counter();
        registry.subscribe(EventKind::Seek, on_seek);
        registry.subscribe(EventKind::Ready, on_ready);

        registry.emit(WaveformEvent::Seek(0.5));
        registry.emit(WaveformEvent::Seek(0.6));

        assert_eq!(seeks.get(), 2);
        assert_eq!(readies.get(), 0);
    }

    #[test]
    fn test_once_fires_once() {
        let registry = EventRegistry::new();
        let (count, listener) = counter();
        registry.once(EventKind::Destroy, listener);

        registry.emit(WaveformEvent::Destroy);
        registry.emit(WaveformEvent::Destroy);

        assert_eq!(count.get(), 1);
        assert_eq!(registry.listener_count(EventKind::Destroy), 0);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let registry = Rc::new(EventRegistry::new());
        let (count, listener) = counter();

        // First listener removes the second before it would run; the
        // snapshot still delivers to it for this emission.
        let second_id = Rc::new(Cell::new(None));
        let reg = Rc::clone(&registry);
        let sid = Rc::clone(&second_id);
        registry.subscribe(EventKind::RenderComplete, move |_| {
            if let Some(id) = sid.get() {
                reg.unsubscribe(id);
            }
        });
        second_id.set(Some(registry.subscribe(EventKind::RenderComplete, listener)));

        registry.emit(WaveformEvent::RenderComplete);
        assert_eq!(count.get(), 1);

        registry.emit(WaveformEvent::RenderComplete);
        assert_eq!(count.get(), 1, "removed listener no longer called");
    }

    #[test]
    fn test_clear_removes_everything() {
        let registry = EventRegistry::new();
        let (count, listener) = counter();
        registry.subscribe(EventKind::Error, listener);
        registry.clear();
        registry.emit(WaveformEvent::Error(WaveformError::Unknown));
        assert_eq!(count.get(), 0);
        assert!(!registry.unsubscribe(SubscriptionId(0)));
    }
}
