//! Interaction event hub.
//!
//! The presentation shell forwards raw user interactions here; components
//! subscribe per event kind. Listeners are passive: they observe an event
//! and have no way to cancel or consume it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A user interaction the shell can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    PointerDown,
    PointerMove,
    KeyDown,
    TouchStart,
    Scroll,
    Focus,
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::PointerDown => write!(f, "pointerdown"),
            InteractionKind::PointerMove => write!(f, "pointermove"),
            InteractionKind::KeyDown => write!(f, "keydown"),
            InteractionKind::TouchStart => write!(f, "touchstart"),
            InteractionKind::Scroll => write!(f, "scroll"),
            InteractionKind::Focus => write!(f, "focus"),
        }
    }
}

/// Handle returned by [`InteractionHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(InteractionKind) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: InteractionKind,
    callback: Callback,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Fan-out point for user interaction events. Clones share listeners.
#[derive(Clone, Default)]
pub struct InteractionHub {
    inner: Arc<Mutex<HubInner>>,
}

impl InteractionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `callback` for events of `kind`.
    pub fn subscribe<F>(&self, kind: InteractionKind, callback: F) -> ListenerId
    where
        F: Fn(InteractionKind) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push(Listener {
            id,
            kind,
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|l| l.id != id);
        inner.listeners.len() != before
    }

    /// Delivers an event to every listener registered for its kind and
    /// returns how many were notified.
    pub fn dispatch(&self, kind: InteractionKind) -> usize {
        // Callbacks run outside the lock so they may (un)subscribe.
        let callbacks: Vec<Callback> = self
            .lock()
            .listeners
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| Arc::clone(&l.callback))
            .collect();

        for callback in &callbacks {
            callback(kind);
        }
        callbacks.len()
    }

    /// Total number of registered listeners across all kinds.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

impl fmt::Debug for InteractionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
