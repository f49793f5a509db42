//! Single-event publish/subscribe.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Unsubscribe capability returned by every subscription.
///
/// Calling it removes the listener. Calling it after the signal (or tree) has
/// been destroyed does nothing.
pub type Disconnect = Box<dyn FnOnce() + Send>;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of listeners fired with a shared payload.
///
/// Cloning a `Signal` creates a new handle to the **same** listener list.
/// Listeners run in registration order. The listener list is snapshotted at
/// the start of [`fire`](Self::fire), so subscriptions added or removed by a
/// listener take effect from the next fire.
pub struct Signal<T> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

struct SignalInner<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
    destroyed: bool,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                next_id: 0,
                listeners: Vec::new(),
                destroyed: false,
            })),
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Signal")
            .field("listeners", &inner.listeners.len())
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its disconnect action.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Disconnect {
        let id = {
            let mut inner = lock(&self.inner);
            if inner.destroyed {
                return Box::new(|| {});
            }
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak = Arc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Invokes every listener with `payload`.
    pub fn fire(&self, payload: &T) {
        let snapshot: Vec<Listener<T>> = lock(&self.inner)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(payload);
        }
    }

    /// Number of live listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every listener. Later subscriptions are ignored.
    pub fn destroy(&self) {
        let mut inner = lock(&self.inner);
        inner.destroyed = true;
        inner.listeners.clear();
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner).destroyed
    }
}
