//! The observable, path-addressed data tree.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use replistate_types::Path;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{TreeError, TreeResult};
use crate::signal::{Disconnect, Signal, lock};
use crate::write::{write_creating, write_existing};

/// Injected write check: `Err(reason)` vetoes the write.
pub type WriteValidator = Arc<dyn Fn(&Path, &Value) -> Result<(), String> + Send + Sync>;

/// Payload delivered to tree listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Current value at the listener's own path (`Null` if absent).
    pub value: Value,
    /// The path the listener is registered at.
    pub path: Path,
    /// The value that was written.
    pub changed_value: Value,
    /// The path that was written.
    pub changed_path: Path,
}

/// A plain data tree with path-scoped change notification.
///
/// Cloning an `ObservableTree` creates a new handle to the **same** tree.
/// Internal locks are never held while listeners or the validator run, so
/// listeners may read and write the tree they observe.
///
/// Notifications are delivered in commit order. Each write queues its
/// notifications while it still holds the data lock; whichever caller is not
/// already delivering drains the queue. A write made from inside a listener
/// (or from another thread during delivery) commits immediately and is
/// delivered after the notifications queued before it.
#[derive(Clone)]
pub struct ObservableTree {
    inner: Arc<TreeInner>,
}

struct TreeInner {
    data: RwLock<Value>,
    /// Signals keyed by listener path, created on first subscription.
    signals: Mutex<HashMap<Path, Signal<Change>>>,
    validator: Option<WriteValidator>,
    destroyed: AtomicBool,
    queue: Mutex<NotifyQueue>,
}

#[derive(Default)]
struct NotifyQueue {
    pending: VecDeque<Vec<(Signal<Change>, Change)>>,
    draining: bool,
}

/// Clears the draining flag if a listener panics mid-delivery.
struct DrainGuard<'a>(&'a Mutex<NotifyQueue>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

impl std::fmt::Debug for ObservableTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableTree")
            .field("listeners", &self.listener_count())
            .field("validated", &self.inner.validator.is_some())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl ObservableTree {
    /// Wraps `data` without write validation.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self::build(data, None)
    }

    /// Wraps `data`; every [`set`](Self::set) is checked by `validator` first.
    #[must_use]
    pub fn with_validator(
        data: Value,
        validator: impl Fn(&Path, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self::build(data, Some(Arc::new(validator)))
    }

    fn build(data: Value, validator: Option<WriteValidator>) -> Self {
        Self {
            inner: Arc::new(TreeInner {
                data: RwLock::new(data),
                signals: Mutex::new(HashMap::new()),
                validator,
                destroyed: AtomicBool::new(false),
                queue: Mutex::new(NotifyQueue::default()),
            }),
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns a snapshot of the value at `path`, or `None` if absent.
    #[must_use]
    pub fn get(&self, path: impl Into<Path>) -> Option<Value> {
        self.with(path, |v| v.cloned())
    }

    /// Runs `f` against the live value at `path` without copying it.
    ///
    /// `f` runs under the tree's read lock; it must not write to this tree.
    pub fn with<R>(&self, path: impl Into<Path>, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let path = path.into();
        let data = self.inner.data.read().unwrap_or_else(|e| e.into_inner());
        f(path.resolve(&data))
    }

    /// Deserializes the value at `path` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: impl Into<Path>) -> TreeResult<T> {
        let path = path.into();
        let value = self
            .get(&path)
            .ok_or(TreeError::PathNotFound(path))?;
        Ok(serde_json::from_value(value)?)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Writes `value` at `path`.
    ///
    /// The parent of `path` must already exist. When a validator was supplied
    /// it runs first and may reject the write.
    pub fn set(&self, path: impl Into<Path>, value: Value) -> TreeResult<()> {
        let path = path.into();
        if let Some(validator) = &self.inner.validator {
            if let Err(reason) = validator(&path, &value) {
                debug!(path = %path, %reason, "write rejected by validator");
                return Err(TreeError::ValidationRejected { path, reason });
            }
        }

        {
            let mut data = self.inner.data.write().unwrap_or_else(|e| e.into_inner());
            write_existing(&mut data, &path, value.clone())?;
            self.enqueue(&data, &path, &value, false);
        }
        self.drain();
        Ok(())
    }

    /// Writes `value` at `path`, creating missing intermediate nodes and
    /// skipping validation. Used for trusted data from a replication source.
    pub fn apply_update(&self, path: impl Into<Path>, value: Value) {
        let path = path.into();
        {
            let mut data = self.inner.data.write().unwrap_or_else(|e| e.into_inner());
            write_creating(&mut data, &path, value.clone());
            self.enqueue(&data, &path, &value, false);
        }
        self.drain();
    }

    /// Like [`apply_update`](Self::apply_update), but additionally notifies
    /// every listener registered beneath `path`, shallowest first.
    ///
    /// Used for whole-subtree replacements such as an initial snapshot, so
    /// listeners registered before any data arrived observe it landing.
    pub fn apply_snapshot(&self, path: impl Into<Path>, value: Value) {
        self.apply_snapshot_with(path, value, || {});
    }

    /// [`apply_snapshot`](Self::apply_snapshot), running `on_commit` after
    /// the value has landed and before any listener is notified.
    pub fn apply_snapshot_with(&self, path: impl Into<Path>, value: Value, on_commit: impl FnOnce()) {
        let path = path.into();
        {
            let mut data = self.inner.data.write().unwrap_or_else(|e| e.into_inner());
            write_creating(&mut data, &path, value.clone());
            self.enqueue(&data, &path, &value, true);
        }
        on_commit();
        self.drain();
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Registers `listener` for every write at or below `path`.
    pub fn listen(
        &self,
        path: impl Into<Path>,
        listener: impl Fn(&Change) + Send + Sync + 'static,
    ) -> Disconnect {
        let path = path.into();
        let disconnect = {
            let mut signals = lock(&self.inner.signals);
            if self.is_destroyed() {
                return Box::new(|| {});
            }
            signals.entry(path.clone()).or_default().subscribe(listener)
        };

        let weak = Arc::downgrade(&self.inner);
        Box::new(move || {
            disconnect();
            if let Some(inner) = weak.upgrade() {
                let mut signals = lock(&inner.signals);
                if signals.get(&path).is_some_and(Signal::is_empty) {
                    signals.remove(&path);
                }
            }
        })
    }

    /// Like [`listen`](Self::listen), then immediately invokes `listener`
    /// once with the current value at `path`.
    pub fn bind(
        &self,
        path: impl Into<Path>,
        listener: impl Fn(&Change) + Send + Sync + 'static,
    ) -> Disconnect {
        let path = path.into();
        let listener = Arc::new(listener);
        let registered = Arc::clone(&listener);
        let disconnect = self.listen(path.clone(), move |change| registered(change));

        if !self.is_destroyed() {
            let current = self.get(&path).unwrap_or(Value::Null);
            listener(&Change {
                value: current.clone(),
                path: path.clone(),
                changed_value: current,
                changed_path: path,
            });
        }
        disconnect
    }

    /// Releases every signal. Outstanding disconnect actions become no-ops
    /// and later writes notify nobody.
    pub fn destroy(&self) {
        let drained: Vec<Signal<Change>> = {
            let mut signals = lock(&self.inner.signals);
            self.inner.destroyed.store(true, Ordering::SeqCst);
            signals.drain().map(|(_, s)| s).collect()
        };
        for signal in drained {
            signal.destroy();
        }
    }

    /// Whether both handles refer to the same tree.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Total live listeners across all paths.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.signals).values().map(Signal::len).sum()
    }

    /// Queues one notification per signal on the ancestor chain of
    /// `changed_path` (root first), plus, when `descendants` is set, every
    /// signal beneath it (shallowest first, then by path).
    ///
    /// Called with the data write lock held so queue order is commit order.
    /// Each payload's `value` is captured here, as of this commit.
    fn enqueue(&self, data: &Value, changed_path: &Path, changed_value: &Value, descendants: bool) {
        let targets: Vec<(Path, Signal<Change>)> = {
            let signals = lock(&self.inner.signals);
            if signals.is_empty() {
                return;
            }
            let mut targets: Vec<(Path, Signal<Change>)> = changed_path
                .ancestors()
                .filter_map(|p| signals.get(&p).cloned().map(|s| (p, s)))
                .collect();
            if descendants {
                let mut below: Vec<(Path, Signal<Change>)> = signals
                    .iter()
                    .filter(|(p, _)| p.len() > changed_path.len() && p.starts_with(changed_path))
                    .map(|(p, s)| (p.clone(), s.clone()))
                    .collect();
                below.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
                targets.extend(below);
            }
            targets
        };
        if targets.is_empty() {
            return;
        }

        let batch = targets
            .into_iter()
            .map(|(path, signal)| {
                let value = path.resolve(data).cloned().unwrap_or(Value::Null);
                let change = Change {
                    value,
                    path,
                    changed_value: changed_value.clone(),
                    changed_path: changed_path.clone(),
                };
                (signal, change)
            })
            .collect();
        lock(&self.inner.queue).pending.push_back(batch);
    }

    /// Delivers queued notifications unless another caller already is.
    fn drain(&self) {
        {
            let mut queue = lock(&self.inner.queue);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }
        let _guard = DrainGuard(&self.inner.queue);

        loop {
            let batch = {
                let mut queue = lock(&self.inner.queue);
                match queue.pending.pop_front() {
                    Some(batch) => batch,
                    None => {
                        // Cleared under the lock that saw the queue empty.
                        queue.draining = false;
                        return;
                    }
                }
            };
            for (signal, change) in batch {
                signal.fire(&change);
            }
        }
    }
}
