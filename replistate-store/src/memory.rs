//! In-memory persistence backend for tests and local tooling.

use async_trait::async_trait;
use replistate_types::EntityId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::backend::{BackendError, PersistenceBackend, StoredRecord};

/// A [`PersistenceBackend`] backed by a `HashMap`.
///
/// Enforces one open session per entity, like a real session-claiming
/// backend, and offers knobs for exercising failure paths.
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<EntityId, StoredRecord>>,
    open: Mutex<HashSet<EntityId>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    load_gate: Mutex<Option<Arc<Notify>>>,
    end_gate: Mutex<Option<Arc<Notify>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a saved record.
    #[must_use]
    pub fn with_record(self, entity: impl Into<EntityId>, record: StoredRecord) -> Self {
        lock(&self.records).insert(entity.into(), record);
        self
    }

    /// The last saved record for `entity`.
    #[must_use]
    pub fn record(&self, entity: &EntityId) -> Option<StoredRecord> {
        lock(&self.records).get(entity).cloned()
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every subsequent save fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Whether `entity` currently holds a session claim.
    #[must_use]
    pub fn is_open(&self, entity: &EntityId) -> bool {
        lock(&self.open).contains(entity)
    }

    /// Makes `start_session` wait until the returned gate is notified
    /// (`notify_one` releases one pending or future load).
    pub fn hold_loads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.load_gate) = Some(Arc::clone(&gate));
        gate
    }

    /// Like [`hold_loads`](Self::hold_loads), for `end_session`. The claim is
    /// released only once the gate lets the call through.
    pub fn hold_session_ends(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.end_gate) = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn start_session(&self, entity: &EntityId) -> Result<Option<StoredRecord>, BackendError> {
        let gate = lock(&self.load_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if !lock(&self.open).insert(entity.clone()) {
            return Err(BackendError::new(format!("session for {entity} already claimed")));
        }
        Ok(lock(&self.records).get(entity).cloned())
    }

    async fn save(&self, entity: &EntityId, record: &StoredRecord) -> Result<(), BackendError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(BackendError::new(format!("save for {entity} failed")));
        }
        lock(&self.records).insert(entity.clone(), record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn end_session(&self, entity: &EntityId) -> Result<(), BackendError> {
        let gate = lock(&self.end_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.open).remove(entity);
        Ok(())
    }
}
