//! Server-side store: owns, validates and replicates entity trees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use replistate_schema::{CompiledSchema, Migrations, NO_DATA_VERSION, Schema};
use replistate_tree::{Disconnect, ObservableTree};
use replistate_types::{EntityId, Path};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::backend::{PersistenceBackend, StoredRecord};
use crate::error::{StoreError, StoreResult};
use crate::protocol::{ReplicationFrame, ReplicationMessage};
use crate::session::{
    EntitySession, PreSaveHook, SessionEndHandler, SessionEndReason, SessionState, Slot,
};
use crate::sink::ReplicationSink;

/// Configuration for an [`AuthoritativeStore`].
pub struct StoreConfig {
    /// Identifier shared with the matching mirror store.
    pub store_id: String,
    pub schema: Schema,
    pub backend: Arc<dyn PersistenceBackend>,
    /// Where replication frames go.
    pub sink: Arc<dyn ReplicationSink>,
    pub migrations: Migrations,
}

impl StoreConfig {
    pub fn new(
        store_id: impl Into<String>,
        schema: Schema,
        backend: Arc<dyn PersistenceBackend>,
        sink: Arc<dyn ReplicationSink>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            schema,
            backend,
            sink,
            migrations: Migrations::new(),
        }
    }

    #[must_use]
    pub fn with_migrations(mut self, migrations: Migrations) -> Self {
        self.migrations = migrations;
        self
    }
}

/// Creates a shareable authoritative store.
pub fn create_authoritative_store(config: StoreConfig) -> Arc<AuthoritativeStore> {
    Arc::new(AuthoritativeStore::new(config))
}

/// The authoritative copy of every loaded entity's tree.
pub struct AuthoritativeStore {
    store_id: String,
    schema: Arc<CompiledSchema>,
    migrations: Migrations,
    backend: Arc<dyn PersistenceBackend>,
    sink: Arc<dyn ReplicationSink>,
    sessions: Mutex<HashMap<EntityId, Slot>>,
    pre_save: Mutex<Vec<PreSaveHook>>,
    on_session_end: RwLock<SessionEndHandler>,
    /// Woken on every session table change.
    changed: Notify,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn disconnect_entity(entity: &EntityId, reason: &SessionEndReason) {
    warn!(%entity, %reason, "session ended; entity should be disconnected");
}

impl AuthoritativeStore {
    pub fn new(config: StoreConfig) -> Self {
        let on_session_end: SessionEndHandler = Arc::new(disconnect_entity);
        Self {
            store_id: config.store_id,
            schema: Arc::new(CompiledSchema::compile(&config.schema)),
            migrations: config.migrations,
            backend: config.backend,
            sink: config.sink,
            sessions: Mutex::new(HashMap::new()),
            pre_save: Mutex::new(Vec::new()),
            on_session_end: RwLock::new(on_session_end),
            changed: Notify::new(),
        }
    }

    #[must_use]
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    #[must_use]
    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    // ── Hooks ────────────────────────────────────────────────────

    /// Replaces the session-end action (default: log and expect the caller
    /// to disconnect the entity).
    pub fn on_session_end(&self, handler: impl Fn(&EntityId, &SessionEndReason) + Send + Sync + 'static) {
        *self
            .on_session_end
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(handler);
    }

    /// Adds a hook that may adjust data right before it is saved.
    pub fn on_before_save(&self, hook: impl Fn(&EntityId, &mut Value) + Send + Sync + 'static) {
        lock(&self.pre_save).push(Arc::new(hook));
    }

    fn fire_session_end(&self, entity: &EntityId, reason: &SessionEndReason) {
        let handler = Arc::clone(
            &self
                .on_session_end
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );
        handler(entity, reason);
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Loads an entity and starts replicating it.
    ///
    /// Emits one root-level frame with the full private-filtered tree before
    /// returning. If `unload` is requested while the backend call is in
    /// flight, the load is abandoned and returns [`StoreError::LoadCancelled`].
    pub async fn load(&self, entity: impl Into<EntityId>) -> StoreResult<ObservableTree> {
        let entity = entity.into();
        {
            let mut sessions = lock(&self.sessions);
            if sessions.contains_key(&entity) {
                return Err(StoreError::SessionActive(entity));
            }
            sessions.insert(entity.clone(), Slot::Loading { cancelled: false });
        }
        self.changed.notify_waiters();
        info!(store = %self.store_id, %entity, "loading entity");

        let stored = match self.backend.start_session(&entity).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(store = %self.store_id, %entity, error = %e, "backend refused session");
                self.release(&entity);
                self.fire_session_end(&entity, &SessionEndReason::ClaimFailed(e.clone()));
                return Err(e.into());
            }
        };

        if self.take_if_cancelled(&entity) {
            return self.abandon_load(entity).await;
        }

        let (mut data, stored_version) = match stored {
            Some(record) => (record.data, record.version),
            None => (self.schema.template().clone(), NO_DATA_VERSION),
        };
        let version = self.migrations.run(stored_version, &mut data);

        if let Err(err) = self.schema.validate_data(&data) {
            warn!(store = %self.store_id, %entity, error = %err, "loaded data failed validation");
            self.set_slot(&entity, Slot::Unloading);
            self.end_backend_session(&entity).await;
            self.release(&entity);
            self.fire_session_end(&entity, &SessionEndReason::StructuralValidationFailed(err.clone()));
            return Err(err.into());
        }

        let schema = Arc::clone(&self.schema);
        let tree = ObservableTree::with_validator(data, move |path, value| {
            schema.validate_write(path, value).map_err(|e| e.to_string())
        });

        let activated = {
            let mut sessions = lock(&self.sessions);
            match sessions.get(&entity) {
                Some(Slot::Loading { cancelled: false }) => {
                    sessions.insert(
                        entity.clone(),
                        Slot::Active(EntitySession {
                            tree: tree.clone(),
                            version,
                            replication: None,
                        }),
                    );
                    true
                }
                _ => {
                    sessions.insert(entity.clone(), Slot::Unloading);
                    false
                }
            }
        };
        if !activated {
            tree.destroy();
            return self.abandon_load(entity).await;
        }

        let replication = self.start_replication(&entity, &tree);
        self.attach_replication(&entity, &tree, replication);
        self.changed.notify_waiters();
        info!(store = %self.store_id, %entity, version, "entity active");
        Ok(tree)
    }

    /// Stops replication, saves and releases an entity.
    ///
    /// Requesting unload while the entity is still loading marks the load as
    /// cancelled and returns immediately.
    pub async fn unload(&self, entity: impl Into<EntityId>) -> StoreResult<()> {
        let entity = entity.into();
        let mut session = {
            let mut sessions = lock(&self.sessions);
            match sessions.remove(&entity) {
                None => return Err(StoreError::NotLoaded(entity)),
                Some(Slot::Loading { .. }) => {
                    debug!(store = %self.store_id, %entity, "unload requested during load");
                    sessions.insert(entity, Slot::Loading { cancelled: true });
                    return Ok(());
                }
                Some(Slot::Unloading) => {
                    sessions.insert(entity, Slot::Unloading);
                    return Ok(());
                }
                Some(Slot::Active(session)) => {
                    sessions.insert(entity.clone(), Slot::Unloading);
                    session
                }
            }
        };
        self.changed.notify_waiters();

        session.close();
        let mut data = session.tree.get(Path::root()).unwrap_or(Value::Null);
        let hooks: Vec<PreSaveHook> = lock(&self.pre_save).clone();
        for hook in hooks {
            hook(&entity, &mut data);
        }

        let record = StoredRecord {
            data,
            version: session.version,
        };
        let saved = self.backend.save(&entity, &record).await;
        self.end_backend_session(&entity).await;
        self.release(&entity);

        match saved {
            Ok(()) => {
                info!(store = %self.store_id, %entity, "entity saved and unloaded");
                Ok(())
            }
            Err(e) => {
                warn!(store = %self.store_id, %entity, error = %e, "save failed during unload");
                self.fire_session_end(&entity, &SessionEndReason::SaveFailed(e.clone()));
                Err(e.into())
            }
        }
    }

    /// Unloads every active entity. Returns the first failure after trying
    /// them all.
    pub async fn unload_all(&self) -> StoreResult<()> {
        let active: Vec<EntityId> = lock(&self.sessions)
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
            .map(|(id, _)| id.clone())
            .collect();

        let mut first_err = None;
        for entity in active {
            if let Err(e) = self.unload(entity).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Reports that the backend ended an entity's session on its own.
    ///
    /// The tree is torn down without saving and the session-end action runs.
    pub fn notify_session_ended(&self, entity: impl Into<EntityId>, reason: impl Into<String>) {
        let entity = entity.into();
        let removed = {
            let mut sessions = lock(&self.sessions);
            match sessions.remove(&entity) {
                None => return,
                Some(Slot::Unloading) => {
                    sessions.insert(entity, Slot::Unloading);
                    return;
                }
                Some(Slot::Loading { .. }) => {
                    sessions.insert(entity.clone(), Slot::Loading { cancelled: true });
                    None
                }
                Some(Slot::Active(session)) => Some(session),
            }
        };
        if let Some(mut session) = removed {
            session.close();
            self.changed.notify_waiters();
        }
        self.fire_session_end(&entity, &SessionEndReason::Released(reason.into()));
    }

    // ── Access ───────────────────────────────────────────────────

    /// The entity's tree for validated writes, if active.
    #[must_use]
    pub fn observe(&self, entity: &EntityId) -> Option<ObservableTree> {
        match lock(&self.sessions).get(entity) {
            Some(Slot::Active(session)) => Some(session.tree.clone()),
            _ => None,
        }
    }

    /// Snapshot of the entity's whole tree, if active.
    #[must_use]
    pub fn get_data(&self, entity: &EntityId) -> Option<Value> {
        self.observe(entity).and_then(|tree| tree.get(Path::root()))
    }

    /// Migration version of the active session's data.
    #[must_use]
    pub fn version(&self, entity: &EntityId) -> Option<i64> {
        match lock(&self.sessions).get(entity) {
            Some(Slot::Active(session)) => Some(session.version),
            _ => None,
        }
    }

    #[must_use]
    pub fn state(&self, entity: &EntityId) -> SessionState {
        lock(&self.sessions)
            .get(entity)
            .map_or(SessionState::Unloaded, Slot::state)
    }

    /// Waits for the entity to become active.
    ///
    /// Resolves to `None` once `timeout` elapses; the load itself is not
    /// affected.
    pub async fn wait_for_data(
        &self,
        entity: &EntityId,
        timeout: Option<Duration>,
    ) -> Option<ObservableTree> {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(tree) = self.observe(entity) {
                    return tree;
                }
                notified.await;
            }
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.ok(),
            None => Some(wait.await),
        }
    }

    // ── Internals ────────────────────────────────────────────────

    /// Binds the root of `tree` so each accepted write becomes a frame.
    fn start_replication(&self, entity: &EntityId, tree: &ObservableTree) -> Disconnect {
        let schema = Arc::clone(&self.schema);
        let sink = Arc::clone(&self.sink);
        let store = self.store_id.clone();
        let entity = entity.clone();

        tree.bind(Path::root(), move |change| {
            let Some(value) = schema.redact(&change.changed_path, change.changed_value.clone())
            else {
                debug!(%entity, path = %change.changed_path, "private write not replicated");
                return;
            };
            sink.send(ReplicationFrame {
                store: store.clone(),
                entity: entity.clone(),
                message: ReplicationMessage {
                    path: change.changed_path.clone(),
                    value,
                },
            });
        })
    }

    /// Stores the replication binding on the session it was made for. If the
    /// session was already closed, the binding is released instead.
    fn attach_replication(&self, entity: &EntityId, tree: &ObservableTree, replication: Disconnect) {
        let mut sessions = lock(&self.sessions);
        match sessions.get_mut(entity) {
            Some(Slot::Active(session)) if session.tree.ptr_eq(tree) => {
                session.replication = Some(replication);
            }
            _ => {
                drop(sessions);
                replication();
            }
        }
    }

    fn set_slot(&self, entity: &EntityId, slot: Slot) {
        lock(&self.sessions).insert(entity.clone(), slot);
        self.changed.notify_waiters();
    }

    fn release(&self, entity: &EntityId) {
        lock(&self.sessions).remove(entity);
        self.changed.notify_waiters();
    }

    /// Moves a cancelled loading slot to `Unloading`; returns whether it was
    /// cancelled.
    fn take_if_cancelled(&self, entity: &EntityId) -> bool {
        let mut sessions = lock(&self.sessions);
        if matches!(sessions.get(entity), Some(Slot::Loading { cancelled: true })) {
            sessions.insert(entity.clone(), Slot::Unloading);
            return true;
        }
        false
    }

    /// Ends the backend session of a cancelled load. The slot stays
    /// `Unloading` until the backend has released its claim.
    async fn abandon_load(&self, entity: EntityId) -> StoreResult<ObservableTree> {
        debug!(store = %self.store_id, %entity, "load abandoned after unload request");
        self.changed.notify_waiters();
        self.end_backend_session(&entity).await;
        self.release(&entity);
        Err(StoreError::LoadCancelled(entity))
    }

    async fn end_backend_session(&self, entity: &EntityId) {
        if let Err(e) = self.backend.end_session(entity).await {
            warn!(store = %self.store_id, %entity, error = %e, "failed to end backend session");
        }
    }
}
