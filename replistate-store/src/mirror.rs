//! Client-side read-only mirror of authoritative entity trees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use replistate_schema::{CompiledSchema, Schema};
use replistate_tree::{Change, Disconnect, ObservableTree, TreeResult};
use replistate_types::{EntityId, Path};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::protocol::{ReplicationFrame, ReplicationMessage};

/// Configuration for a [`MirrorStore`].
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Must equal the authoritative store's id.
    pub store_id: String,
    pub schema: Schema,
}

impl MirrorConfig {
    pub fn new(store_id: impl Into<String>, schema: Schema) -> Self {
        Self {
            store_id: store_id.into(),
            schema,
        }
    }
}

/// Creates a shareable mirror store.
pub fn create_mirror_store(config: MirrorConfig) -> Arc<MirrorStore> {
    Arc::new(MirrorStore::new(config))
}

struct MirrorEntry {
    tree: ObservableTree,
    loaded: watch::Sender<bool>,
}

/// Holds one replicated tree per entity.
pub struct MirrorStore {
    store_id: String,
    schema: CompiledSchema,
    entries: Mutex<HashMap<EntityId, MirrorEntry>>,
}

impl MirrorStore {
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            store_id: config.store_id,
            schema: CompiledSchema::compile(&config.schema),
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<EntityId, MirrorEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read-only view of an entity, created from the client template on first
    /// access. Reads return schema defaults until the first frame lands.
    pub fn entity(&self, entity: impl Into<EntityId>) -> MirrorView {
        let entity = entity.into();
        let mut entries = self.entries();
        let entry = entries.entry(entity.clone()).or_insert_with(|| {
            debug!(store = %self.store_id, %entity, "creating mirror tree");
            MirrorEntry {
                tree: ObservableTree::new(self.schema.client_template().clone()),
                loaded: watch::channel(false).0,
            }
        });
        MirrorView {
            entity,
            tree: entry.tree.clone(),
            loaded: entry.loaded.subscribe(),
        }
    }

    /// Applies one inbound frame. Returns `false` if the frame was addressed
    /// to a different store.
    ///
    /// A root-path frame replaces the whole tree and notifies every listener
    /// on the entity, so listeners registered before any data arrived fire
    /// once the snapshot lands.
    pub fn apply(&self, frame: ReplicationFrame) -> bool {
        if frame.store != self.store_id {
            warn!(
                expected = %self.store_id,
                got = %frame.store,
                entity = %frame.entity,
                "frame for another store ignored"
            );
            return false;
        }

        let view = self.entity(frame.entity);
        let ReplicationMessage { path, value } = frame.message;
        if path.is_root() {
            view.tree
                .apply_snapshot_with(path, value, || self.mark_loaded(&view.entity));
        } else {
            view.tree.apply_update(path, value);
            self.mark_loaded(&view.entity);
        }
        true
    }

    /// Flips the entity's loaded flag, before listeners see a snapshot.
    fn mark_loaded(&self, entity: &EntityId) {
        if let Some(entry) = self.entries().get(entity) {
            if !entry.loaded.send_replace(true) {
                info!(store = %self.store_id, %entity, "mirror loaded");
            }
        }
    }

    /// Applies frames from `receiver` until the channel closes.
    pub async fn run(&self, mut receiver: mpsc::UnboundedReceiver<ReplicationFrame>) {
        while let Some(frame) = receiver.recv().await {
            self.apply(frame);
        }
        debug!(store = %self.store_id, "replication channel closed");
    }

    /// Drops an entity's tree and releases its listeners.
    pub fn remove(&self, entity: &EntityId) -> bool {
        let Some(entry) = self.entries().remove(entity) else {
            return false;
        };
        entry.tree.destroy();
        true
    }

    /// Entities currently mirrored.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.entries().keys().cloned().collect()
    }
}

/// Read-only handle to one mirrored entity.
#[derive(Clone)]
pub struct MirrorView {
    entity: EntityId,
    tree: ObservableTree,
    loaded: watch::Receiver<bool>,
}

impl std::fmt::Debug for MirrorView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorView")
            .field("entity", &self.entity)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl MirrorView {
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    #[must_use]
    pub fn get(&self, path: impl Into<Path>) -> Option<Value> {
        self.tree.get(path)
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: impl Into<Path>) -> TreeResult<T> {
        self.tree.get_as(path)
    }

    pub fn with<R>(&self, path: impl Into<Path>, f: impl FnOnce(Option<&Value>) -> R) -> R {
        self.tree.with(path, f)
    }

    pub fn listen(
        &self,
        path: impl Into<Path>,
        listener: impl Fn(&Change) + Send + Sync + 'static,
    ) -> Disconnect {
        self.tree.listen(path, listener)
    }

    pub fn bind(
        &self,
        path: impl Into<Path>,
        listener: impl Fn(&Change) + Send + Sync + 'static,
    ) -> Disconnect {
        self.tree.bind(path, listener)
    }

    /// Whether at least one frame has been applied.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    /// Waits for the first frame. Returns `false` if `timeout` elapses or the
    /// entity is removed first.
    pub async fn wait_until_loaded(&self, timeout: Option<Duration>) -> bool {
        let mut loaded = self.loaded.clone();
        let wait = async move { loaded.wait_for(|l| *l).await.is_ok() };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.unwrap_or(false),
            None => wait.await,
        }
    }
}
