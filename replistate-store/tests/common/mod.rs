#![allow(dead_code)]

use replistate_schema::Schema;
use replistate_store::{
    AuthoritativeStore, MemoryBackend, ReplicationFrame, StoreConfig,
};
use replistate_types::ValueKind;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const STORE: &str = "PlayerData";

/// `{Resources: {Cash: 0}, Inventory: map({}), Settings: private({Volume: 0.5})}`
pub fn player_schema() -> Schema {
    Schema::table([
        ("Resources", Schema::from(json!({"Cash": 0}))),
        ("Inventory", Schema::map_of(json!({}), ValueKind::Number)),
        ("Settings", Schema::private(json!({"Volume": 0.5}))),
    ])
}

pub struct Harness {
    pub store: AuthoritativeStore,
    pub backend: Arc<MemoryBackend>,
    pub frames: mpsc::UnboundedReceiver<ReplicationFrame>,
}

impl Harness {
    pub fn new(backend: MemoryBackend) -> Self {
        Self::with_config(backend, |c| c)
    }

    pub fn with_config(
        backend: MemoryBackend,
        configure: impl FnOnce(StoreConfig) -> StoreConfig,
    ) -> Self {
        init_tracing();
        let backend = Arc::new(backend);
        let (tx, frames) = mpsc::unbounded_channel();
        let config = StoreConfig::new(STORE, player_schema(), backend.clone(), Arc::new(tx));
        Self {
            store: AuthoritativeStore::new(configure(config)),
            backend,
            frames,
        }
    }

    /// Every frame emitted so far.
    pub fn drain(&mut self) -> Vec<ReplicationFrame> {
        let mut out = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            out.push(frame);
        }
        out
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
