//! Authoritative and mirror stores for replistate.
//!
//! # Architecture
//!
//! An [`AuthoritativeStore`] (server side) owns one [`ObservableTree`] per
//! loaded entity. Loading pulls raw data from a [`PersistenceBackend`], runs
//! [`Migrations`], checks the result structurally, then wraps it in a tree
//! whose writes are validated against the compiled schema. A root-level
//! binding turns every accepted write into a [`ReplicationFrame`] (private
//! paths filtered out) and hands it to a [`ReplicationSink`].
//!
//! A [`MirrorStore`] (client side) seeds one tree per entity from the
//! schema's client template and applies inbound frames without validation.
//! Consumers read and observe through a [`MirrorView`], which has no write
//! operation.
//!
//! ## Replication order
//!
//! 1. Load completes: one root-path frame carrying the full private-filtered
//!    tree.
//! 2. Each accepted write: one frame `(path, value)`, unless `path` is
//!    private.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use replistate_schema::Schema;
//! use replistate_store::{
//!     AuthoritativeStore, MemoryBackend, MirrorConfig, MirrorStore, StoreConfig,
//! };
//! use serde_json::json;
//! use tokio::sync::mpsc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let schema = Schema::table([
//!     ("Resources", Schema::from(json!({"Cash": 0}))),
//!     ("Settings", Schema::private(json!({"Volume": 0.5}))),
//! ]);
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let server = AuthoritativeStore::new(StoreConfig::new(
//!     "PlayerData",
//!     schema.clone(),
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(tx),
//! ));
//! let client = MirrorStore::new(MirrorConfig::new("PlayerData", schema));
//!
//! let tree = server.load("player-1").await.unwrap();
//! tree.set("Resources/Cash", json!(100)).unwrap();
//!
//! while let Ok(frame) = rx.try_recv() {
//!     client.apply(frame);
//! }
//! let view = client.entity("player-1");
//! assert_eq!(view.get("Resources/Cash"), Some(json!(100)));
//! assert_eq!(view.get("Settings"), None);
//! # });
//! ```
//!
//! [`ObservableTree`]: replistate_tree::ObservableTree
//! [`Migrations`]: replistate_schema::Migrations

mod authoritative;
mod backend;
mod error;
mod memory;
mod mirror;
pub mod protocol;
mod session;
mod sink;

pub use authoritative::{AuthoritativeStore, StoreConfig, create_authoritative_store};
pub use backend::{BackendError, PersistenceBackend, StoredRecord};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use mirror::{MirrorConfig, MirrorStore, MirrorView, create_mirror_store};
pub use protocol::{ReplicationFrame, ReplicationMessage};
pub use session::{PreSaveHook, SessionEndHandler, SessionEndReason, SessionState};
pub use sink::ReplicationSink;
