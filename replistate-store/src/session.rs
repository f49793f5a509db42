//! Per-entity session state.

use replistate_schema::SchemaError;
use replistate_tree::{Disconnect, ObservableTree};
use replistate_types::EntityId;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::backend::BackendError;

/// Lifecycle of one entity inside an authoritative store.
///
/// `Unloaded → Loading → Active → Unloading → Unloaded`. A load whose data
/// fails validation goes straight from `Loading` to `Unloading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loading,
    Active,
    Unloading,
}

/// Why a session ended outside of a clean unload.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEndReason {
    /// The backend refused to open the session (claimed elsewhere, ...).
    ClaimFailed(BackendError),
    /// Data failed structural validation after migrations.
    StructuralValidationFailed(SchemaError),
    /// Saving during unload failed.
    SaveFailed(BackendError),
    /// The backend reported the session gone (claimed elsewhere, expired, ...).
    Released(String),
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClaimFailed(e) => write!(f, "claim failed: {e}"),
            Self::StructuralValidationFailed(e) => write!(f, "invalid data: {e}"),
            Self::SaveFailed(e) => write!(f, "save failed: {e}"),
            Self::Released(reason) => write!(f, "released: {reason}"),
        }
    }
}

/// Called when a session ends for any reason other than `unload`.
pub type SessionEndHandler = Arc<dyn Fn(&EntityId, &SessionEndReason) + Send + Sync>;

/// Called with the final data just before it is saved.
pub type PreSaveHook = Arc<dyn Fn(&EntityId, &mut Value) + Send + Sync>;

/// An active entity's tree and data version.
pub(crate) struct EntitySession {
    pub(crate) tree: ObservableTree,
    pub(crate) version: i64,
    /// Root binding that emits replication frames; attached after activation.
    pub(crate) replication: Option<Disconnect>,
}

impl EntitySession {
    /// Stops replication and tears the tree down. The data stays readable.
    pub(crate) fn close(&mut self) {
        if let Some(disconnect) = self.replication.take() {
            disconnect();
        }
        self.tree.destroy();
    }
}

/// Slot in the store's session table.
pub(crate) enum Slot {
    /// Waiting on the backend; `cancelled` is set by an unload request.
    Loading { cancelled: bool },
    Active(EntitySession),
    Unloading,
}

impl Slot {
    pub(crate) fn state(&self) -> SessionState {
        match self {
            Self::Loading { .. } => SessionState::Loading,
            Self::Active(_) => SessionState::Active,
            Self::Unloading => SessionState::Unloading,
        }
    }
}
