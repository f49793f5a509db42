//! Replication protocol.
//!
//! There is one message kind, `(path, value)`, sent authoritative → mirror
//! only. Frames add the transport addressing (store id and entity). Within
//! one entity frames must arrive in emission order; the first frame for an
//! entity always carries the root path and the full private-filtered tree.

use replistate_types::{EntityId, Path};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;

/// A single replicated write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationMessage {
    pub path: Path,
    pub value: Value,
}

/// A message addressed to one entity of one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationFrame {
    /// Store identifier; must match between authoritative and mirror.
    pub store: String,
    pub entity: EntityId,
    pub message: ReplicationMessage,
}

impl ReplicationFrame {
    /// Whether the frame replaces the entity's whole tree.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.message.path.is_root()
    }

    /// JSON wire encoding.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
