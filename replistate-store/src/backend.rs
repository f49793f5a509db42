//! Persistence backend abstraction.
//!
//! The backend owns durable storage and session claiming. The stores only
//! need to open a session, read the stored record, write it back and close
//! the session.

use async_trait::async_trait;
use replistate_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An entity's saved tree and the migration version it is at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub data: Value,
    pub version: i64,
}

/// Failure reported by a backend (claim conflicts, I/O, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Durable storage for entity trees.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Claims the entity's session and returns its saved record, or `None`
    /// for an entity that has never been saved.
    async fn start_session(&self, entity: &EntityId) -> Result<Option<StoredRecord>, BackendError>;

    /// Persists the record for a claimed entity.
    async fn save(&self, entity: &EntityId, record: &StoredRecord) -> Result<(), BackendError>;

    /// Releases the entity's claim.
    async fn end_session(&self, entity: &EntityId) -> Result<(), BackendError>;
}
