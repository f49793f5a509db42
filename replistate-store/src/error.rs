//! Error types for the store layer.

use replistate_schema::SchemaError;
use replistate_tree::TreeError;
use replistate_types::EntityId;
use thiserror::Error;

use crate::backend::BackendError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A tree read or write failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Loaded data failed validation.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The persistence backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Frame encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The entity already has a session in some state.
    #[error("entity {0} already has a session")]
    SessionActive(EntityId),

    /// The entity has no session.
    #[error("entity {0} is not loaded")]
    NotLoaded(EntityId),

    /// Unload was requested while the load was still in flight.
    #[error("load of entity {0} was cancelled")]
    LoadCancelled(EntityId),
}
