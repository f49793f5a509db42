//! Error types for the observable tree.

use replistate_types::Path;
use thiserror::Error;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors that can occur when reading or writing an observable tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// `set` addressed a node whose parent does not exist.
    #[error("path not found: {0}")]
    PathNotFound(Path),

    /// The write validator vetoed the write.
    #[error("write to {path:?} rejected: {reason}")]
    ValidationRejected { path: Path, reason: String },

    /// A typed read could not deserialize the stored value.
    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
}
