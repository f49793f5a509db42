//! Core type definitions for replistate.
//!
//! This crate defines the plain, schema-agnostic types shared by every other
//! crate in the workspace:
//! - [`Path`]: `/`-delimited address of a node in a data tree
//! - [`EntityId`]: identifier of the entity a data tree belongs to
//! - [`ValueKind`]: the basic type of a JSON value, used for validation
//!
//! Data trees themselves are plain `serde_json::Value`s.

mod ids;
mod kind;
mod path;

pub use ids::EntityId;
pub use kind::ValueKind;
pub use path::{Ancestors, PATH_DELIMITER, Path};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid path segment: {0:?}")]
    InvalidSegment(String),

    #[error("unknown value kind: {0}")]
    UnknownKind(String),
}
