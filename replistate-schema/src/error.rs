//! Error types for schema validation.

use replistate_types::{Path, ValueKind};
use std::fmt;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A single disagreement between data and the template.
///
/// `actual` is [`ValueKind::Null`] when the key is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: Path,
    pub expected: ValueKind,
    pub actual: ValueKind,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at '{}': expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

/// Errors raised by write and structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The write path does not exist in the template and is not under a map.
    #[error("unknown path '{0}'")]
    UnknownPath(Path),

    /// The written value's kind differs from the template's.
    #[error("type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: Path,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Loaded data does not match the template's structure.
    #[error("structural validation failed {0}")]
    StructuralValidationFailed(Mismatch),
}

impl From<Mismatch> for SchemaError {
    fn from(m: Mismatch) -> Self {
        Self::TypeMismatch {
            path: m.path,
            expected: m.expected,
            actual: m.actual,
        }
    }
}
