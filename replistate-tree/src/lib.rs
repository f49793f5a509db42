//! Observable data tree for replistate.
//!
//! - [`Signal`]: single-event publish/subscribe; subscribing returns a
//!   [`Disconnect`] capability.
//! - [`ObservableTree`]: wraps a plain `serde_json::Value` and offers
//!   path-scoped `get`/`set`/`listen`/`bind` with hierarchical fan-out.
//!
//! # Hierarchical notification
//!
//! A successful write at `a/b/c` notifies listeners registered at `""`,
//! `a`, `a/b` and `a/b/c`, in that order. Each listener receives the current
//! value at its own path alongside the written value and path. Siblings and
//! descendants of the written path are never notified.
//!
//! # Validation
//!
//! The tree knows nothing about schemas. A [`WriteValidator`] closure may be
//! supplied at construction; [`ObservableTree::set`] consults it before every
//! write, while [`ObservableTree::apply_update`] bypasses it for trusted data.

mod error;
mod signal;
mod tree;
mod write;

pub use error::{TreeError, TreeResult};
pub use signal::{Disconnect, Signal};
pub use tree::{Change, ObservableTree, WriteValidator};
