//! Schema support for replistate.
//!
//! A [`Schema`] is a declarative default-value tree in which some fields carry
//! a marker:
//! - [`Schema::map`]: the field's keys are dynamic and not individually
//!   checked; only the map itself (and optionally each entry's kind) is.
//! - [`Schema::private`]: the field and everything beneath it is never
//!   replicated to mirrors.
//!
//! [`CompiledSchema::compile`] resolves the markers into a plain default
//! `template` plus the `map` and `private` path sets. The [`validate`]
//! module checks full trees (on load) and single writes against it, and
//! [`Migrations`] brings older saved data up to the current version.
//!
//! # Example
//!
//! ```
//! use replistate_schema::{CompiledSchema, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::table([
//!     ("Resources", Schema::from(json!({"Cash": 0}))),
//!     ("Inventory", Schema::map(json!({}))),
//!     ("Settings", Schema::private(json!({"Volume": 0.5}))),
//! ]);
//! let compiled = CompiledSchema::compile(&schema);
//!
//! assert_eq!(compiled.template()["Resources"]["Cash"], json!(0));
//! assert!(compiled.client_template().get("Settings").is_none());
//! ```

mod compile;
mod error;
mod marker;
mod migration;
pub mod validate;

pub use compile::CompiledSchema;
pub use error::{Mismatch, SchemaError, SchemaResult};
pub use marker::{MapMarker, Schema};
pub use migration::{Migration, Migrations, NO_DATA_VERSION};
pub use validate::{structural_mismatches, validate_data, validate_write};
