//! Schema compiler: resolves markers into a template and path sets.

use replistate_types::{Path, ValueKind};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::SchemaResult;
use crate::marker::Schema;
use crate::validate;

/// Which template a walk produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    /// Everything, including private fields (authoritative side).
    Server,
    /// Private subtrees pruned (mirror side).
    Client,
}

/// The immutable result of compiling a [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    template: Value,
    client_template: Value,
    map_paths: BTreeSet<Path>,
    map_entry_kinds: BTreeMap<Path, ValueKind>,
    private_paths: BTreeSet<Path>,
}

#[derive(Default)]
struct PathSets {
    maps: BTreeSet<Path>,
    entry_kinds: BTreeMap<Path, ValueKind>,
    private: BTreeSet<Path>,
}

impl CompiledSchema {
    /// Compiles a schema description.
    #[must_use]
    pub fn compile(schema: &Schema) -> Self {
        let mut sets = PathSets::default();
        let template = walk(schema, &Path::root(), Audience::Server, &mut sets)
            .unwrap_or_else(|| Value::Object(Map::new()));
        let client_template = walk(schema, &Path::root(), Audience::Client, &mut sets)
            .unwrap_or_else(|| Value::Object(Map::new()));

        Self {
            template,
            client_template,
            map_paths: sets.maps,
            map_entry_kinds: sets.entry_kinds,
            private_paths: sets.private,
        }
    }

    /// Default-value tree with every marker resolved.
    #[must_use]
    pub fn template(&self) -> &Value {
        &self.template
    }

    /// The template with every private subtree removed.
    #[must_use]
    pub fn client_template(&self) -> &Value {
        &self.client_template
    }

    /// Deserializes the template into a typed view.
    pub fn template_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.template.clone())
    }

    #[must_use]
    pub fn map_paths(&self) -> &BTreeSet<Path> {
        &self.map_paths
    }

    #[must_use]
    pub fn private_paths(&self) -> &BTreeSet<Path> {
        &self.private_paths
    }

    /// Declared entry kind of the map at `map_path`, if any.
    #[must_use]
    pub fn map_entry_kind(&self, map_path: &Path) -> Option<ValueKind> {
        self.map_entry_kinds.get(map_path).copied()
    }

    pub(crate) fn map_entry_kinds(&self) -> &BTreeMap<Path, ValueKind> {
        &self.map_entry_kinds
    }

    /// Whether `path` is a private path or lies beneath one.
    #[must_use]
    pub fn is_private(&self, path: &Path) -> bool {
        self.private_paths.iter().any(|p| path.starts_with(p))
    }

    /// The outermost map path that `path` equals or lies beneath.
    #[must_use]
    pub fn map_boundary(&self, path: &Path) -> Option<&Path> {
        self.map_paths
            .iter()
            .filter(|m| path.starts_with(m))
            .min_by_key(|m| m.len())
    }

    /// Prepares a value written at `path` for replication.
    ///
    /// Returns `None` when `path` itself is private; otherwise strips every
    /// private descendant out of `value`.
    #[must_use]
    pub fn redact(&self, path: &Path, mut value: Value) -> Option<Value> {
        if self.is_private(path) {
            return None;
        }
        for private in &self.private_paths {
            let Some(rel) = private.strip_prefix(path) else {
                continue;
            };
            let (Some(parent), Some(key)) = (rel.parent(), rel.last()) else {
                continue;
            };
            if let Some(Value::Object(map)) = parent.resolve_mut(&mut value) {
                map.remove(key);
            }
        }
        Some(value)
    }

    /// Structural validation of a full data tree against this schema.
    pub fn validate_data(&self, data: &Value) -> SchemaResult<()> {
        validate::check_structure(data, &self.template, &Path::root(), self.into(), true)
            .into_iter()
            .next()
            .map_or(Ok(()), |m| Err(crate::SchemaError::StructuralValidationFailed(m)))
    }

    /// Single-write validation against this schema.
    pub fn validate_write(&self, path: &Path, value: &Value) -> SchemaResult<()> {
        validate::validate_write(self, path, value)
    }
}

impl From<&Schema> for CompiledSchema {
    fn from(schema: &Schema) -> Self {
        Self::compile(schema)
    }
}

/// Depth-first walk producing the template value for `node` at `path`.
/// `None` means the node contributes nothing to the template.
fn walk(node: &Schema, path: &Path, audience: Audience, sets: &mut PathSets) -> Option<Value> {
    match node {
        Schema::Private(inner) => {
            sets.private.insert(path.clone());
            let value = walk(inner, path, audience, sets);
            match audience {
                Audience::Server => value,
                Audience::Client => None,
            }
        }
        Schema::Map(marker) => {
            sets.maps.insert(path.clone());
            if let Some(kind) = marker.entry_kind {
                sets.entry_kinds.insert(path.clone(), kind);
            }
            (!marker.default.is_null()).then(|| marker.default.clone())
        }
        Schema::Table(fields) => {
            let mut out = Map::new();
            for (key, child) in fields {
                if let Some(v) = walk(child, &path.child(key.as_str()), audience, sets) {
                    out.insert(key.clone(), v);
                }
            }
            Some(Value::Object(out))
        }
        Schema::Value(v) => (!v.is_null()).then(|| v.clone()),
    }
}
