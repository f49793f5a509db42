//! Structural and single-write validation.
//!
//! Structural validation runs once per load, over the whole tree, after
//! migrations. Write validation runs on every authoritative `set`.

use replistate_types::{Path, ValueKind};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::compile::CompiledSchema;
use crate::error::{Mismatch, SchemaError, SchemaResult};

/// Map rules consulted while walking a tree.
#[derive(Clone, Copy)]
pub(crate) struct Rules<'a> {
    map_paths: &'a BTreeSet<Path>,
    entry_kinds: Option<&'a BTreeMap<Path, ValueKind>>,
}

impl<'a> From<&'a CompiledSchema> for Rules<'a> {
    fn from(schema: &'a CompiledSchema) -> Self {
        Self {
            map_paths: schema.map_paths(),
            entry_kinds: Some(schema.map_entry_kinds()),
        }
    }
}

/// Checks that every key of `template` exists in `data` with the same kind.
///
/// Keys present only in `data` are allowed. Subtrees at a path in
/// `map_paths` are checked for kind only. Reports the first mismatch.
pub fn validate_data(data: &Value, template: &Value, map_paths: &BTreeSet<Path>) -> SchemaResult<()> {
    let rules = Rules {
        map_paths,
        entry_kinds: None,
    };
    match check_structure(data, template, &Path::root(), rules, true).into_iter().next() {
        Some(m) => Err(SchemaError::StructuralValidationFailed(m)),
        None => Ok(()),
    }
}

/// Every structural mismatch between `data` and `template`.
#[must_use]
pub fn structural_mismatches(
    data: &Value,
    template: &Value,
    map_paths: &BTreeSet<Path>,
) -> Vec<Mismatch> {
    let rules = Rules {
        map_paths,
        entry_kinds: None,
    };
    check_structure(data, template, &Path::root(), rules, false)
}

/// Validates a single write of `value` at `path`.
///
/// - Beneath a map path any key is accepted. A write at the map path itself
///   must match the map default's kind; a write of one entry must match the
///   declared entry kind (if any) or be `Null` to remove the entry.
/// - Elsewhere the path must exist in the template and the value must have
///   the template value's kind. Objects are also checked structurally so a
///   container write cannot drop template keys.
pub fn validate_write(schema: &CompiledSchema, path: &Path, value: &Value) -> SchemaResult<()> {
    let actual = ValueKind::of(value);

    if let Some(boundary) = schema.map_boundary(path) {
        return match path.len() - boundary.len() {
            0 => match boundary.resolve(schema.template()) {
                Some(default) => {
                    expect_kind(path, ValueKind::of(default), actual)?;
                    first_mismatch(value, default, path, schema)
                }
                None => Ok(()),
            },
            1 if value.is_null() => Ok(()),
            1 => match schema.map_entry_kind(boundary) {
                Some(expected) => expect_kind(path, expected, actual),
                None => Ok(()),
            },
            _ => Ok(()),
        };
    }

    let expected = path
        .resolve(schema.template())
        .ok_or_else(|| SchemaError::UnknownPath(path.clone()))?;
    expect_kind(path, ValueKind::of(expected), actual)?;
    if actual == ValueKind::Object {
        first_mismatch(value, expected, path, schema)?;
    }
    Ok(())
}

fn expect_kind(path: &Path, expected: ValueKind, actual: ValueKind) -> SchemaResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SchemaError::TypeMismatch {
            path: path.clone(),
            expected,
            actual,
        })
    }
}

fn first_mismatch(
    value: &Value,
    template: &Value,
    base: &Path,
    schema: &CompiledSchema,
) -> SchemaResult<()> {
    match check_structure(value, template, base, schema.into(), true).into_iter().next() {
        Some(m) => Err(m.into()),
        None => Ok(()),
    }
}

/// Walks `template` alongside `data`, both rooted at absolute path `base`.
pub(crate) fn check_structure(
    data: &Value,
    template: &Value,
    base: &Path,
    rules: Rules<'_>,
    first_only: bool,
) -> Vec<Mismatch> {
    let mut out = Vec::new();
    check_node(data, template, base, rules, first_only, &mut out);
    out
}

fn check_node(
    data: &Value,
    template: &Value,
    path: &Path,
    rules: Rules<'_>,
    first_only: bool,
    out: &mut Vec<Mismatch>,
) {
    let expected = ValueKind::of(template);
    let actual = ValueKind::of(data);
    if expected != actual {
        out.push(Mismatch {
            path: path.clone(),
            expected,
            actual,
        });
        return;
    }

    if rules.map_paths.contains(path) {
        check_map_entries(data, path, rules, out);
        return;
    }

    let (Value::Object(t), Value::Object(d)) = (template, data) else {
        return;
    };
    for (key, t_child) in t {
        if first_only && !out.is_empty() {
            return;
        }
        let child_path = path.child(key.as_str());
        match d.get(key) {
            Some(d_child) => check_node(d_child, t_child, &child_path, rules, first_only, out),
            None => out.push(Mismatch {
                path: child_path,
                expected: ValueKind::of(t_child),
                actual: ValueKind::Null,
            }),
        }
    }
}

fn check_map_entries(data: &Value, path: &Path, rules: Rules<'_>, out: &mut Vec<Mismatch>) {
    let Some(expected) = rules.entry_kinds.and_then(|k| k.get(path)).copied() else {
        return;
    };
    let Value::Object(entries) = data else {
        return;
    };
    for (key, entry) in entries {
        let actual = ValueKind::of(entry);
        if actual != expected {
            out.push(Mismatch {
                path: path.child(key.as_str()),
                expected,
                actual,
            });
        }
    }
}
