//! In-place writes into a `serde_json::Value` tree.
//!
//! `Null` written into an object removes the key; written into an array it
//! replaces the element.

use replistate_types::Path;
use serde_json::{Map, Value};

use crate::error::{TreeError, TreeResult};

/// Writes `value` at `path`, requiring the parent node to exist.
pub(crate) fn write_existing(root: &mut Value, path: &Path, value: Value) -> TreeResult<()> {
    let Some(parent_path) = path.parent() else {
        *root = value;
        return Ok(());
    };
    let key = path.last().unwrap_or_default();
    let not_found = || TreeError::PathNotFound(path.clone());

    match parent_path.resolve_mut(root).ok_or_else(not_found)? {
        Value::Object(map) => {
            insert_or_remove(map, key, value);
            Ok(())
        }
        Value::Array(items) => {
            let slot = key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(not_found)?;
            *slot = value;
            Ok(())
        }
        _ => Err(not_found()),
    }
}

/// Writes `value` at `path`, creating (or replacing with objects) any
/// intermediate nodes that are missing or not containers.
pub(crate) fn write_creating(root: &mut Value, path: &Path, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for seg in parents {
        node = descend_or_create(node, seg);
    }

    if let Some(i) = array_index(node, last) {
        if let Value::Array(items) = node {
            items[i] = value;
        }
        return;
    }
    if let Value::Object(map) = ensure_object(node) {
        insert_or_remove(map, last, value);
    }
}

fn descend_or_create<'v>(node: &'v mut Value, seg: &str) -> &'v mut Value {
    match (array_index(node, seg), node) {
        (Some(i), Value::Array(items)) => &mut items[i],
        (_, node) => match ensure_object(node) {
            Value::Object(map) => map
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            other => other,
        },
    }
}

fn ensure_object(node: &mut Value) -> &mut Value {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node
}

fn array_index(node: &Value, seg: &str) -> Option<usize> {
    match node {
        Value::Array(items) => seg.parse::<usize>().ok().filter(|&i| i < items.len()),
        _ => None,
    }
}

fn insert_or_remove(map: &mut Map<String, Value>, key: &str, value: Value) {
    if value.is_null() {
        map.remove(key);
    } else {
        map.insert(key.to_string(), value);
    }
}
