//! Schema description: raw defaults plus `map` / `private` markers.

use replistate_types::ValueKind;
use serde_json::Value;
use std::collections::BTreeMap;

/// A node of a schema description.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// A raw default, placed into the template verbatim. `Null` means the
    /// field has no default and is left out of the template.
    Value(Value),
    /// A nested mapping whose children are walked individually.
    Table(BTreeMap<String, Schema>),
    /// Dynamic-keyed field.
    Map(MapMarker),
    /// Field excluded from replication.
    Private(Box<Schema>),
}

/// Payload of a [`Schema::Map`] marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    /// Default value of the map itself, usually an empty object.
    pub default: Value,
    /// Declared kind of each entry; `None` accepts any kind.
    pub entry_kind: Option<ValueKind>,
}

impl Schema {
    /// A table built from `(key, node)` pairs.
    pub fn table<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        Self::Table(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Marks a field as a dynamic-keyed map with the given default.
    pub fn map(default: impl Into<Value>) -> Self {
        Self::Map(MapMarker {
            default: default.into(),
            entry_kind: None,
        })
    }

    /// Like [`map`](Self::map), with every entry constrained to `entry_kind`.
    pub fn map_of(default: impl Into<Value>, entry_kind: ValueKind) -> Self {
        Self::Map(MapMarker {
            default: default.into(),
            entry_kind: Some(entry_kind),
        })
    }

    /// Marks a field (and everything beneath it) as private.
    pub fn private(inner: impl Into<Schema>) -> Self {
        Self::Private(Box::new(inner.into()))
    }

    /// Whether this node carries a marker.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Private(_))
    }
}

/// JSON objects become tables (recursively); everything else is a raw value.
impl From<Value> for Schema {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                Self::Table(map.into_iter().map(|(k, v)| (k, Schema::from(v))).collect())
            }
            other => Self::Value(other),
        }
    }
}

macro_rules! raw_default {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Schema {
                fn from(v: $t) -> Self {
                    Self::Value(Value::from(v))
                }
            }
        )*
    };
}

raw_default!(bool, i32, i64, u32, u64, f32, f64, &str, String);
