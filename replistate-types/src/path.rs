//! Path addressing for data trees.
//!
//! A path is a sequence of segments joined by [`PATH_DELIMITER`]
//! (e.g. `"Resources/Cash"`). The empty path addresses the root. Empty
//! segments are dropped when parsing, so `""`, `"/"` and `"//"` all denote
//! the root and `"/Resources/"` equals `"Resources"`.
//!
//! A segment addresses an object key, or an array index when the parent node
//! is an array and the segment parses as `usize`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Separator between path segments.
pub const PATH_DELIMITER: char = '/';

/// Address of a node in a data tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The root path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a delimited path string. Never fails; empty segments are dropped.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self {
            segments: s
                .split(PATH_DELIMITER)
                .filter(|seg| !seg.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Builds a path from individual segments.
    ///
    /// Fails if a segment is empty or contains the delimiter, since such a
    /// path could not round-trip through its string form.
    pub fn from_segments<I, S>(segments: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for seg in segments {
            let seg = seg.into();
            if seg.is_empty() || seg.contains(PATH_DELIMITER) {
                return Err(crate::Error::InvalidSegment(seg));
            }
            out.push(seg);
        }
        Ok(Self { segments: out })
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments (zero for the root).
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, or `None` for the root.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(self.prefix(self.segments.len() - 1))
    }

    /// The first `n` segments as a path.
    #[must_use]
    pub fn prefix(&self, n: usize) -> Path {
        Path {
            segments: self.segments[..n.min(self.segments.len())].to_vec(),
        }
    }

    /// Returns this path extended by one segment.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Path { segments }
    }

    /// Returns this path extended by all segments of `other`.
    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Path { segments }
    }

    /// Whether `prefix` is this path or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The segments remaining after `prefix`, if `prefix` is an ancestor (or equal).
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        self.segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| Path {
                segments: rest.to_vec(),
            })
    }

    /// Iterates every ancestor from the root down to and including this path.
    #[must_use]
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { path: self, next: 0 }
    }

    /// Looks up the node this path addresses inside `root`.
    #[must_use]
    pub fn resolve<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(root, |node, seg| child_of(node, seg))
    }

    /// Mutable variant of [`resolve`](Self::resolve).
    pub fn resolve_mut<'v>(&self, root: &'v mut Value) -> Option<&'v mut Value> {
        self.segments
            .iter()
            .try_fold(root, |node, seg| child_of_mut(node, seg))
    }
}

/// Looks up one segment below `node`.
pub(crate) fn child_of<'v>(node: &'v Value, segment: &str) -> Option<&'v Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

pub(crate) fn child_of_mut<'v>(node: &'v mut Value, segment: &str) -> Option<&'v mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Root-first iterator over a path's ancestors, ending with the path itself.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    path: &'a Path,
    next: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        if self.next > self.path.len() {
            return None;
        }
        let item = self.path.prefix(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.path.len() + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Ancestors<'_> {}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_DELIMITER}")?;
            }
            f.write_str(seg)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&String> for Path {
    fn from(s: &String) -> Self {
        Self::parse(s)
    }
}

impl From<&Path> for Path {
    fn from(p: &Path) -> Self {
        p.clone()
    }
}

impl From<Path> for String {
    fn from(p: Path) -> Self {
        p.to_string()
    }
}
