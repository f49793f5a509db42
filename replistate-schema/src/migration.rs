//! Ordered, append-only data migrations.
//!
//! The version of a saved tree is the number of migrations already applied
//! to it: a tree at version `n` has seen steps `1..=n`. Loading runs the
//! remaining steps in order and stamps the tree with the list length.
//!
//! Entries must never be reordered or removed between releases; the runner
//! has no way to notice if they are.

use serde_json::Value;
use tracing::{debug, warn};

/// Version of an entity that has no saved data yet.
pub const NO_DATA_VERSION: i64 = -1;

/// One in-place transform of a data tree.
pub type Migration = Box<dyn Fn(&mut Value) + Send + Sync>;

/// The ordered migration list for one store.
#[derive(Default)]
pub struct Migrations {
    steps: Vec<Migration>,
}

impl std::fmt::Debug for Migrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrations")
            .field("len", &self.steps.len())
            .finish()
    }
}

impl Migrations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the next migration step.
    #[must_use]
    pub fn push(mut self, step: impl Fn(&mut Value) + Send + Sync + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Version a tree has once every step is applied.
    #[must_use]
    pub fn current_version(&self) -> i64 {
        i64::try_from(self.steps.len()).unwrap_or(i64::MAX)
    }

    /// Brings `data` from `version` up to date and returns the new version.
    ///
    /// [`NO_DATA_VERSION`] skips every step: fresh data already has the
    /// current shape. A version beyond the list (data saved by a newer
    /// release) applies nothing and is returned unchanged.
    pub fn run(&self, version: i64, data: &mut Value) -> i64 {
        let current = self.current_version();
        if version == NO_DATA_VERSION {
            return current;
        }
        if version > current {
            warn!(version, current, "stored data is newer than the migration list");
            return version;
        }

        let start = usize::try_from(version).unwrap_or(0);
        for (index, step) in self.steps.iter().enumerate().skip(start) {
            debug!(step = index + 1, "applying migration");
            step(data);
        }
        current
    }
}
