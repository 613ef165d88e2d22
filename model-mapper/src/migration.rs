//! Step-wise migration of older external representations.

use crate::key_path::JsonMap;
use log::debug;
use std::collections::HashMap;

type MigrationFn = Box<dyn Fn(JsonMap) -> Option<JsonMap> + Send + Sync>;

/// A chain of migration steps, each moving data one version forward.
///
/// Built inside a model's `migrate` hook:
///
/// ```ignore
/// fn migrate(external: JsonMap, from_version: u32) -> Option<JsonMap> {
///     Migrations::new()
///         .step(0, |mut v0| {
///             rename_key(&mut v0, "old_name", "name");
///             Some(v0)
///         })
///         .apply(external, from_version, Self::VERSION)
/// }
/// ```
#[derive(Default)]
pub struct Migrations {
    /// Maps version -> migration function to the next version
    steps: HashMap<u32, MigrationFn>,
}

impl Migrations {
    /// An empty chain of steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the step from `from_version` to `from_version + 1`.
    pub fn step<F>(mut self, from_version: u32, migrate: F) -> Self
    where
        F: Fn(JsonMap) -> Option<JsonMap> + Send + Sync + 'static,
    {
        self.steps.insert(from_version, Box::new(migrate));
        self
    }

    /// Runs consecutive steps from `from` up to `to`.
    ///
    /// Returns `None` if a step is missing, if a step rejects its input, or if
    /// `from` is newer than `to`.
    pub fn apply(&self, external: JsonMap, from: u32, to: u32) -> Option<JsonMap> {
        if from > to {
            return None;
        }

        let mut current_version = from;
        let mut current_data = external;
        while current_version < to {
            let migrate = self.steps.get(&current_version)?;
            current_data = migrate(current_data)?;
            debug!(
                "Migrated external data from version {} to {}",
                current_version,
                current_version + 1
            );
            current_version += 1;
        }
        Some(current_data)
    }

    /// The versions that have a registered step, ascending.
    pub fn versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self.steps.keys().copied().collect();
        versions.sort_unstable();
        versions
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step is registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Moves the value under `from` to `to`, if present.
pub fn rename_key(external: &mut JsonMap, from: &str, to: &str) {
    if let Some(value) = external.remove(from) {
        external.insert(to.to_string(), value);
    }
}
