//! Declarative property → key path mappings.

use crate::errors::MappingError;
use crate::key_path::{KeyPath, MappingTarget};
use crate::schema::Schema;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// How one property maps to the external representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingEntry {
    /// Read from and written to the given target.
    Target(MappingTarget),
    /// Neither read nor written.
    Omit,
}

/// A model type's mapping from property keys to key paths.
///
/// Keys without an entry map to a path named after the key. Construction
/// errors (e.g. an empty path component) are recorded and reported when the
/// mapping is first resolved, so a builder chain never fails midway.
///
/// ```ignore
/// fn key_paths() -> KeyPathMapping {
///     KeyPathMapping::new()
///         .path("name", "profile.name")
///         .merge("location", ["geo.lat", "geo.lng"])
///         .omit("cached_count")
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyPathMapping {
    entries: BTreeMap<String, MappingEntry>,
    errors: Vec<(String, MappingError)>,
}

impl KeyPathMapping {
    /// An empty mapping: every property maps to a key named after it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps every key of `schema` to a path named after itself.
    pub fn identity(schema: &Schema) -> Self {
        schema.keys().fold(Self::new(), |mapping, key| {
            let path = KeyPath::new([key]);
            mapping.record(key, path.map(|p| MappingEntry::Target(MappingTarget::Path(p))))
        })
    }

    /// Starts from a parent type's mapping; later calls override single keys.
    pub fn inherit(mut self, parent: KeyPathMapping) -> Self {
        for (key, entry) in parent.entries {
            if let Entry::Vacant(slot) = self.entries.entry(key) {
                slot.insert(entry);
            }
        }
        self.errors.extend(parent.errors);
        self
    }

    /// Maps `key` to a dotted key path.
    pub fn path(self, key: impl Into<String>, dotted: &str) -> Self {
        let entry = KeyPath::parse(dotted).map(|p| MappingEntry::Target(MappingTarget::Path(p)));
        self.record(key, entry)
    }

    /// Maps `key` to an already constructed key path.
    pub fn key_path(self, key: impl Into<String>, path: KeyPath) -> Self {
        self.record(key, Ok(MappingEntry::Target(MappingTarget::Path(path))))
    }

    /// Maps `key` to several dotted key paths merged into one sub-mapping.
    pub fn merge<I, S>(self, key: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = paths
            .into_iter()
            .map(|p| KeyPath::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>();
        self.record(key, paths.map(|p| MappingEntry::Target(MappingTarget::Merge(p))))
    }

    /// Excludes `key` from both reading and writing.
    pub fn omit(self, key: impl Into<String>) -> Self {
        self.record(key, Ok(MappingEntry::Omit))
    }

    /// The entry declared for `key`.
    pub fn get(&self, key: &str) -> Option<&MappingEntry> {
        self.entries.get(key)
    }

    /// Declared entries, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MappingEntry)> {
        self.entries.iter()
    }

    /// Number of declared entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Construction errors, each with the key it was recorded for.
    pub fn errors(&self) -> &[(String, MappingError)] {
        &self.errors
    }

    fn record(
        mut self,
        key: impl Into<String>,
        entry: Result<MappingEntry, MappingError>,
    ) -> Self {
        let key = key.into();
        match entry {
            Ok(entry) => {
                self.entries.insert(key, entry);
            }
            Err(e) => self.errors.push((key, e)),
        }
        self
    }
}
