//! Key paths into nested external representations.

use crate::errors::MappingError;
use serde_json::Value;
use std::fmt;

/// A JSON object, the root type of every external representation.
pub type JsonMap = serde_json::Map<String, Value>;

/// An ordered sequence of non-empty keys locating a value inside nested
/// mappings.
///
/// Two key paths are equal when their component sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath {
    components: Vec<String>,
}

impl KeyPath {
    /// Creates a key path from discrete components.
    ///
    /// Components may contain dots; they are never split.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyPath` if there are no components or any component
    /// is empty.
    pub fn new<I, S>(components: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();
        if components.is_empty() {
            return Err(MappingError::InvalidKeyPath {
                path: String::new(),
                reason: "a key path needs at least one component".to_string(),
            });
        }
        if components.iter().any(|c| c.is_empty()) {
            return Err(MappingError::InvalidKeyPath {
                path: components.join("."),
                reason: "key path components must not be empty".to_string(),
            });
        }
        Ok(Self { components })
    }

    /// Parses the dotted form, e.g. `"nested.name"`.
    pub fn parse(dotted: &str) -> Result<Self, MappingError> {
        Self::new(dotted.split('.'))
    }

    /// The components, root first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The final component, which names the leaf value.
    pub fn last(&self) -> &str {
        self.components
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The first component, which names the top-level key.
    pub fn first(&self) -> &str {
        self.components
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Looks up the value at this path.
    ///
    /// Returns `Ok(None)` when any key along the path is absent, or when an
    /// intermediate value is JSON null.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if an intermediate value exists but is not a
    /// mapping.
    pub fn resolve<'a>(&self, root: &'a JsonMap) -> Result<Option<&'a Value>, MappingError> {
        let mut current = root;
        let last = self.components.len() - 1;

        for (i, component) in self.components.iter().enumerate() {
            let Some(value) = current.get(component) else {
                return Ok(None);
            };
            if i == last {
                return Ok(Some(value));
            }
            match value {
                Value::Object(map) => current = map,
                Value::Null => return Ok(None),
                other => {
                    return Err(MappingError::TypeMismatch {
                        path: self.components[..=i].join("."),
                        expected: "mapping".to_string(),
                        found: json_type_name(other).to_string(),
                    })
                }
            }
        }

        Ok(None)
    }

    /// Writes `value` at this path, creating intermediate mappings as needed
    /// and overwriting the leaf.
    ///
    /// An intermediate value that is not a mapping is replaced by one.
    pub fn write(&self, root: &mut JsonMap, value: Value) {
        let Some((leaf, parents)) = self.components.split_last() else {
            return;
        };

        let mut current = root;
        for component in parents {
            let entry = current
                .entry(component.clone())
                .or_insert_with(|| Value::Object(JsonMap::new()));
            if !entry.is_object() {
                *entry = Value::Object(JsonMap::new());
            }
            current = match entry.as_object_mut() {
                Some(map) => map,
                None => return,
            };
        }

        current.insert(leaf.clone(), value);
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("."))
    }
}

/// Where a property lives in the external representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    /// A single key path.
    Path(KeyPath),
    /// Several key paths merged into one sub-mapping keyed by each path's
    /// final component.
    Merge(Vec<KeyPath>),
}

impl MappingTarget {
    /// Reads the external value for this target.
    ///
    /// In merge mode the result is a synthesized mapping containing the final
    /// key of every path that was found; if none was found the result is
    /// `None`.
    pub fn resolve(&self, root: &JsonMap) -> Result<Option<Value>, MappingError> {
        match self {
            Self::Path(path) => Ok(path.resolve(root)?.cloned()),
            Self::Merge(paths) => {
                let mut merged = JsonMap::new();
                for path in paths {
                    if let Some(value) = path.resolve(root)? {
                        merged.insert(path.last().to_string(), value.clone());
                    }
                }
                if merged.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::Object(merged)))
                }
            }
        }
    }

    /// Writes an external value for this target.
    ///
    /// In merge mode `value` must be a mapping; each of its keys that matches
    /// a path's final component is written out to that full path.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` when a merge target receives a non-mapping value.
    pub fn write(&self, root: &mut JsonMap, value: Value) -> Result<(), MappingError> {
        match self {
            Self::Path(path) => {
                path.write(root, value);
                Ok(())
            }
            Self::Merge(paths) => {
                let Value::Object(merged) = value else {
                    return Err(MappingError::TypeMismatch {
                        path: self.to_string(),
                        expected: "mapping".to_string(),
                        found: json_type_name(&value).to_string(),
                    });
                };
                for path in paths {
                    if let Some(v) = merged.get(path.last()) {
                        path.write(root, v.clone());
                    }
                }
                Ok(())
            }
        }
    }

    /// The key paths this target touches.
    pub fn paths(&self) -> &[KeyPath] {
        match self {
            Self::Path(path) => std::slice::from_ref(path),
            Self::Merge(paths) => paths,
        }
    }
}

impl fmt::Display for MappingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path),
            Self::Merge(paths) => {
                let joined = paths
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{}]", joined)
            }
        }
    }
}

/// The name used for a JSON value's type in error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}
