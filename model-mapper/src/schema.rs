//! Property declarations of a model type.

use crate::errors::ValidationReason;
use crate::value::{Properties, PropertyType, PropertyValue, ValueKind};

/// A single declared property: its key, kind, optionality and default.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    key: String,
    kind: ValueKind,
    optional: bool,
    default: Option<PropertyValue>,
}

impl PropertyDecl {
    /// A required declaration of `key` without a default.
    pub fn new(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            optional: false,
            default: None,
        }
    }

    /// Declares a property from its field type.
    pub fn of<T: PropertyType>(key: impl Into<String>) -> Self {
        Self::new(key, T::kind()).with_optional(T::is_optional())
    }

    /// Marks the property as accepting absent and null values.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Sets the value used when the property is absent from the input.
    pub fn with_default(mut self, value: PropertyValue) -> Self {
        self.default = Some(value);
        self
    }

    /// The property key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The kind of value the property holds.
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Whether absent and null values are accepted.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The value used when the input lacks the property.
    pub fn default_value(&self) -> Option<&PropertyValue> {
        self.default.as_ref()
    }

    /// Checks a candidate value against this declaration.
    ///
    /// Absent and null values are accepted only for optional properties.
    pub fn check(&self, value: Option<&PropertyValue>) -> Result<(), ValidationReason> {
        match value {
            None | Some(PropertyValue::Null) if self.optional => Ok(()),
            None | Some(PropertyValue::Null) => Err(ValidationReason::RequiredValueMissing),
            Some(value) if self.kind.accepts(value) => Ok(()),
            Some(value) => Err(ValidationReason::TypeMismatch {
                expected: self.kind.name(),
                found: value.type_name().to_string(),
            }),
        }
    }
}

/// The ordered set of properties a model declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    properties: Vec<PropertyDecl>,
}

impl Schema {
    /// A schema without declarations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration. Re-declaring a key replaces the earlier declaration
    /// in place.
    pub fn property(mut self, decl: PropertyDecl) -> Self {
        match self.properties.iter_mut().find(|d| d.key == decl.key) {
            Some(existing) => *existing = decl,
            None => self.properties.push(decl),
        }
        self
    }

    /// Adds the declarations of a parent schema for keys not declared yet.
    ///
    /// A key this schema already declares keeps its own declaration, so a
    /// subtype's re-declaration wins regardless of field order.
    pub fn inherit(mut self, parent: Schema) -> Self {
        for decl in parent.properties {
            if !self.contains(&decl.key) {
                self.properties.push(decl);
            }
        }
        self
    }

    /// The declaration of `key`.
    pub fn get(&self, key: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|d| d.key == key)
    }

    /// Whether `key` is declared.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.properties.iter()
    }

    /// Declared keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|d| d.key.as_str())
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Fills in declared defaults for absent properties, and for null values
    /// of non-optional properties.
    pub fn apply_defaults(&self, properties: &mut Properties) {
        for decl in &self.properties {
            let Some(default) = &decl.default else {
                continue;
            };
            let replace = match properties.get(&decl.key) {
                None => true,
                Some(PropertyValue::Null) => !decl.optional,
                Some(_) => false,
            };
            if replace {
                properties.insert(decl.key.clone(), default.clone());
            }
        }
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a PropertyDecl;
    type IntoIter = std::slice::Iter<'a, PropertyDecl>;

    fn into_iter(self) -> Self::IntoIter {
        self.properties.iter()
    }
}
