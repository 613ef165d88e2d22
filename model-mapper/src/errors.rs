//! Error types for mapping operations.

use std::fmt;
use thiserror::Error;

/// Why a single property was rejected during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationReason {
    /// The value does not have the declared property type.
    TypeMismatch {
        /// The declared type.
        expected: String,
        /// The type of the value that was found.
        found: String,
    },
    /// A non-optional property has no value and no declared default.
    RequiredValueMissing,
    /// A model-specific rule rejected the value.
    Custom(String),
}

impl ValidationReason {
    /// Creates a custom rule failure.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            Self::RequiredValueMissing => write!(f, "required value is missing"),
            Self::Custom(message) => write!(f, "{}", message),
        }
    }
}

fn format_aggregate(errors: &[MappingError]) -> String {
    let details = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} error(s) occurred: {}", errors.len(), details)
}

/// Error types that can occur while mapping models to and from external
/// representations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum MappingError {
    /// A key path could not be constructed.
    #[error("Invalid key path '{path}': {reason}")]
    InvalidKeyPath {
        /// The key path as written.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A model's mapping declaration is inconsistent with its schema.
    #[error("Invalid mapping for '{model}' key '{key}': {reason}")]
    InvalidMapping {
        /// The model type name.
        model: String,
        /// The property key the declaration refers to.
        key: String,
        /// Why the declaration was rejected.
        reason: String,
    },

    /// An intermediate node of the external representation is not a mapping,
    /// or a value does not have the expected shape.
    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// The key path (dotted form) where the mismatch occurred.
        path: String,
        /// What was expected at that position.
        expected: String,
        /// What was found instead.
        found: String,
    },

    /// A value transformer rejected its input.
    #[error("Transformer '{transformer}' failed on {value}: {reason}")]
    TransformationFailed {
        /// The transformer name.
        transformer: String,
        /// The offending input, rendered as JSON.
        value: String,
        /// The failure description.
        reason: String,
    },

    /// The class-cluster hook did not select a concrete type.
    #[error("No concrete model type found for '{model}'")]
    NoConcreteTypeFound {
        /// The model type whose hook was consulted.
        model: String,
    },

    /// No migration exists from the external version to the current one.
    #[error("Migration of '{model}' from version {from} to {to} is not supported")]
    MigrationUnsupported {
        /// The model type name.
        model: String,
        /// The version found in the external representation.
        from: u64,
        /// The model's current version.
        to: u32,
    },

    /// A property failed validation.
    #[error("Validation failed for '{model}' key '{key}': {reason}")]
    ValidationFailed {
        /// The model type name.
        model: String,
        /// The rejected property key.
        key: String,
        /// The reason for the rejection.
        reason: ValidationReason,
    },

    /// A property could not be mapped.
    #[error("Property '{key}' of '{model}': {source}")]
    PropertyFailed {
        /// The model type name.
        model: String,
        /// The property key.
        key: String,
        /// The underlying error.
        source: Box<MappingError>,
    },

    /// An element of a collection could not be transformed.
    #[error("Element {index}: {source}")]
    ElementFailed {
        /// The position of the element in the input sequence.
        index: usize,
        /// The underlying error.
        source: Box<MappingError>,
    },

    /// Recursion exceeded the configured depth bound.
    #[error("Maximum nesting depth {max_depth} exceeded (cyclic model graph?)")]
    CyclicGraphDetected {
        /// The configured bound.
        max_depth: usize,
    },

    /// Several independent failures collected in combine-errors mode.
    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<MappingError>),

    /// Failed to parse or convert input data.
    #[error("Failed to deserialize: {0}")]
    DeserializationError(String),

    /// Failed to render output data.
    #[error("Failed to serialize: {0}")]
    SerializationError(String),

    /// TOML parsing error.
    #[error("Failed to parse TOML: {0}")]
    TomlParseError(String),
}

impl MappingError {
    /// Wraps this error with the identity of the property it belongs to.
    pub fn for_property(self, model: &str, key: &str) -> Self {
        Self::PropertyFailed {
            model: model.to_string(),
            key: key.to_string(),
            source: Box::new(self),
        }
    }

    /// Wraps this error with the index of the collection element it belongs to.
    pub fn for_element(self, index: usize) -> Self {
        Self::ElementFailed {
            index,
            source: Box::new(self),
        }
    }

    /// Whether combine-errors mode aborts on this error instead of collecting it.
    ///
    /// Failures of the model being mapped itself (an invalid mapping, a shape
    /// mismatch, dispatch or migration) are structural. Once wrapped for a
    /// property or an element, a nested model's failure is collected by its
    /// parent, unless its root cause is a depth failure.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::PropertyFailed { .. } | Self::ElementFailed { .. } => {
                matches!(self.root_cause(), Self::CyclicGraphDetected { .. })
            }
            other => matches!(
                other,
                Self::InvalidKeyPath { .. }
                    | Self::InvalidMapping { .. }
                    | Self::TypeMismatch { .. }
                    | Self::NoConcreteTypeFound { .. }
                    | Self::MigrationUnsupported { .. }
                    | Self::CyclicGraphDetected { .. }
            ),
        }
    }

    /// The individual errors: the members of an aggregate, or the error itself.
    pub fn errors(&self) -> Vec<&MappingError> {
        match self {
            Self::Aggregate(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }

    /// The property key this error is attributed to, if any.
    pub fn property_key(&self) -> Option<&str> {
        match self {
            Self::PropertyFailed { key, .. } | Self::ValidationFailed { key, .. } => Some(key),
            _ => None,
        }
    }

    /// The innermost error, looking through property and element wrappers.
    pub fn root_cause(&self) -> &MappingError {
        match self {
            Self::PropertyFailed { source, .. } | Self::ElementFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}
