//! Adapter configuration.

use crate::errors::MappingError;
use serde::{Deserialize, Serialize};

/// The default bound on model nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// How property failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Return the first failure.
    #[default]
    FailFast,
    /// Collect every independent failure into one aggregate error.
    Combine,
}

/// Options controlling a `JsonAdapter`.
///
/// Can be loaded from configuration files:
///
/// ```toml
/// combine_errors = true
/// max_depth = 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Collect all property failures instead of stopping at the first.
    pub combine_errors: bool,
    /// The deepest nesting of models accepted before failing with
    /// `CyclicGraphDetected`.
    pub max_depth: usize,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            combine_errors: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl AdapterOptions {
    /// Default options: fail fast, depth 64.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every property failure instead of returning the first.
    pub fn with_combine_errors(mut self, combine_errors: bool) -> Self {
        self.combine_errors = combine_errors;
        self
    }

    /// Sets the deepest nesting of related models before decoding fails.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The error mode implied by `combine_errors`.
    pub fn error_mode(&self) -> ErrorMode {
        if self.combine_errors {
            ErrorMode::Combine
        } else {
            ErrorMode::FailFast
        }
    }

    /// Parses options from TOML. Missing keys take their defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, MappingError> {
        toml::from_str(toml_str).map_err(|e| MappingError::TomlParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = AdapterOptions::default();
        assert!(!options.combine_errors);
        assert_eq!(options.max_depth, 64);
        assert_eq!(options.error_mode(), ErrorMode::FailFast);
    }

    #[test]
    fn test_builder() {
        let options = AdapterOptions::new().with_combine_errors(true).with_max_depth(3);
        assert_eq!(options.error_mode(), ErrorMode::Combine);
        assert_eq!(options.max_depth, 3);
    }

    #[test]
    fn test_from_toml_str() {
        let options = AdapterOptions::from_toml_str("combine_errors = true").unwrap();
        assert!(options.combine_errors);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);

        let options = AdapterOptions::from_toml_str("max_depth = 8").unwrap();
        assert_eq!(options.max_depth, 8);
    }

    #[test]
    fn test_from_toml_str_rejects_bad_types() {
        let result = AdapterOptions::from_toml_str("max_depth = \"deep\"");
        assert!(matches!(result, Err(MappingError::TomlParseError(_))));
    }
}
