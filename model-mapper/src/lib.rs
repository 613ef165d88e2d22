//! # model-mapper
//!
//! A library for mapping typed model structs to and from nested JSON
//! representations through declared key paths and value transformers.
//!
//! ## Features
//!
//! - **Static schemas**: `#[derive(PropertySet)]` declares a model's properties at compile time
//! - **Key paths**: Map properties to nested keys, or merge several keys into one property
//! - **Transformers**: Reversible value conversions, with defaults chosen by property type
//! - **Class clusters**: Choose the concrete model type from the input content
//! - **Migrations**: Upgrade data written by older model versions before decoding
//! - **Error combining**: Collect every property failure instead of stopping at the first
//! - **Merging and updates**: Copy values between models and apply validated updates
//! - **Multi-format support**: Decode from JSON, TOML, YAML, or any serde-compatible format
//!
//! ## Basic Example
//!
//! ```ignore
//! use model_mapper::{JsonAdapter, KeyPathMapping, Model, PropertySet, Transformer};
//! use model_mapper::transformer::registry;
//! use serde_json::json;
//!
//! #[derive(Debug, Clone, PartialEq, PropertySet)]
//! struct User {
//!     name: String,
//!     count: u32,
//!     #[property(default)]
//!     admin: bool,
//! }
//!
//! impl Model for User {
//!     fn key_paths() -> KeyPathMapping {
//!         KeyPathMapping::new().path("name", "profile.name")
//!     }
//!
//!     fn transformer_for_key(key: &str) -> Option<Transformer> {
//!         match key {
//!             "count" => registry::named(registry::NUMBER_STRING),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let adapter = JsonAdapter::new();
//! let user: User = adapter.model_from_json(&json!({
//!     "profile": {"name": "Alice"},
//!     "count": "3"
//! }))?;
//! assert_eq!(user.count, 3);
//!
//! let json = adapter.json_from_model(&user)?;
//! // → {"profile": {"name": "Alice"}, "count": "3", "admin": false}
//! ```
//!
//! ## Versioned Models
//!
//! ```ignore
//! use model_mapper::{JsonMap, Migrations, Model};
//! use model_mapper::migration::rename_key;
//!
//! impl Model for Account {
//!     const VERSION: u32 = 1;
//!
//!     fn migrate(external: JsonMap, from_version: u32) -> Option<JsonMap> {
//!         Migrations::new()
//!             .step(0, |mut v0| {
//!                 rename_key(&mut v0, "old_name", "name");
//!                 Some(v0)
//!             })
//!             .apply(external, from_version, Self::VERSION)
//!     }
//! }
//! ```
//!
//! Encoded models carry `"version": 1`; input without a version key is read
//! as current.
//!
//! ## Class Clusters
//!
//! ```ignore
//! impl Model for Flavor {
//!     fn class_for_parsing(external: &JsonMap) -> Option<ModelType> {
//!         match external.get("kind")?.as_str()? {
//!             "chocolate" => Some(ModelType::of::<Chocolate>()),
//!             "vanilla" => Some(ModelType::of::<Vanilla>()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let flavor = adapter.model_of_type(ModelType::of::<Flavor>(), &json)?;
//! let chocolate = flavor.downcast::<Chocolate>();
//! ```

// Lets the derive's `::model_mapper` paths resolve inside this crate.
extern crate self as model_mapper;

pub mod adapter;
pub mod errors;
pub mod key_path;
pub mod mapping;
pub mod migration;
pub mod model;
pub mod options;
pub mod resolver;
pub mod schema;
pub mod transformer;
pub mod update;
pub mod validation;
pub mod value;

// Re-export the derive macro
pub use model_mapper_macro::PropertySet;

pub use adapter::JsonAdapter;
pub use errors::{MappingError, ValidationReason};
pub use key_path::{JsonMap, KeyPath, MappingTarget};
pub use mapping::{KeyPathMapping, MappingEntry};
pub use migration::Migrations;
pub use model::{AnyModel, ModelRef, ModelType, StorageBehavior};
pub use options::{AdapterOptions, ErrorMode};
pub use schema::{PropertyDecl, Schema};
pub use transformer::{TransformContext, Transformer, ValueTransformer};
pub use value::{mismatch, Properties, PropertyType, PropertyValue, ValueKind};

/// The declared properties of a struct and its conversion to and from a
/// property bag.
///
/// Derived with `#[derive(PropertySet)]`. Field attributes:
///
/// - `#[property(default)]`: use `Default::default()` when the input lacks the key
/// - `#[property(default = expr)]`: use `expr` when the input lacks the key
/// - `#[property(flatten)]`: inherit the properties of another `PropertySet`
/// - `#[property(skip)]`: not a property; built with `Default::default()`
pub trait PropertySet: Sized {
    /// The declared properties, in field order.
    fn schema() -> Schema;

    /// Builds an instance, taking its values out of `properties`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` if a required value is missing or a value
    /// has the wrong type.
    fn from_properties(properties: &mut Properties) -> Result<Self, MappingError>;

    /// Every property value, keyed by property key.
    fn properties(&self) -> Properties;
}

/// A model that can be mapped to and from external representations.
///
/// Every hook has a default; a plain model only needs `impl Model for T {}`.
pub trait Model: PropertySet + std::fmt::Debug + Send + Sync + 'static {
    /// The current schema version. Versions above 0 are written to and read
    /// from `VERSION_KEY`.
    const VERSION: u32 = 0;

    /// The external key carrying the version.
    /// Defaults to "version".
    const VERSION_KEY: &'static str = "version";

    /// Where each property lives in the external representation. Keys
    /// without an entry map to a path named after the key.
    fn key_paths() -> KeyPathMapping {
        KeyPathMapping::new()
    }

    /// A transformer for `key`, overriding the type-based default.
    fn transformer_for_key(_key: &str) -> Option<Transformer> {
        None
    }

    /// The concrete type to decode `external` as. Returning `None` fails the
    /// decode with `NoConcreteTypeFound`.
    fn class_for_parsing(_external: &JsonMap) -> Option<ModelType> {
        Some(ModelType::of::<Self>())
    }

    /// Upgrades data written at `from_version` to the current version.
    ///
    /// Only called when `from_version` is older than `VERSION`. Returning
    /// `None` fails the decode with `MigrationUnsupported`.
    fn migrate(external: JsonMap, from_version: u32) -> Option<JsonMap> {
        (from_version == Self::VERSION).then_some(external)
    }

    /// Checks one property value after construction.
    ///
    /// `Ok(Some(value))` replaces the value with a corrected one.
    fn validate_property(
        _key: &str,
        _value: Option<&PropertyValue>,
    ) -> Result<Option<PropertyValue>, ValidationReason> {
        Ok(None)
    }

    /// Validates a constructed model, returning it (possibly rebuilt with
    /// substituted values) or the rejection.
    fn validate(self, mode: ErrorMode) -> Result<Self, MappingError> {
        validation::validate_model(self, mode)
    }

    /// How the property `key` is stored.
    ///
    /// `StorageBehavior::None` leaves the property out of encoding, merging
    /// and `dictionary_value`; decoding never reads it, so it needs a default
    /// or an `Option` type. `Transitory` properties are ignored when
    /// comparing `ModelRef`s.
    fn storage_behavior(_key: &str) -> StorageBehavior {
        StorageBehavior::Permanent
    }

    /// The stored property values, keyed by property key.
    fn dictionary_value(&self) -> Properties {
        update::dictionary_value(self)
    }

    /// Builds and validates a model from property values, filling in
    /// declared defaults.
    fn with_properties(properties: Properties, mode: ErrorMode) -> Result<Self, MappingError> {
        update::model_with_properties(properties, mode)
    }

    /// Replaces the given property values and re-validates the model. On
    /// error the model is left unchanged.
    fn update_with_properties(
        &mut self,
        updates: Properties,
        mode: ErrorMode,
    ) -> Result<(), MappingError> {
        update::update_model(self, updates, mode)
    }

    /// Merges the value of `key` from `other` into this model.
    ///
    /// The default takes `other`'s value. Override to combine values, e.g.
    /// appending collections, and fall back to `update::copy_value_for_key`
    /// for the other keys.
    fn merge_value_for_key(&mut self, key: &str, other: &Self) -> Result<(), MappingError> {
        update::copy_value_for_key(self, key, other)
    }

    /// Calls `merge_value_for_key` for every key not stored as
    /// `StorageBehavior::None`.
    fn merge_values_from(&mut self, other: &Self) -> Result<(), MappingError> {
        update::merge_values(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, PropertySet)]
    struct Note {
        title: String,
        #[property(default = 1)]
        priority: u8,
        tags: Vec<String>,
    }

    impl Model for Note {}

    #[test]
    fn test_derived_schema() {
        let schema = Note::schema();
        let keys: Vec<_> = schema.keys().collect();
        assert_eq!(keys, vec!["title", "priority", "tags"]);
        assert_eq!(
            schema.get("priority").unwrap().default_value(),
            Some(&PropertyValue::UInt(1))
        );
    }

    #[test]
    fn test_derived_properties_round_trip() {
        let note = Note {
            title: "Groceries".to_string(),
            priority: 2,
            tags: vec!["home".to_string()],
        };
        let mut properties = PropertySet::properties(&note);
        assert_eq!(properties.get("title"), Some(&PropertyValue::from("Groceries")));
        assert_eq!(Note::from_properties(&mut properties).unwrap(), note);
    }

    #[test]
    fn test_default_hooks() {
        assert_eq!(Note::VERSION, 0);
        assert_eq!(Note::VERSION_KEY, "version");
        assert!(Note::key_paths().is_empty());
        assert!(Note::transformer_for_key("title").is_none());
        assert_eq!(
            Note::class_for_parsing(&JsonMap::new()),
            Some(ModelType::of::<Note>())
        );
        assert!(Note::migrate(JsonMap::new(), 0).is_some());
        assert!(Note::migrate(JsonMap::new(), 1).is_none());
    }

    #[test]
    fn test_decode_applies_declared_default() {
        let note: Note = JsonAdapter::new()
            .model_from_json(&json!({"title": "Groceries", "tags": []}))
            .unwrap();
        assert_eq!(note.priority, 1);
    }
}
