//! The JSON adapter: decoding external representations into models and
//! encoding models back.

use crate::errors::MappingError;
use crate::key_path::{json_type_name, JsonMap};
use crate::model::{AnyModel, ModelRef, ModelType};
use crate::options::{AdapterOptions, ErrorMode};
use crate::resolver;
use crate::transformer::{
    identity_forward, identity_reverse, ArrayTransformer, ModelTransformer, TransformContext,
    Transformer,
};
use crate::validation;
use crate::value::Properties;
use crate::Model;
use log::{debug, trace};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Converts between models and JSON values.
///
/// # Example
///
/// ```ignore
/// let adapter = JsonAdapter::new();
/// let user: User = adapter.model_from_json(&json!({"name": "Alice", "count": "3"}))?;
/// let json = adapter.json_from_model(&user)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonAdapter {
    options: AdapterOptions,
}

impl JsonAdapter {
    /// Creates an adapter with default options (fail fast, depth 64).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adapter with the given options.
    pub fn with_options(options: AdapterOptions) -> Self {
        Self { options }
    }

    /// The options this adapter decodes and encodes with.
    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Decodes a model of type `M` from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if `json` is not an object, or if `M`'s
    /// class-cluster hook selects a different type (use `model_of_type` for
    /// clusters). Any decoding failure of the properties is returned as
    /// described on `model_of_type`.
    pub fn model_from_json<M: Model>(&self, json: &Value) -> Result<M, MappingError> {
        let ty = ModelType::of::<M>();
        let (concrete, external) = self.prepare(ty, json, 0)?;
        if concrete != ty {
            return Err(MappingError::TypeMismatch {
                path: "$".to_string(),
                expected: format!("model {}", ty.name()),
                found: format!("model {}", concrete.name()),
            });
        }
        let mut properties = self.decode_properties(ty, &external, 0)?;
        let model = M::from_properties(&mut properties)?;
        model.validate(self.options.error_mode())
    }

    /// Decodes a model of type `ty`, or of the concrete type its class-cluster
    /// hook selects.
    ///
    /// # Errors
    ///
    /// - `NoConcreteTypeFound` if the hook selects no type
    /// - `MigrationUnsupported` if the data's version tag cannot be migrated
    /// - `PropertyFailed` wrapping the first property failure, or in combine
    ///   mode an `Aggregate` of every failure
    /// - `CyclicGraphDetected` if nesting exceeds `max_depth`
    pub fn model_of_type(&self, ty: ModelType, json: &Value) -> Result<ModelRef, MappingError> {
        self.decode_any(ty, json, 0)
    }

    /// Decodes every element of a JSON array, preserving order.
    pub fn models_from_json_array<M: Model>(&self, json: &Value) -> Result<Vec<M>, MappingError> {
        let Value::Array(items) = json else {
            return Err(MappingError::TypeMismatch {
                path: "$".to_string(),
                expected: "array".to_string(),
                found: json_type_name(json).to_string(),
            });
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.model_from_json(item).map_err(|e| e.for_element(i)))
            .collect()
    }

    /// Decodes a model from a JSON string.
    pub fn model_from_str<M: Model>(&self, json: &str) -> Result<M, MappingError> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            MappingError::DeserializationError(format!("Failed to parse JSON: {}", e))
        })?;
        self.model_from_json(&value)
    }

    /// Decodes a model from data in any serde-compatible format.
    ///
    /// ```ignore
    /// let toml_data: toml::Value = toml::from_str(toml_str)?;
    /// let user: User = adapter.model_from_value(toml_data)?;
    /// ```
    pub fn model_from_value<M, T>(&self, data: T) -> Result<M, MappingError>
    where
        M: Model,
        T: Serialize,
    {
        let value = serde_json::to_value(data).map_err(|e| {
            MappingError::DeserializationError(format!(
                "Failed to convert input data to internal format: {}",
                e
            ))
        })?;
        self.model_from_json(&value)
    }

    /// Encodes a model into a JSON object.
    pub fn json_from_model<M: Model>(&self, model: &M) -> Result<Value, MappingError> {
        self.encode(model, 0).map(Value::Object)
    }

    /// Encodes a model whose type is only known at runtime.
    pub fn json_from_any(&self, model: &dyn AnyModel) -> Result<Value, MappingError> {
        self.encode(model, 0).map(Value::Object)
    }

    /// Encodes a slice of models into a JSON array, preserving order.
    pub fn json_array_from_models<M: Model>(&self, models: &[M]) -> Result<Value, MappingError> {
        models
            .iter()
            .enumerate()
            .map(|(i, model)| self.json_from_model(model).map_err(|e| e.for_element(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    /// Encodes a model into a JSON string.
    pub fn to_json_string<M: Model>(&self, model: &M) -> Result<String, MappingError> {
        let value = self.json_from_model(model)?;
        serde_json::to_string(&value).map_err(|e| {
            MappingError::SerializationError(format!("Failed to serialize JSON: {}", e))
        })
    }

    /// A transformer decoding a JSON object into a model of type `ty`.
    pub fn dictionary_transformer(ty: ModelType) -> Transformer {
        Arc::new(ModelTransformer::new(ty))
    }

    /// A transformer decoding a JSON array of objects into models of type `ty`.
    pub fn array_transformer(ty: ModelType) -> Transformer {
        Arc::new(ArrayTransformer::of_models(ty))
    }

    /// Decodes a model of `ty` or its concrete type, at nesting `depth`.
    pub(crate) fn decode_any(
        &self,
        ty: ModelType,
        json: &Value,
        depth: usize,
    ) -> Result<ModelRef, MappingError> {
        let (concrete, external) = self.prepare(ty, json, depth)?;
        let mut properties = self.decode_properties(concrete, &external, depth)?;
        concrete.build(&mut properties, self.options.error_mode())
    }

    /// Checks depth, dispatches to the concrete type and migrates.
    fn prepare<'a>(
        &self,
        ty: ModelType,
        json: &'a Value,
        depth: usize,
    ) -> Result<(ModelType, Cow<'a, JsonMap>), MappingError> {
        self.check_depth(depth)?;
        let Value::Object(map) = json else {
            return Err(MappingError::TypeMismatch {
                path: "$".to_string(),
                expected: "mapping".to_string(),
                found: json_type_name(json).to_string(),
            });
        };

        let mut current = ty;
        let mut hops = 0;
        loop {
            let concrete = current
                .class_for_parsing(map)
                .ok_or_else(|| MappingError::NoConcreteTypeFound {
                    model: current.name().to_string(),
                })?;
            if concrete == current {
                break;
            }
            debug!("Dispatching '{}' to concrete type '{}'", current.name(), concrete.name());
            current = concrete;
            hops += 1;
            self.check_depth(depth + hops)?;
        }

        match self.migrate(current, map)? {
            Some(migrated) => Ok((current, Cow::Owned(migrated))),
            None => Ok((current, Cow::Borrowed(map))),
        }
    }

    /// Returns the migrated representation, or `None` if it is current.
    fn migrate(&self, ty: ModelType, external: &JsonMap) -> Result<Option<JsonMap>, MappingError> {
        if ty.version() == 0 {
            return Ok(None);
        }
        let Some(tag) = external.get(ty.version_key()) else {
            return Ok(None);
        };
        let from = tag.as_u64().ok_or_else(|| MappingError::TypeMismatch {
            path: ty.version_key().to_string(),
            expected: "non-negative integer".to_string(),
            found: json_type_name(tag).to_string(),
        })?;

        let unsupported = || MappingError::MigrationUnsupported {
            model: ty.name().to_string(),
            from,
            to: ty.version(),
        };
        if from == u64::from(ty.version()) {
            return Ok(None);
        }
        if from > u64::from(ty.version()) {
            return Err(unsupported());
        }

        let from_version = u32::try_from(from).map_err(|_| unsupported())?;
        let migrated = ty
            .migrate(external.clone(), from_version)
            .ok_or_else(unsupported)?;
        debug!(
            "Migrated '{}' from version {} to {}",
            ty.name(),
            from_version,
            ty.version()
        );
        Ok(Some(migrated))
    }

    /// Collects the property values of `ty` from `external`.
    fn decode_properties(
        &self,
        ty: ModelType,
        external: &JsonMap,
        depth: usize,
    ) -> Result<Properties, MappingError> {
        let mapping = resolver::resolve(ty)?;
        let mode = self.options.error_mode();
        let model = ty.name();
        let mut properties = Properties::new();
        let mut errors = Vec::new();
        let mut failed_keys: Vec<&str> = Vec::new();

        for property in mapping.properties() {
            let Some(target) = property.target() else {
                continue;
            };
            let Some(value) = target.resolve(external)? else {
                trace!("'{}.{}' not found at '{}'", model, property.key(), target);
                if let Some(absent) = property.transformer().and_then(|t| t.absent()) {
                    properties.insert(property.key(), absent);
                }
                continue;
            };
            trace!("Decoding '{}.{}' from '{}'", model, property.key(), target);

            let ctx = TransformContext::new(self, depth).with_key(property.key());
            let decoded = match property.transformer() {
                Some(transformer) => transformer.forward(&value, &ctx),
                None => Ok(identity_forward(&value)),
            };
            match decoded {
                Ok(decoded) => {
                    properties.insert(property.key(), decoded);
                }
                Err(e) => {
                    let e = e.for_property(model, property.key());
                    if mode == ErrorMode::FailFast || e.is_structural() {
                        return Err(e);
                    }
                    errors.push(e);
                    failed_keys.push(property.key());
                }
            }
        }

        mapping.schema().apply_defaults(&mut properties);

        let mut invalid = validation::property_errors(model, mapping.schema(), &properties, &failed_keys);
        if mode == ErrorMode::FailFast && !invalid.is_empty() {
            return Err(invalid.remove(0));
        }
        errors.append(&mut invalid);

        if errors.is_empty() {
            Ok(properties)
        } else {
            Err(MappingError::Aggregate(errors))
        }
    }

    /// Encodes a model, skipping omitted properties, properties without a
    /// reversible transformer, and null values.
    pub(crate) fn encode(&self, model: &dyn AnyModel, depth: usize) -> Result<JsonMap, MappingError> {
        self.check_depth(depth)?;
        let ty = model.model_type();
        let mapping = resolver::resolve(ty)?;
        let properties = model.properties();
        let mut external = JsonMap::new();

        for property in mapping.properties() {
            let Some(target) = property.target() else {
                continue;
            };
            let Some(value) = properties.get(property.key()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let ctx = TransformContext::new(self, depth).with_key(property.key());
            let encoded = match property.transformer() {
                Some(transformer) if !transformer.allows_reverse() => continue,
                Some(transformer) => transformer.reverse(value, &ctx),
                None => identity_reverse(value, &ctx),
            };
            let encoded = encoded.map_err(|e| e.for_property(ty.name(), property.key()))?;
            target
                .write(&mut external, encoded)
                .map_err(|e| e.for_property(ty.name(), property.key()))?;
        }

        if ty.version() > 0 {
            external.insert(ty.version_key().to_string(), Value::from(ty.version()));
        }
        Ok(external)
    }

    fn check_depth(&self, depth: usize) -> Result<(), MappingError> {
        if depth > self.options.max_depth {
            return Err(MappingError::CyclicGraphDetected {
                max_depth: self.options.max_depth,
            });
        }
        Ok(())
    }
}

