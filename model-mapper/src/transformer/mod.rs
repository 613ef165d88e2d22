//! Value transformers between external and model-side values.
//!
//! A transformer converts an external JSON value into a `PropertyValue`
//! (`forward`) and, if it allows it, back again (`reverse`). Properties whose
//! transformer is not reversible are left out when a model is serialized.

mod built_in;
pub mod registry;

pub use built_in::{
    ArrayTransformer, BooleanTransformer, DateTransformer, FnTransformer, IdentityTransformer,
    ModelTransformer, NumberStringTransformer, UrlTransformer, ValueMappingTransformer,
};

use crate::adapter::JsonAdapter;
use crate::errors::MappingError;
use crate::model::{ModelRef, ModelType};
use crate::value::PropertyValue;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A shared transformer.
pub type Transformer = Arc<dyn ValueTransformer>;

/// A named, optionally reversible value conversion.
pub trait ValueTransformer: Send + Sync {
    /// The name reported in `TransformationFailed` errors.
    fn name(&self) -> &str;

    /// Converts an external value into a model-side value.
    fn forward(&self, value: &Value, ctx: &TransformContext<'_>)
        -> Result<PropertyValue, MappingError>;

    /// The model-side value to use when the input lacks the property.
    ///
    /// `None` leaves the property absent, so that declared defaults and
    /// validation apply.
    fn absent(&self) -> Option<PropertyValue> {
        None
    }

    /// Whether `reverse` is implemented.
    fn allows_reverse(&self) -> bool {
        false
    }

    /// Converts a model-side value back into an external value.
    fn reverse(&self, value: &PropertyValue, _ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        Err(failure(
            self.name(),
            value,
            "reverse transformation is not supported",
        ))
    }
}

impl fmt::Debug for dyn ValueTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transformer({})", self.name())
    }
}

/// The state a transformer runs in.
///
/// Gives access to the adapter so that nested models can be decoded and
/// encoded with the same options, at one level deeper than the current model.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    adapter: &'a JsonAdapter,
    depth: usize,
    key: Option<&'a str>,
}

impl<'a> TransformContext<'a> {
    /// A context for a model at `depth` processed by `adapter`.
    pub fn new(adapter: &'a JsonAdapter, depth: usize) -> Self {
        Self {
            adapter,
            depth,
            key: None,
        }
    }

    /// The same context for a specific property key.
    pub fn with_key(self, key: &'a str) -> Self {
        Self {
            key: Some(key),
            ..self
        }
    }

    /// The adapter running the transformation.
    pub fn adapter(&self) -> &'a JsonAdapter {
        self.adapter
    }

    /// The nesting depth of the model being processed; the root is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The property key being transformed, if known.
    pub fn key(&self) -> Option<&'a str> {
        self.key
    }

    /// Decodes a nested model of type `ty` (or a cluster subtype).
    pub fn decode_model(&self, ty: ModelType, value: &Value) -> Result<ModelRef, MappingError> {
        self.adapter.decode_any(ty, value, self.depth + 1)
    }

    /// Encodes a nested model.
    pub fn encode_model(&self, model: &ModelRef) -> Result<Value, MappingError> {
        self.adapter
            .encode(model.as_model(), self.depth + 1)
            .map(Value::Object)
    }
}

/// Builds a `TransformationFailed` error.
pub fn failure(
    transformer: &str,
    value: &impl fmt::Display,
    reason: impl Into<String>,
) -> MappingError {
    MappingError::TransformationFailed {
        transformer: transformer.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Converts an external value without transformation.
pub(crate) fn identity_forward(value: &Value) -> PropertyValue {
    PropertyValue::from_json(value)
}

/// Converts a model-side value to its canonical external form.
///
/// Nested models are encoded through the adapter; non-finite floats fail.
pub(crate) fn identity_reverse(
    value: &PropertyValue,
    ctx: &TransformContext<'_>,
) -> Result<Value, MappingError> {
    match value {
        PropertyValue::Model(model) => ctx.encode_model(model),
        PropertyValue::Array(items) | PropertyValue::Set(items) => items
            .iter()
            .map(|item| identity_reverse(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        PropertyValue::Map(map) => {
            let mut object = serde_json::Map::new();
            for (key, item) in map {
                object.insert(key.clone(), identity_reverse(item, ctx)?);
            }
            Ok(Value::Object(object))
        }
        PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| failure("identity", value, "non-finite numbers have no JSON form")),
        other => other
            .to_plain_json()
            .ok_or_else(|| failure("identity", other, "value has no JSON form")),
    }
}
