//! Type-erased model descriptors and shared model references.

use crate::errors::MappingError;
use crate::key_path::JsonMap;
use crate::mapping::KeyPathMapping;
use crate::options::ErrorMode;
use crate::schema::Schema;
use crate::transformer::Transformer;
use crate::value::Properties;
use crate::Model;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type BuildFn = fn(&mut Properties, ErrorMode) -> Result<ModelRef, MappingError>;

/// How a property takes part in a model's copies, comparisons and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageBehavior {
    /// Not encoded, merged or compared, and left out of `dictionary_value`.
    None,
    /// Encoded, merged and listed in `dictionary_value`, but ignored when
    /// comparing model references.
    Transitory,
    /// Part of every operation.
    #[default]
    Permanent,
}

/// A runtime descriptor of a `Model` type.
///
/// Carries the type's hooks as plain function pointers so that the adapter
/// can dispatch to a concrete type chosen at runtime (class clusters) and
/// decode nested models without knowing their static type.
#[derive(Clone, Copy)]
pub struct ModelType {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    version: u32,
    version_key: &'static str,
    schema: fn() -> Schema,
    key_paths: fn() -> KeyPathMapping,
    transformer_for_key: fn(&str) -> Option<Transformer>,
    class_for_parsing: fn(&JsonMap) -> Option<ModelType>,
    migrate: fn(JsonMap, u32) -> Option<JsonMap>,
    storage_behavior: fn(&str) -> StorageBehavior,
    build: BuildFn,
}

impl ModelType {
    /// The descriptor of `M`.
    pub fn of<M: Model>() -> Self {
        Self {
            type_id: TypeId::of::<M>,
            type_name: std::any::type_name::<M>,
            version: M::VERSION,
            version_key: M::VERSION_KEY,
            schema: M::schema,
            key_paths: M::key_paths,
            transformer_for_key: M::transformer_for_key,
            class_for_parsing: M::class_for_parsing,
            migrate: M::migrate,
            storage_behavior: M::storage_behavior,
            build: build_model::<M>,
        }
    }

    /// The `TypeId` of the described type.
    pub fn id(&self) -> TypeId {
        (self.type_id)()
    }

    /// The type name without its module path.
    pub fn name(&self) -> &'static str {
        short_name((self.type_name)())
    }

    /// The fully qualified type name.
    pub fn full_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Whether this describes `M`.
    pub fn is<M: Model>(&self) -> bool {
        self.id() == TypeId::of::<M>()
    }

    /// `Model::VERSION` of the described type.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// `Model::VERSION_KEY` of the described type.
    pub fn version_key(&self) -> &'static str {
        self.version_key
    }

    /// The declared properties of the described type.
    pub fn schema(&self) -> Schema {
        (self.schema)()
    }

    /// Calls `Model::key_paths`.
    pub fn key_paths(&self) -> KeyPathMapping {
        (self.key_paths)()
    }

    /// Calls `Model::transformer_for_key`.
    pub fn transformer_for_key(&self, key: &str) -> Option<Transformer> {
        (self.transformer_for_key)(key)
    }

    /// Calls `Model::class_for_parsing`.
    pub fn class_for_parsing(&self, external: &JsonMap) -> Option<ModelType> {
        (self.class_for_parsing)(external)
    }

    /// Calls `Model::migrate`.
    pub fn migrate(&self, external: JsonMap, from_version: u32) -> Option<JsonMap> {
        (self.migrate)(external, from_version)
    }

    /// Calls `Model::storage_behavior`.
    pub fn storage_behavior(&self, key: &str) -> StorageBehavior {
        (self.storage_behavior)(key)
    }

    /// Constructs and validates an instance from a property bag.
    pub(crate) fn build(
        &self,
        properties: &mut Properties,
        mode: ErrorMode,
    ) -> Result<ModelRef, MappingError> {
        (self.build)(properties, mode)
    }
}

fn build_model<M: Model>(
    properties: &mut Properties,
    mode: ErrorMode,
) -> Result<ModelRef, MappingError> {
    let model = M::from_properties(properties)?;
    let model = model.validate(mode)?;
    Ok(ModelRef::new(model))
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ModelType {}

impl Hash for ModelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelType({})", self.name())
    }
}

/// Strips the module path and generic arguments from a type name.
pub(crate) fn short_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Object-safe view of any `Model`.
pub trait AnyModel: Any + fmt::Debug + Send + Sync {
    /// The descriptor of the concrete type.
    fn model_type(&self) -> ModelType;
    /// The stored property values; see `Model::dictionary_value`.
    fn properties(&self) -> Properties;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<M: Model> AnyModel for M {
    fn model_type(&self) -> ModelType {
        ModelType::of::<M>()
    }

    fn properties(&self) -> Properties {
        self.dictionary_value()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A shared reference to a model of any type.
///
/// Used for related models whose concrete type is chosen at runtime. Two
/// references are equal when they hold the same model type with equal
/// permanent property values.
#[derive(Clone)]
pub struct ModelRef(Arc<dyn AnyModel>);

impl ModelRef {
    /// Wraps `model` in a new shared reference.
    pub fn new<M: Model>(model: M) -> Self {
        Self(Arc::new(model))
    }

    /// Shares an existing allocation instead of moving the model.
    pub fn from_arc<M: Model>(model: Arc<M>) -> Self {
        Self(model)
    }

    /// The concrete type of the referenced model.
    pub fn model_type(&self) -> ModelType {
        self.0.model_type()
    }

    /// Whether the referenced model is an `M`.
    pub fn is<M: Model>(&self) -> bool {
        self.model_type().is::<M>()
    }

    /// The stored property values of the referenced model.
    pub fn properties(&self) -> Properties {
        self.0.properties()
    }

    /// The property values with `StorageBehavior::Permanent`.
    pub fn permanent_properties(&self) -> Properties {
        let ty = self.model_type();
        let mut properties = self.properties();
        properties.retain(|key| ty.storage_behavior(key) == StorageBehavior::Permanent);
        properties
    }

    /// A borrowed reference to the model, if it is an `M`.
    pub fn downcast_ref<M: Model>(&self) -> Option<&M> {
        (*self.0).as_any().downcast_ref::<M>()
    }

    /// A typed handle to the same instance, if it is an `M`.
    pub fn downcast<M: Model>(&self) -> Option<Arc<M>> {
        Arc::clone(&self.0).into_any().downcast::<M>().ok()
    }

    /// The model as a trait object, for `JsonAdapter::json_from_any`.
    pub fn as_model(&self) -> &dyn AnyModel {
        &*self.0
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.model_type() == other.model_type()
            && self.permanent_properties() == other.permanent_properties()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("crate::models::User"), "User");
        assert_eq!(short_name("User"), "User");
        assert_eq!(short_name("a::Wrapper<b::Inner>"), "Wrapper");
    }
}
