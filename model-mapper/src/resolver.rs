//! Resolution of a model type's effective mapping, computed once per type.

use crate::errors::MappingError;
use crate::key_path::{KeyPath, MappingTarget};
use crate::mapping::MappingEntry;
use crate::model::{ModelType, StorageBehavior};
use crate::schema::{PropertyDecl, Schema};
use crate::transformer::{registry, ArrayTransformer, ModelTransformer, Transformer, ValueMappingTransformer};
use crate::value::ValueKind;
use log::debug;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// The effective mapping of one declared property.
#[derive(Debug, Clone)]
pub struct ResolvedProperty {
    decl: PropertyDecl,
    target: Option<MappingTarget>,
    transformer: Option<Transformer>,
}

impl ResolvedProperty {
    /// The declaration this property was resolved from.
    pub fn decl(&self) -> &PropertyDecl {
        &self.decl
    }

    /// The declared property key.
    pub fn key(&self) -> &str {
        self.decl.key()
    }

    /// Where the property is read from and written to; `None` when omitted.
    pub fn target(&self) -> Option<&MappingTarget> {
        self.target.as_ref()
    }

    /// The transformer to apply; `None` means identity.
    pub fn transformer(&self) -> Option<&Transformer> {
        self.transformer.as_ref()
    }

    /// Whether the property is neither decoded nor encoded.
    pub fn is_omitted(&self) -> bool {
        self.target.is_none()
    }
}

/// A model type's schema joined with its mapping and transformers, in
/// declaration order.
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    model: ModelType,
    schema: Schema,
    properties: Vec<ResolvedProperty>,
}

impl ResolvedMapping {
    /// The resolved model type.
    pub fn model(&self) -> ModelType {
        self.model
    }

    /// The schema of the resolved model type.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Every declared property, in declaration order.
    pub fn properties(&self) -> &[ResolvedProperty] {
        &self.properties
    }

    /// The resolved property for `key`, if declared.
    pub fn get(&self, key: &str) -> Option<&ResolvedProperty> {
        self.properties.iter().find(|p| p.key() == key)
    }
}

static CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<ResolvedMapping>>>> = OnceLock::new();

fn cache() -> &'static RwLock<HashMap<TypeId, Arc<ResolvedMapping>>> {
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the cached mapping for `ty`, computing it on first use.
///
/// Invalid declarations are reported every time and never cached.
pub fn resolve(ty: ModelType) -> Result<Arc<ResolvedMapping>, MappingError> {
    {
        let cached = cache().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(mapping) = cached.get(&ty.id()) {
            return Ok(Arc::clone(mapping));
        }
    }

    let computed = Arc::new(compute(ty)?);
    let mut cached = cache().write().unwrap_or_else(PoisonError::into_inner);
    let mapping = cached.entry(ty.id()).or_insert_with(|| {
        debug!(
            "Cached mapping for '{}' ({} properties)",
            ty.name(),
            computed.properties.len()
        );
        Arc::clone(&computed)
    });
    Ok(Arc::clone(mapping))
}

/// Computes the mapping for `ty` without touching the cache.
pub fn compute(ty: ModelType) -> Result<ResolvedMapping, MappingError> {
    let schema = ty.schema();
    let mapping = ty.key_paths();

    if let Some((key, error)) = mapping.errors().first() {
        return Err(invalid(ty, key, error.to_string()));
    }

    for (key, _) in mapping.iter() {
        if !schema.contains(key) {
            return Err(invalid(ty, key, "not a declared property"));
        }
    }

    let properties = schema
        .iter()
        .map(|decl| -> Result<ResolvedProperty, MappingError> {
            let stored = ty.storage_behavior(decl.key()) != StorageBehavior::None;
            let target = match mapping.get(decl.key()) {
                _ if !stored => None,
                Some(MappingEntry::Omit) => None,
                Some(MappingEntry::Target(target)) => Some(target.clone()),
                None => Some(MappingTarget::Path(
                    KeyPath::new([decl.key()]).map_err(|e| invalid(ty, decl.key(), e.to_string()))?,
                )),
            };
            if let Some(target) = &target {
                check_target(ty, decl.key(), target)?;
            }
            let transformer = ty
                .transformer_for_key(decl.key())
                .or_else(|| default_transformer(decl.kind()));
            Ok(ResolvedProperty {
                decl: decl.clone(),
                target,
                transformer,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResolvedMapping {
        model: ty,
        schema,
        properties,
    })
}

fn check_target(ty: ModelType, key: &str, target: &MappingTarget) -> Result<(), MappingError> {
    if let MappingTarget::Merge(paths) = target {
        if paths.is_empty() {
            return Err(invalid(ty, key, "a merge needs at least one key path"));
        }
        let mut seen = HashSet::new();
        for path in paths {
            if !seen.insert(path.last()) {
                return Err(invalid(
                    ty,
                    key,
                    format!("merged key paths share the final key '{}'", path.last()),
                ));
            }
        }
    }
    if ty.version() > 0 {
        if let Some(path) = target.paths().iter().find(|p| p.first() == ty.version_key()) {
            return Err(invalid(
                ty,
                key,
                format!("key path '{}' collides with the version key", path),
            ));
        }
    }
    Ok(())
}

/// The transformer used for a declared kind when the model names none.
pub fn default_transformer(kind: &ValueKind) -> Option<Transformer> {
    match kind {
        ValueKind::Bool => registry::named(registry::BOOLEAN),
        ValueKind::Url => registry::named(registry::URL),
        ValueKind::Date => registry::named(registry::ISO8601_DATE),
        ValueKind::Model(ty) => Some(Arc::new(ModelTransformer::new(*ty))),
        ValueKind::Array(inner) => match inner.as_ref() {
            ValueKind::Model(ty) => Some(Arc::new(ArrayTransformer::of_models(*ty))),
            _ => None,
        },
        ValueKind::Set(inner) => match inner.as_ref() {
            ValueKind::Model(ty) => Some(Arc::new(ArrayTransformer::of_models(*ty).into_set())),
            _ => None,
        },
        ValueKind::Enum(table) => Some(Arc::new(ValueMappingTransformer::from_enum_table(table))),
        _ => None,
    }
}

fn invalid(ty: ModelType, key: &str, reason: impl Into<String>) -> MappingError {
    MappingError::InvalidMapping {
        model: ty.name().to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::ValueTransformer;
    use crate::{KeyPathMapping, Model, PropertySet};

    #[derive(Debug, Clone, PartialEq, PropertySet)]
    struct Cached {
        id: String,
        #[property(default)]
        session: Option<String>,
        done: bool,
    }

    impl Model for Cached {
        fn key_paths() -> KeyPathMapping {
            KeyPathMapping::new().path("session", "meta.session")
        }

        fn storage_behavior(key: &str) -> StorageBehavior {
            match key {
                "session" => StorageBehavior::None,
                _ => StorageBehavior::Permanent,
            }
        }
    }

    #[test]
    fn test_unstored_property_is_omitted() {
        let mapping = compute(ModelType::of::<Cached>()).unwrap();
        assert!(mapping.get("session").unwrap().is_omitted());
        assert!(!mapping.get("id").unwrap().is_omitted());
    }

    #[test]
    fn test_default_transformers_by_kind() {
        let mapping = compute(ModelType::of::<Cached>()).unwrap();
        let name = |key: &str| {
            mapping
                .get(key)
                .and_then(ResolvedProperty::transformer)
                .map(|t| t.name().to_string())
        };
        assert_eq!(name("done").as_deref(), Some(registry::BOOLEAN));
        assert_eq!(name("id"), None);
        assert!(default_transformer(&ValueKind::String).is_none());
    }

    #[test]
    fn test_resolve_caches_per_type() {
        let ty = ModelType::of::<Cached>();
        let first = resolve(ty).unwrap();
        assert!(Arc::ptr_eq(&first, &resolve(ty).unwrap()));
        assert_eq!(first.model(), ty);
    }
}
