//! A process-wide registry of named transformers.
//!
//! The built-in names are always present; applications may register their own
//! or replace a built-in, which also changes the type-based default for URL,
//! date and boolean properties.
//!
//! Transformers are looked up when a model type's mapping is first resolved,
//! and the resolved mapping is cached for the life of the process. A
//! replacement registered after a model was first decoded or encoded does not
//! affect that model, so register replacements before using the adapter.

use super::{BooleanTransformer, DateTransformer, NumberStringTransformer, Transformer, UrlTransformer};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// `UrlTransformer`, the default for `Url` properties.
pub const URL: &str = "url";
/// `BooleanTransformer`, the default for `bool` properties.
pub const BOOLEAN: &str = "boolean";
/// `NumberStringTransformer`, never chosen by default.
pub const NUMBER_STRING: &str = "number-string";
/// `DateTransformer::rfc3339()`, the default for date properties.
pub const ISO8601_DATE: &str = "iso8601-date";

static REGISTRY: OnceLock<RwLock<HashMap<String, Transformer>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, Transformer>> {
    REGISTRY.get_or_init(|| {
        let mut built_in: HashMap<String, Transformer> = HashMap::new();
        built_in.insert(URL.to_string(), Arc::new(UrlTransformer));
        built_in.insert(BOOLEAN.to_string(), Arc::new(BooleanTransformer));
        built_in.insert(NUMBER_STRING.to_string(), Arc::new(NumberStringTransformer));
        built_in.insert(ISO8601_DATE.to_string(), Arc::new(DateTransformer::rfc3339()));
        RwLock::new(built_in)
    })
}

/// Looks up a transformer by name.
pub fn named(name: &str) -> Option<Transformer> {
    let transformers = registry().read().unwrap_or_else(PoisonError::into_inner);
    transformers.get(name).cloned()
}

/// Registers a transformer, returning the one previously registered under
/// `name`.
pub fn register(name: impl Into<String>, transformer: Transformer) -> Option<Transformer> {
    let name = name.into();
    debug!("Registering transformer '{}'", name);
    let mut transformers = registry().write().unwrap_or_else(PoisonError::into_inner);
    transformers.insert(name, transformer)
}

/// The registered names, sorted.
pub fn names() -> Vec<String> {
    let transformers = registry().read().unwrap_or_else(PoisonError::into_inner);
    let mut names: Vec<String> = transformers.keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::{FnTransformer, ValueTransformer};
    use crate::value::PropertyValue;

    #[test]
    fn test_built_ins_are_registered() {
        for name in [URL, BOOLEAN, NUMBER_STRING, ISO8601_DATE] {
            let transformer = named(name).unwrap();
            assert_eq!(transformer.name(), name);
        }
        assert!(named("no-such-transformer").is_none());
    }

    #[test]
    fn test_register_custom_transformer() {
        let custom = Arc::new(FnTransformer::forward_only("registry-test-zero", |_, _| {
            Ok(PropertyValue::Int(0))
        }));
        assert!(register("registry-test-zero", custom).is_none());
        assert!(named("registry-test-zero").is_some());
        assert!(names().contains(&"registry-test-zero".to_string()));
    }

    #[derive(Debug, Clone, PartialEq, crate::PropertySet)]
    struct Resolved {
        flag: bool,
    }

    impl crate::Model for Resolved {}

    #[test]
    fn test_resolved_mapping_keeps_earlier_transformer() {
        let ty = crate::ModelType::of::<Resolved>();
        let before = crate::resolver::resolve(ty).unwrap();
        let name = before.get("flag").and_then(|p| p.transformer()).map(|t| t.name().to_string());
        assert_eq!(name.as_deref(), Some(BOOLEAN));

        // Registering after resolution leaves the cached mapping alone
        register("registry-test-flag", Arc::new(BooleanTransformer));
        let after = crate::resolver::resolve(ty).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }
}
