//! Building, updating and merging models from property bags.
//!
//! These back the provided methods of `Model`. Each one works on the property
//! bag of the model and rebuilds it with `PropertySet::from_properties`, so
//! fields marked `#[property(skip)]` come back as `Default::default()`.

use crate::errors::{MappingError, ValidationReason};
use crate::model::{short_name, StorageBehavior};
use crate::options::ErrorMode;
use crate::schema::Schema;
use crate::validation::{self, failed};
use crate::value::Properties;
use crate::{Model, PropertySet};
use log::trace;

/// The property values of `model` whose storage behavior is not `None`.
pub fn dictionary_value<M: Model>(model: &M) -> Properties {
    let mut properties = PropertySet::properties(model);
    properties.retain(|key| M::storage_behavior(key) != StorageBehavior::None);
    properties
}

/// Builds and validates an `M` from property values.
///
/// Declared defaults fill absent values. Every value is checked against its
/// declaration before construction.
///
/// # Errors
///
/// Returns `ValidationFailed` for an undeclared key, a value of the wrong
/// type or a missing required value, and whatever `Model::validate` rejects.
/// In `ErrorMode::Combine` the checked failures come back as one `Aggregate`.
pub fn model_with_properties<M: Model>(
    mut properties: Properties,
    mode: ErrorMode,
) -> Result<M, MappingError> {
    let name = short_name(std::any::type_name::<M>());
    let schema = M::schema();
    schema.apply_defaults(&mut properties);

    let mut errors = undeclared(name, &schema, &properties);
    errors.extend(validation::property_errors(name, &schema, &properties, &[]));
    reject(errors, mode)?;

    M::from_properties(&mut properties)?.validate(mode)
}

/// Replaces the given properties of `model` and re-validates it.
///
/// The model is only changed when every update is accepted and validation
/// of the rebuilt model succeeds. A `Null` update clears an optional
/// property.
///
/// # Errors
///
/// As for `model_with_properties`, checking only the updated keys.
pub fn update_model<M: Model>(
    model: &mut M,
    updates: Properties,
    mode: ErrorMode,
) -> Result<(), MappingError> {
    let name = short_name(std::any::type_name::<M>());
    let schema = M::schema();

    let mut errors = undeclared(name, &schema, &updates);
    for (key, value) in updates.iter() {
        if let Some(decl) = schema.get(key) {
            if let Err(reason) = decl.check(Some(value)) {
                errors.push(failed(name, key, reason));
            }
        }
    }
    reject(errors, mode)?;

    trace!("Updating {} properties of '{}'", updates.len(), name);
    let mut properties = PropertySet::properties(model);
    properties.extend(updates);
    *model = M::from_properties(&mut properties)?.validate(mode)?;
    Ok(())
}

/// Sets the value of `key` on `model` to the value it has on `other`.
///
/// # Errors
///
/// Returns `InvalidMapping` if `M` does not declare `key`.
pub fn copy_value_for_key<M: Model>(
    model: &mut M,
    key: &str,
    other: &M,
) -> Result<(), MappingError> {
    let name = short_name(std::any::type_name::<M>());
    if !M::schema().contains(key) {
        return Err(MappingError::InvalidMapping {
            model: name.to_string(),
            key: key.to_string(),
            reason: "not a declared property".to_string(),
        });
    }

    let mut properties = PropertySet::properties(model);
    match PropertySet::properties(other).remove(key) {
        Some(value) => properties.insert(key, value),
        None => properties.remove(key),
    };
    *model = M::from_properties(&mut properties)?;
    Ok(())
}

/// Calls `Model::merge_value_for_key` for every stored key of `M`, in
/// declaration order.
pub fn merge_values<M: Model>(model: &mut M, other: &M) -> Result<(), MappingError> {
    let schema = M::schema();
    for key in schema.keys() {
        if M::storage_behavior(key) == StorageBehavior::None {
            continue;
        }
        model.merge_value_for_key(key, other)?;
    }
    Ok(())
}

fn undeclared(name: &str, schema: &Schema, properties: &Properties) -> Vec<MappingError> {
    properties
        .iter()
        .filter(|(key, _)| !schema.contains(key.as_str()))
        .map(|(key, _)| failed(name, key, ValidationReason::custom("not a declared property")))
        .collect()
}

fn reject(mut errors: Vec<MappingError>, mode: ErrorMode) -> Result<(), MappingError> {
    if errors.is_empty() {
        Ok(())
    } else if mode == ErrorMode::FailFast {
        Err(errors.remove(0))
    } else {
        Err(MappingError::Aggregate(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyValue;

    #[derive(Debug, Clone, PartialEq, PropertySet)]
    struct Counter {
        label: String,
        count: u32,
        #[property(default)]
        note: Option<String>,
        #[property(skip)]
        scratch: u32,
    }

    impl Model for Counter {
        fn storage_behavior(key: &str) -> StorageBehavior {
            match key {
                "note" => StorageBehavior::None,
                _ => StorageBehavior::Permanent,
            }
        }
    }

    fn counter(label: &str, count: u32) -> Counter {
        Counter {
            label: label.to_string(),
            count,
            note: Some("draft".to_string()),
            scratch: 7,
        }
    }

    #[test]
    fn test_dictionary_value_leaves_out_unstored_keys() {
        let properties = dictionary_value(&counter("a", 1));
        assert!(properties.contains_key("label"));
        assert!(properties.contains_key("count"));
        assert!(!properties.contains_key("note"));
    }

    #[test]
    fn test_copy_value_for_key() {
        let mut target = counter("a", 1);
        copy_value_for_key(&mut target, "count", &counter("b", 5)).unwrap();
        assert_eq!(target.count, 5);
        assert_eq!(target.label, "a");
        assert_eq!(target.scratch, 0);
    }

    #[test]
    fn test_copy_value_for_undeclared_key() {
        let mut target = counter("a", 1);
        let err = copy_value_for_key(&mut target, "scratch", &counter("b", 5)).unwrap_err();
        assert!(matches!(err, MappingError::InvalidMapping { key, .. } if key == "scratch"));
        assert_eq!(target.scratch, 7);
    }

    #[test]
    fn test_merge_values_skips_unstored_keys() {
        let mut target = counter("a", 1);
        let mut source = counter("b", 2);
        source.note = None;
        merge_values(&mut target, &source).unwrap();
        assert_eq!(target.label, "b");
        assert_eq!(target.count, 2);
        assert_eq!(target.note.as_deref(), Some("draft"));
    }

    #[test]
    fn test_reject_by_mode() {
        let errors = || {
            vec![
                failed("Counter", "label", ValidationReason::RequiredValueMissing),
                failed("Counter", "count", ValidationReason::RequiredValueMissing),
            ]
        };
        assert!(reject(Vec::new(), ErrorMode::FailFast).is_ok());
        let first = reject(errors(), ErrorMode::FailFast).unwrap_err();
        assert_eq!(first.property_key(), Some("label"));
        let all = reject(errors(), ErrorMode::Combine).unwrap_err();
        assert_eq!(all.errors().len(), 2);
    }

    #[test]
    fn test_with_properties_applies_defaults() {
        let mut properties = Properties::new();
        properties.insert("label", PropertyValue::from("a"));
        properties.insert("count", PropertyValue::Int(2));
        let built: Counter = model_with_properties(properties, ErrorMode::FailFast).unwrap();
        assert_eq!(built.note, None);
        assert_eq!(built.count, 2);
    }
}
