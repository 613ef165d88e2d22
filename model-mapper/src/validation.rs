//! Property validation before and after model construction.

use crate::errors::{MappingError, ValidationReason};
use crate::model::short_name;
use crate::options::ErrorMode;
use crate::schema::Schema;
use crate::value::Properties;
use crate::{Model, PropertySet};

/// Checks collected values against the declared kinds of `schema`, returning
/// one `ValidationFailed` per rejected key in declaration order.
///
/// Keys listed in `skip` already failed earlier and are not reported again.
pub fn property_errors(
    model: &str,
    schema: &Schema,
    properties: &Properties,
    skip: &[&str],
) -> Vec<MappingError> {
    schema
        .iter()
        .filter(|decl| !skip.contains(&decl.key()))
        .filter_map(|decl| {
            decl.check(properties.get(decl.key()))
                .err()
                .map(|reason| failed(model, decl.key(), reason))
        })
        .collect()
}

/// Runs `M::validate_property` for every declared key.
///
/// A substituted value replaces the original and the model is rebuilt from
/// the corrected properties.
pub fn validate_model<M: Model>(model: M, mode: ErrorMode) -> Result<M, MappingError> {
    let name = short_name(std::any::type_name::<M>());
    let mut properties = PropertySet::properties(&model);
    let mut errors = Vec::new();
    let mut substituted = false;

    for decl in M::schema().iter() {
        match M::validate_property(decl.key(), properties.get(decl.key())) {
            Ok(None) => {}
            Ok(Some(value)) => {
                properties.insert(decl.key(), value);
                substituted = true;
            }
            Err(reason) => {
                let error = failed(name, decl.key(), reason);
                if mode == ErrorMode::FailFast {
                    return Err(error);
                }
                errors.push(error);
            }
        }
    }
    if !errors.is_empty() {
        return Err(MappingError::Aggregate(errors));
    }

    if substituted {
        M::from_properties(&mut properties)
    } else {
        Ok(model)
    }
}

/// A `ValidationFailed` for `key` of `model`.
pub(crate) fn failed(model: &str, key: &str, reason: ValidationReason) -> MappingError {
    MappingError::ValidationFailed {
        model: model.to_string(),
        key: key.to_string(),
        reason,
    }
}
