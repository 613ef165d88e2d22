//! Model-side values and the conversions between them and Rust field types.

use crate::errors::{MappingError, ValidationReason};
use crate::model::{ModelRef, ModelType};
use crate::Model;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use url::Url;

/// A property value as held by a model.
///
/// This is the typed counterpart of an external JSON value: transformers
/// convert between the two, and `PropertyType` converts between it and the
/// concrete field types of a model struct.
///
/// Equality is structural, except that two `Set`s are equal when they hold
/// the same elements in any order.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// No value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer that does not fit `Int`, or an unsigned field.
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// A parsed URL.
    Url(Url),
    /// A point in time.
    Date(DateTime<Utc>),
    /// An ordered sequence.
    Array(Vec<PropertyValue>),
    /// An unordered collection without duplicates.
    Set(Vec<PropertyValue>),
    /// A string-keyed mapping.
    Map(BTreeMap<String, PropertyValue>),
    /// A related model instance.
    Model(ModelRef),
}

impl PropertyValue {
    /// Builds a set, dropping duplicates while keeping first occurrences.
    pub fn set<I: IntoIterator<Item = PropertyValue>>(values: I) -> Self {
        let mut unique: Vec<PropertyValue> = Vec::new();
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        Self::Set(unique)
    }

    /// Converts an external value without any transformation.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts to an external value when no model instance is involved.
    ///
    /// URLs become strings and dates become RFC 3339 strings. Returns `None`
    /// for non-finite floats and for values containing models, which need an
    /// adapter to be serialized.
    pub fn to_plain_json(&self) -> Option<Value> {
        Some(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::UInt(u) => Value::from(*u),
            Self::Float(f) => Value::Number(serde_json::Number::from_f64(*f)?),
            Self::String(s) => Value::String(s.clone()),
            Self::Url(url) => Value::String(url.as_str().to_string()),
            Self::Date(date) => Value::String(format_rfc3339(date)),
            Self::Array(items) | Self::Set(items) => Value::Array(
                items
                    .iter()
                    .map(Self::to_plain_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Self::Map(map) => {
                let mut object = serde_json::Map::new();
                for (k, v) in map {
                    object.insert(k.clone(), v.to_plain_json()?);
                }
                Value::Object(object)
            }
            Self::Model(_) => return None,
        })
    }

    /// The name of this value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Url(_) => "URL",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Set(_) => "set",
            Self::Map(_) => "mapping",
            Self::Model(_) => "model",
        }
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this is `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as `i64`, if it is an integer in range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// The value as `u64`, if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(u) => Some(*u),
            Self::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// The value as `f64`, if it is any number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string, if this is `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The related model, if this holds one.
    pub fn as_model(&self) -> Option<&ModelRef> {
        match self {
            Self::Model(model) => Some(model),
            _ => None,
        }
    }

    /// The entries, if this is `Map`.
    pub fn as_map(&self) -> Option<&BTreeMap<String, PropertyValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Url(a), Self::Url(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => {
                a.len() == b.len()
                    && a.iter().all(|v| b.contains(v))
                    && b.iter().all(|v| a.contains(v))
            }
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Model(a), Self::Model(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::UInt(u) => write!(f, "{}", u),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Url(url) => write!(f, "{:?}", url.as_str()),
            Self::Date(date) => write!(f, "{}", format_rfc3339(date)),
            Self::Array(items) | Self::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Self::Model(model) => write!(f, "<{}>", model.model_type().name()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Url> for PropertyValue {
    fn from(value: Url) -> Self {
        Self::Url(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<ModelRef> for PropertyValue {
    fn from(value: ModelRef) -> Self {
        Self::Model(value)
    }
}

/// RFC 3339 in UTC with a `Z` suffix and only the fractional digits needed.
pub(crate) fn format_rfc3339(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// The declared type of a property.
///
/// Drives the type check applied before a model is constructed and the choice
/// of a default transformer.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// Any value.
    Any,
    Bool,
    Int,
    UInt,
    Float,
    String,
    Url,
    Date,
    /// An ordered sequence of the inner kind.
    Array(Box<ValueKind>),
    /// A set of the inner kind.
    Set(Box<ValueKind>),
    /// A string-keyed mapping with values of the inner kind.
    Map(Box<ValueKind>),
    /// A to-one relationship to the given model type.
    Model(ModelType),
    /// A relationship to a model of a type only known at runtime.
    AnyModel,
    /// A fieldless enum mapped from external strings to discriminants.
    Enum(&'static [(&'static str, i64)]),
}

impl ValueKind {
    /// Whether `value` is a valid non-null value of this kind.
    pub fn accepts(&self, value: &PropertyValue) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (_, PropertyValue::Null) => false,
            (Self::Bool, PropertyValue::Bool(_)) => true,
            (Self::Int, v) => v.as_i64().is_some(),
            (Self::UInt, v) => v.as_u64().is_some(),
            (Self::Float, v) => v.as_f64().is_some(),
            (Self::String, PropertyValue::String(_)) => true,
            (Self::Url, PropertyValue::Url(_)) => true,
            (Self::Date, PropertyValue::Date(_)) => true,
            (Self::Array(inner), PropertyValue::Array(items))
            | (Self::Set(inner), PropertyValue::Set(items))
            | (Self::Set(inner), PropertyValue::Array(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (Self::Map(inner), PropertyValue::Map(map)) => map.values().all(|v| inner.accepts(v)),
            (Self::Model(_), PropertyValue::Model(_)) => true,
            (Self::AnyModel, PropertyValue::Model(_)) => true,
            (Self::Enum(table), v) => v
                .as_i64()
                .is_some_and(|i| table.iter().any(|(_, d)| *d == i)),
            _ => false,
        }
    }

    /// A human readable name, used in error messages.
    pub fn name(&self) -> String {
        match self {
            Self::Any => "any value".to_string(),
            Self::Bool => "boolean".to_string(),
            Self::Int => "integer".to_string(),
            Self::UInt => "unsigned integer".to_string(),
            Self::Float => "float".to_string(),
            Self::String => "string".to_string(),
            Self::Url => "URL".to_string(),
            Self::Date => "date".to_string(),
            Self::Array(inner) => format!("array of {}", inner.name()),
            Self::Set(inner) => format!("set of {}", inner.name()),
            Self::Map(inner) => format!("mapping of {}", inner.name()),
            Self::Model(ty) => format!("model {}", ty.name()),
            Self::AnyModel => "model".to_string(),
            Self::Enum(table) => {
                let names = table.iter().map(|(n, _)| *n).collect::<Vec<_>>();
                format!("one of [{}]", names.join(", "))
            }
        }
    }
}

/// Conversion between a Rust field type and a `PropertyValue`.
///
/// Implemented for the scalar types, collections, `Option`, URLs, dates,
/// `Arc<M>` for related models and `ModelRef` for class-cluster relations.
pub trait PropertyType: Sized {
    /// The declared kind of properties of this type.
    fn kind() -> ValueKind;

    /// Whether the property may be null or absent.
    fn is_optional() -> bool {
        false
    }

    fn to_property(&self) -> PropertyValue;

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason>;

    /// The value used when the property is absent from the property bag.
    fn absent() -> Option<Self> {
        None
    }
}

/// A type mismatch between a field type and a value.
pub fn mismatch<T: PropertyType>(value: &PropertyValue) -> ValidationReason {
    ValidationReason::TypeMismatch {
        expected: T::kind().name(),
        found: value.type_name().to_string(),
    }
}

impl PropertyType for bool {
    fn kind() -> ValueKind {
        ValueKind::Bool
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Bool(*self)
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        value.as_bool().ok_or_else(|| mismatch::<Self>(&value))
    }
}

macro_rules! signed_property {
    ($($ty:ty),*) => {
        $(
            impl PropertyType for $ty {
                fn kind() -> ValueKind {
                    ValueKind::Int
                }

                fn to_property(&self) -> PropertyValue {
                    PropertyValue::Int(*self as i64)
                }

                fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
                    value
                        .as_i64()
                        .and_then(|i| <$ty>::try_from(i).ok())
                        .ok_or_else(|| mismatch::<Self>(&value))
                }
            }
        )*
    };
}

macro_rules! unsigned_property {
    ($($ty:ty),*) => {
        $(
            impl PropertyType for $ty {
                fn kind() -> ValueKind {
                    ValueKind::UInt
                }

                fn to_property(&self) -> PropertyValue {
                    PropertyValue::UInt(*self as u64)
                }

                fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
                    value
                        .as_u64()
                        .and_then(|u| <$ty>::try_from(u).ok())
                        .ok_or_else(|| mismatch::<Self>(&value))
                }
            }
        )*
    };
}

signed_property!(i8, i16, i32, i64, isize);
unsigned_property!(u8, u16, u32, u64, usize);

impl PropertyType for f64 {
    fn kind() -> ValueKind {
        ValueKind::Float
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Float(*self)
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        value.as_f64().ok_or_else(|| mismatch::<Self>(&value))
    }
}

impl PropertyType for f32 {
    fn kind() -> ValueKind {
        ValueKind::Float
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Float(f64::from(*self))
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        value
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch::<Self>(&value))
    }
}

impl PropertyType for String {
    fn kind() -> ValueKind {
        ValueKind::String
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::String(self.clone())
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::String(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl PropertyType for Url {
    fn kind() -> ValueKind {
        ValueKind::Url
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Url(self.clone())
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Url(url) => Ok(url),
            PropertyValue::String(s) => Url::parse(&s).map_err(|e| {
                ValidationReason::custom(format!("invalid URL {:?}: {}", s, e))
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl PropertyType for DateTime<Utc> {
    fn kind() -> ValueKind {
        ValueKind::Date
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Date(*self)
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Date(date) => Ok(date),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl PropertyType for Value {
    fn kind() -> ValueKind {
        ValueKind::Any
    }

    fn is_optional() -> bool {
        true
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::from_json(self)
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        value
            .to_plain_json()
            .ok_or_else(|| ValidationReason::custom("value has no plain JSON form"))
    }

    fn absent() -> Option<Self> {
        Some(Value::Null)
    }
}

impl<T: PropertyType> PropertyType for Option<T> {
    fn kind() -> ValueKind {
        T::kind()
    }

    fn is_optional() -> bool {
        true
    }

    fn to_property(&self) -> PropertyValue {
        match self {
            Some(value) => value.to_property(),
            None => PropertyValue::Null,
        }
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Null => Ok(None),
            other => T::from_property(other).map(Some),
        }
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

impl<T: PropertyType> PropertyType for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::Array(Box::new(T::kind()))
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Array(self.iter().map(PropertyType::to_property).collect())
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Array(items) | PropertyValue::Set(items) => {
                items.into_iter().map(T::from_property).collect()
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: PropertyType + Ord> PropertyType for BTreeSet<T> {
    fn kind() -> ValueKind {
        ValueKind::Set(Box::new(T::kind()))
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Set(self.iter().map(PropertyType::to_property).collect())
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Array(items) | PropertyValue::Set(items) => {
                items.into_iter().map(T::from_property).collect()
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: PropertyType + Eq + Hash> PropertyType for HashSet<T> {
    fn kind() -> ValueKind {
        ValueKind::Set(Box::new(T::kind()))
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Set(self.iter().map(PropertyType::to_property).collect())
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Array(items) | PropertyValue::Set(items) => {
                items.into_iter().map(T::from_property).collect()
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: PropertyType> PropertyType for BTreeMap<String, T> {
    fn kind() -> ValueKind {
        ValueKind::Map(Box::new(T::kind()))
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_property()))
                .collect(),
        )
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Map(map) => map
                .into_iter()
                .map(|(k, v)| T::from_property(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<M: Model> PropertyType for Arc<M> {
    fn kind() -> ValueKind {
        ValueKind::Model(ModelType::of::<M>())
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Model(ModelRef::from_arc(Arc::clone(self)))
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match &value {
            PropertyValue::Model(model) => model.downcast::<M>().ok_or_else(|| {
                ValidationReason::TypeMismatch {
                    expected: Self::kind().name(),
                    found: format!("model {}", model.model_type().name()),
                }
            }),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl PropertyType for ModelRef {
    fn kind() -> ValueKind {
        ValueKind::AnyModel
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Model(self.clone())
    }

    fn from_property(value: PropertyValue) -> Result<Self, ValidationReason> {
        match value {
            PropertyValue::Model(model) => Ok(model),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Implements `PropertyType` for a fieldless, `Copy` enum from a table of
/// external strings.
///
/// The model-side value is the variant's discriminant; the default
/// transformer for the property maps the external strings to it.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Role { Admin, Member }
///
/// model_mapper::enum_property!(Role {
///     "admin" => Role::Admin,
///     "member" => Role::Member,
/// });
/// ```
#[macro_export]
macro_rules! enum_property {
    ($ty:ty { $($name:literal => $variant:path),+ $(,)? }) => {
        impl $crate::PropertyType for $ty {
            fn kind() -> $crate::ValueKind {
                $crate::ValueKind::Enum(&[$(($name, $variant as i64)),+])
            }

            fn to_property(&self) -> $crate::PropertyValue {
                $crate::PropertyValue::Int(*self as i64)
            }

            fn from_property(
                value: $crate::PropertyValue,
            ) -> ::std::result::Result<Self, $crate::ValidationReason> {
                if let ::std::option::Option::Some(discriminant) = value.as_i64() {
                    $(
                        if discriminant == $variant as i64 {
                            return ::std::result::Result::Ok($variant);
                        }
                    )+
                }
                ::std::result::Result::Err($crate::mismatch::<Self>(&value))
            }
        }
    };
}

/// The property bag a model is built from and flattened into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    /// An empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value for `key`, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.values.insert(key.into(), value)
    }

    /// The value for `key`.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.values.remove(key)
    }

    /// Whether a value is present for `key`, null included.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.values.iter()
    }

    /// Keeps only the entries whose key satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.values.retain(|key, _| keep(key));
    }

    /// Adds every entry of `other`, replacing existing keys.
    pub fn extend(&mut self, other: Properties) {
        self.values.extend(other.values);
    }

    /// Removes the value for `key` and converts it to a field type.
    ///
    /// An absent key falls back to `PropertyType::absent`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` tagged with `model` and `key` when the value
    /// has the wrong type, or when a required value is absent.
    pub fn take<T: PropertyType>(&mut self, model: &str, key: &str) -> Result<T, MappingError> {
        let result = match self.values.remove(key) {
            Some(value) => T::from_property(value),
            None => T::absent().ok_or(ValidationReason::RequiredValueMissing),
        };
        result.map_err(|reason| MappingError::ValidationFailed {
            model: crate::model::short_name(model).to_string(),
            key: key.to_string(),
            reason,
        })
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Properties {
    type Item = (String, PropertyValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(PropertyValue::from_json(&json!(3)), PropertyValue::Int(3));
        assert_eq!(
            PropertyValue::from_json(&json!(u64::MAX)),
            PropertyValue::UInt(u64::MAX)
        );
        assert_eq!(PropertyValue::from_json(&json!(1.5)), PropertyValue::Float(1.5));
    }

    #[test]
    fn test_from_json_nested() {
        let value = PropertyValue::from_json(&json!({"a": [true, null], "b": "x"}));
        let map = value.as_map().unwrap();
        assert_eq!(
            map["a"],
            PropertyValue::Array(vec![PropertyValue::Bool(true), PropertyValue::Null])
        );
        assert_eq!(map["b"], PropertyValue::from("x"));
    }

    #[test]
    fn test_to_plain_json_converts_url_and_date() {
        let url = Url::parse("https://github.com").unwrap();
        assert_eq!(
            PropertyValue::Url(url).to_plain_json(),
            Some(json!("https://github.com/"))
        );

        let date = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            PropertyValue::Date(date).to_plain_json(),
            Some(json!("2024-05-01T10:00:00Z"))
        );
        assert_eq!(PropertyValue::Float(f64::NAN).to_plain_json(), None);
    }

    #[test]
    fn test_set_deduplicates() {
        let set = PropertyValue::set(vec![
            PropertyValue::from("a"),
            PropertyValue::from("b"),
            PropertyValue::from("a"),
        ]);
        assert_eq!(
            set,
            PropertyValue::Set(vec![PropertyValue::from("a"), PropertyValue::from("b")])
        );
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let ab = PropertyValue::Set(vec![PropertyValue::from("a"), PropertyValue::from("b")]);
        let ba = PropertyValue::Set(vec![PropertyValue::from("b"), PropertyValue::from("a")]);
        assert_eq!(ab, ba);
        assert_ne!(ab, PropertyValue::Set(vec![PropertyValue::from("a")]));
        assert_ne!(
            ab,
            PropertyValue::Array(vec![PropertyValue::from("a"), PropertyValue::from("b")])
        );

        let left: HashSet<u32> = (0..32).collect();
        let right: HashSet<u32> = (0..32).rev().collect();
        assert_eq!(left.to_property(), right.to_property());
    }

    #[test]
    fn test_arrays_stay_ordered() {
        let ab = PropertyValue::Array(vec![PropertyValue::Int(1), PropertyValue::Int(2)]);
        let ba = PropertyValue::Array(vec![PropertyValue::Int(2), PropertyValue::Int(1)]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_kind_accepts() {
        assert!(ValueKind::UInt.accepts(&PropertyValue::Int(3)));
        assert!(!ValueKind::UInt.accepts(&PropertyValue::Int(-3)));
        assert!(ValueKind::Float.accepts(&PropertyValue::UInt(3)));
        assert!(!ValueKind::String.accepts(&PropertyValue::Null));
        assert!(ValueKind::Any.accepts(&PropertyValue::Null));
        assert!(ValueKind::Array(Box::new(ValueKind::String))
            .accepts(&PropertyValue::Array(vec![PropertyValue::from("x")])));
        assert!(!ValueKind::Array(Box::new(ValueKind::String))
            .accepts(&PropertyValue::Array(vec![PropertyValue::Bool(true)])));
        assert!(ValueKind::Enum(&[("a", 0), ("b", 1)]).accepts(&PropertyValue::Int(1)));
        assert!(!ValueKind::Enum(&[("a", 0), ("b", 1)]).accepts(&PropertyValue::Int(2)));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            ValueKind::Array(Box::new(ValueKind::UInt)).name(),
            "array of unsigned integer"
        );
        assert_eq!(ValueKind::Enum(&[("a", 0), ("b", 1)]).name(), "one of [a, b]");
    }

    #[test]
    fn test_integer_conversions_check_range() {
        assert_eq!(u8::from_property(PropertyValue::Int(200)), Ok(200u8));
        assert!(u8::from_property(PropertyValue::Int(300)).is_err());
        assert!(u64::from_property(PropertyValue::Int(-1)).is_err());
        assert_eq!(i64::from_property(PropertyValue::UInt(7)), Ok(7));
    }

    #[test]
    fn test_option_conversions() {
        assert_eq!(Option::<String>::from_property(PropertyValue::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_property(PropertyValue::from("x")),
            Ok(Some("x".to_string()))
        );
        assert_eq!(Option::<String>::absent(), Some(None));
        assert!(Option::<String>::is_optional());
        assert!(!String::is_optional());
    }

    #[test]
    fn test_url_accepts_valid_string() {
        assert!(Url::from_property(PropertyValue::from("https://example.com")).is_ok());
        assert!(Url::from_property(PropertyValue::from("not a url")).is_err());
    }

    #[test]
    fn test_collection_conversions() {
        let values = vec!["b".to_string(), "a".to_string()];
        let property = values.to_property();
        assert_eq!(Vec::<String>::from_property(property.clone()), Ok(values));

        let set = BTreeSet::<String>::from_property(property).unwrap();
        assert_eq!(set.len(), 2);

        let mut map = BTreeMap::new();
        map.insert("k".to_string(), 1i64);
        assert_eq!(BTreeMap::<String, i64>::from_property(map.to_property()), Ok(map));
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Role {
        Admin = 1,
        Member = 2,
    }

    crate::enum_property!(Role {
        "admin" => Role::Admin,
        "member" => Role::Member,
    });

    #[test]
    fn test_enum_property() {
        assert_eq!(Role::kind(), ValueKind::Enum(&[("admin", 1), ("member", 2)]));
        assert_eq!(Role::Member.to_property(), PropertyValue::Int(2));
        assert_eq!(Role::from_property(PropertyValue::Int(1)), Ok(Role::Admin));
        assert!(Role::from_property(PropertyValue::Int(5)).is_err());
    }

    #[test]
    fn test_properties_take() {
        let mut properties = Properties::new();
        properties.insert("name", PropertyValue::from("Alice"));
        properties.insert("count", PropertyValue::from("three"));

        let name: String = properties.take("tests::User", "name").unwrap();
        assert_eq!(name, "Alice");
        assert!(!properties.contains_key("name"));

        let err = properties.take::<u32>("tests::User", "count").unwrap_err();
        assert!(matches!(
            err,
            MappingError::ValidationFailed {
                reason: ValidationReason::TypeMismatch { .. },
                ..
            }
        ));

        let missing = properties.take::<String>("tests::User", "email").unwrap_err();
        match missing {
            MappingError::ValidationFailed { model, reason, .. } => {
                assert_eq!(model, "User");
                assert_eq!(reason, ValidationReason::RequiredValueMissing);
            }
            other => panic!("unexpected error: {other}"),
        }

        let nickname: Option<String> = properties.take("tests::User", "nickname").unwrap();
        assert_eq!(nickname, None);
    }
}
