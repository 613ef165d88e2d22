use super::{failure, identity_forward, identity_reverse, TransformContext, Transformer, ValueTransformer};
use crate::errors::MappingError;
use crate::key_path::json_type_name;
use crate::model::ModelType;
use crate::value::{format_rfc3339, PropertyValue};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;
use url::Url;

/// Passes values through unchanged, using the canonical external forms of
/// URLs, dates and nested models on the way out.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl ValueTransformer for IdentityTransformer {
    fn name(&self) -> &str {
        "identity"
    }

    fn forward(&self, value: &Value, _ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        Ok(identity_forward(value))
    }

    fn allows_reverse(&self) -> bool {
        true
    }

    fn reverse(&self, value: &PropertyValue, ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        identity_reverse(value, ctx)
    }
}

/// Normalizes booleans encoded as JSON booleans or numbers.
///
/// Any non-zero number is `true`. Serialization always writes a JSON boolean.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanTransformer;

impl ValueTransformer for BooleanTransformer {
    fn name(&self) -> &str {
        "boolean"
    }

    fn forward(&self, value: &Value, _ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        match value {
            Value::Null => Ok(PropertyValue::Null),
            Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            Value::Number(n) => Ok(PropertyValue::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
            other => Err(failure(self.name(), other, "expected a boolean or a number")),
        }
    }

    fn allows_reverse(&self) -> bool {
        true
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Bool(b) => Ok(Value::Bool(*b)),
            other => match other.as_f64() {
                Some(f) => Ok(Value::Bool(f != 0.0)),
                None => Err(failure(self.name(), other, "expected a boolean")),
            },
        }
    }
}

/// Converts between URL strings and parsed URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlTransformer;

impl ValueTransformer for UrlTransformer {
    fn name(&self) -> &str {
        "url"
    }

    fn forward(&self, value: &Value, _ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        match value {
            Value::Null => Ok(PropertyValue::Null),
            Value::String(s) => Url::parse(s)
                .map(PropertyValue::Url)
                .map_err(|e| failure(self.name(), value, e.to_string())),
            other => Err(failure(self.name(), other, "expected a string")),
        }
    }

    fn allows_reverse(&self) -> bool {
        true
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Url(url) => Ok(Value::String(url.as_str().to_string())),
            PropertyValue::String(s) => match Url::parse(s) {
                Ok(_) => Ok(Value::String(s.clone())),
                Err(e) => Err(failure(self.name(), value, e.to_string())),
            },
            other => Err(failure(self.name(), other, "expected a URL")),
        }
    }
}

/// Converts between numbers encoded as strings and numeric values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberStringTransformer;

impl ValueTransformer for NumberStringTransformer {
    fn name(&self) -> &str {
        "number-string"
    }

    fn forward(&self, value: &Value, _ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        let s = match value {
            Value::Null => return Ok(PropertyValue::Null),
            Value::String(s) => s.trim(),
            other => return Err(failure(self.name(), other, "expected a string")),
        };
        if let Ok(i) = s.parse::<i64>() {
            return Ok(PropertyValue::Int(i));
        }
        if let Ok(u) = s.parse::<u64>() {
            return Ok(PropertyValue::UInt(u));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(PropertyValue::Float(f)),
            _ => Err(failure(self.name(), value, "not a number")),
        }
    }

    fn allows_reverse(&self) -> bool {
        true
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Int(i) => Ok(Value::String(i.to_string())),
            PropertyValue::UInt(u) => Ok(Value::String(u.to_string())),
            PropertyValue::Float(f) if f.is_finite() => Ok(Value::String(f.to_string())),
            other => Err(failure(self.name(), other, "expected a finite number")),
        }
    }
}

/// Maps external values to model values through a fixed table.
///
/// Unmapped inputs fall back to the configured default for that direction,
/// or fail. JSON null passes through unless the table maps it.
#[derive(Debug, Clone, Default)]
pub struct ValueMappingTransformer {
    pairs: Vec<(Value, PropertyValue)>,
    default_value: Option<PropertyValue>,
    reverse_default_value: Option<Value>,
}

impl ValueMappingTransformer {
    /// A transformer over `(external, model)` pairs.
    pub fn new<I: IntoIterator<Item = (Value, PropertyValue)>>(pairs: I) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A mapping from external strings to enum discriminants.
    pub fn from_enum_table(table: &[(&str, i64)]) -> Self {
        Self::new(
            table
                .iter()
                .map(|(name, discriminant)| (Value::from(*name), PropertyValue::Int(*discriminant))),
        )
    }

    /// The model value used for unmapped external values.
    pub fn with_default(mut self, value: PropertyValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// The external value used for unmapped model values.
    pub fn with_reverse_default(mut self, value: Value) -> Self {
        self.reverse_default_value = Some(value);
        self
    }
}

impl ValueTransformer for ValueMappingTransformer {
    fn name(&self) -> &str {
        "value-mapping"
    }

    fn forward(&self, value: &Value, _ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        if let Some((_, mapped)) = self.pairs.iter().find(|(external, _)| external == value) {
            return Ok(mapped.clone());
        }
        if value.is_null() {
            return Ok(PropertyValue::Null);
        }
        self.default_value
            .clone()
            .ok_or_else(|| failure(self.name(), value, "no mapping for value"))
    }

    fn allows_reverse(&self) -> bool {
        true
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        if let Some((external, _)) = self.pairs.iter().find(|(_, model)| model == value) {
            return Ok(external.clone());
        }
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.reverse_default_value
            .clone()
            .ok_or_else(|| failure(self.name(), value, "no mapping for value"))
    }
}

/// Applies an inner transformer to every element of an array.
///
/// Stops at the first failing element and reports its index.
#[derive(Debug, Clone)]
pub struct ArrayTransformer {
    name: String,
    inner: Transformer,
    into_set: bool,
}

impl ArrayTransformer {
    /// Applies `inner` to every element.
    pub fn new(inner: Transformer) -> Self {
        Self {
            name: format!("array({})", inner.name()),
            inner,
            into_set: false,
        }
    }

    /// Transforms each element as a nested model of type `ty`.
    pub fn of_models(ty: ModelType) -> Self {
        Self::new(Arc::new(ModelTransformer::new(ty)))
    }

    /// Produces a deduplicated set instead of an ordered array.
    pub fn into_set(mut self) -> Self {
        self.into_set = true;
        self
    }
}

impl ValueTransformer for ArrayTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, value: &Value, ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        let items = match value {
            Value::Null => return Ok(PropertyValue::Null),
            Value::Array(items) => items,
            other => {
                return Err(failure(
                    &self.name,
                    other,
                    format!("expected an array, found {}", json_type_name(other)),
                ))
            }
        };
        let values = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.inner.forward(item, ctx).map_err(|e| e.for_element(i)))
            .collect::<Result<Vec<_>, _>>()?;

        if self.into_set {
            Ok(PropertyValue::set(values))
        } else {
            Ok(PropertyValue::Array(values))
        }
    }

    fn allows_reverse(&self) -> bool {
        self.inner.allows_reverse()
    }

    fn reverse(&self, value: &PropertyValue, ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Array(items) | PropertyValue::Set(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.inner.reverse(item, ctx).map_err(|e| e.for_element(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(failure(&self.name, other, "expected an array or a set")),
        }
    }
}

/// Decodes and encodes a nested model through the adapter.
#[derive(Debug, Clone)]
pub struct ModelTransformer {
    name: String,
    ty: ModelType,
}

impl ModelTransformer {
    /// A transformer for models of type `ty`, or the cluster subtype it selects.
    pub fn new(ty: ModelType) -> Self {
        Self {
            name: format!("model({})", ty.name()),
            ty,
        }
    }

    /// The model type decoded by this transformer.
    pub fn model_type(&self) -> ModelType {
        self.ty
    }
}

impl ValueTransformer for ModelTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, value: &Value, ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        match value {
            Value::Null => Ok(PropertyValue::Null),
            Value::Object(_) => ctx.decode_model(self.ty, value).map(PropertyValue::Model),
            other => Err(failure(
                &self.name,
                other,
                format!("expected a mapping, found {}", json_type_name(other)),
            )),
        }
    }

    fn allows_reverse(&self) -> bool {
        true
    }

    fn reverse(&self, value: &PropertyValue, ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Model(model) => ctx.encode_model(model),
            other => Err(failure(&self.name, other, "expected a model")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DateFormat {
    Rfc3339,
    Pattern(String),
}

/// Converts between formatted date strings and dates.
///
/// Patterns use `strftime` syntax and the proleptic Gregorian calendar. Input
/// without an offset is read in the configured fixed offset (UTC unless set),
/// and output is written in it. A configured default date is substituted when
/// the input is absent, null or cannot be parsed.
#[derive(Debug, Clone)]
pub struct DateTransformer {
    name: String,
    format: DateFormat,
    offset: FixedOffset,
    default_date: Option<DateTime<Utc>>,
}

impl DateTransformer {
    /// A transformer for the given `strftime` pattern, e.g. `"%Y-%m-%d"`.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            name: format!("date({})", pattern),
            format: DateFormat::Pattern(pattern),
            offset: Utc.fix(),
            default_date: None,
        }
    }

    /// A transformer for RFC 3339 / ISO 8601 timestamps.
    pub fn rfc3339() -> Self {
        Self {
            name: "iso8601-date".to_string(),
            format: DateFormat::Rfc3339,
            offset: Utc.fix(),
            default_date: None,
        }
    }

    /// Reads offset-less input and writes output in `offset`.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Substitutes `date` for absent, null or unparseable input.
    pub fn with_default(mut self, date: DateTime<Utc>) -> Self {
        self.default_date = Some(date);
        self
    }

    fn parse(&self, s: &str) -> Option<DateTime<Utc>> {
        let parsed = match &self.format {
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(s).ok(),
            DateFormat::Pattern(pattern) => DateTime::parse_from_str(s, pattern)
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, pattern)
                        .ok()
                        .and_then(|naive| self.offset.from_local_datetime(&naive).single())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, pattern)
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .and_then(|naive| self.offset.from_local_datetime(&naive).single())
                }),
        };
        parsed.map(|date| date.with_timezone(&Utc))
    }

    fn fallback(&self, value: &Value, reason: &str) -> Result<PropertyValue, MappingError> {
        match self.default_date {
            Some(date) => Ok(PropertyValue::Date(date)),
            None if value.is_null() => Ok(PropertyValue::Null),
            None => Err(failure(&self.name, value, reason)),
        }
    }
}

impl ValueTransformer for DateTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn absent(&self) -> Option<PropertyValue> {
        self.default_date.map(PropertyValue::Date)
    }

    fn forward(&self, value: &Value, _ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        match value {
            Value::String(s) => match self.parse(s) {
                Some(date) => Ok(PropertyValue::Date(date)),
                None => self.fallback(value, "does not match the date format"),
            },
            Value::Null => self.fallback(value, "no date"),
            other => self.fallback(other, "expected a string"),
        }
    }

    fn allows_reverse(&self) -> bool {
        true
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        let date = match value {
            PropertyValue::Null => return Ok(Value::Null),
            PropertyValue::Date(date) => date,
            other => return Err(failure(&self.name, other, "expected a date")),
        };
        match &self.format {
            DateFormat::Rfc3339 => Ok(Value::String(format_rfc3339(date))),
            DateFormat::Pattern(pattern) => {
                let mut out = String::new();
                write!(out, "{}", date.with_timezone(&self.offset).format(pattern))
                    .map_err(|_| failure(&self.name, value, "invalid date format pattern"))?;
                Ok(Value::String(out))
            }
        }
    }
}

type ForwardFn =
    dyn Fn(&Value, &TransformContext<'_>) -> Result<PropertyValue, MappingError> + Send + Sync;
type ReverseFn =
    dyn Fn(&PropertyValue, &TransformContext<'_>) -> Result<Value, MappingError> + Send + Sync;

/// A transformer built from closures.
pub struct FnTransformer {
    name: String,
    forward: Box<ForwardFn>,
    reverse: Option<Box<ReverseFn>>,
}

impl FnTransformer {
    /// A transformer that only converts external values into model values.
    pub fn forward_only<F>(name: impl Into<String>, forward: F) -> Self
    where
        F: Fn(&Value, &TransformContext<'_>) -> Result<PropertyValue, MappingError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            forward: Box::new(forward),
            reverse: None,
        }
    }

    /// A transformer that converts in both directions.
    pub fn reversible<F, R>(name: impl Into<String>, forward: F, reverse: R) -> Self
    where
        F: Fn(&Value, &TransformContext<'_>) -> Result<PropertyValue, MappingError>
            + Send
            + Sync
            + 'static,
        R: Fn(&PropertyValue, &TransformContext<'_>) -> Result<Value, MappingError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            forward: Box::new(forward),
            reverse: Some(Box::new(reverse)),
        }
    }
}

impl std::fmt::Debug for FnTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransformer")
            .field("name", &self.name)
            .field("reversible", &self.reverse.is_some())
            .finish()
    }
}

impl ValueTransformer for FnTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, value: &Value, ctx: &TransformContext<'_>) -> Result<PropertyValue, MappingError> {
        (self.forward)(value, ctx)
    }

    fn allows_reverse(&self) -> bool {
        self.reverse.is_some()
    }

    fn reverse(&self, value: &PropertyValue, ctx: &TransformContext<'_>) -> Result<Value, MappingError> {
        match &self.reverse {
            Some(reverse) => reverse(value, ctx),
            None => Err(failure(&self.name, value, "reverse transformation is not supported")),
        }
    }
}
