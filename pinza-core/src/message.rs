//! # Message Envelopes
//!
//! A [`MessageEnvelope`] is a live instance of a registered [`MessageType`]: a mapping from
//! field name to [`FieldValue`], where nested messages are envelopes themselves.
//!
//! Envelopes are built from plain JSON values, validated against their type on the way in,
//! and turned back into plain values with [`MessageEnvelope::as_structural_view`].
//!
//! ## Structural view conventions
//!
//! * `bytes` fields are base64 strings.
//! * 64-bit integers are JSON numbers (strings are accepted on input).
//! * Non-finite floats are the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
//! * Absent fields and empty repeated fields are omitted.
mod codec;

pub use codec::*;

use crate::{
    registry::Registry,
    schema::{FieldDef, FieldKind, MessageType},
};
use base64::{Engine, engine::general_purpose};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, sync::Arc};

/// The value of one field of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Message(MessageEnvelope),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Renders a scalar as a path or query parameter. Messages and lists have no
    /// parameter form.
    pub fn as_param(&self) -> Option<String> {
        match self {
            FieldValue::Bool(v) => Some(v.to_string()),
            FieldValue::Int(v) => Some(v.to_string()),
            FieldValue::Uint(v) => Some(v.to_string()),
            FieldValue::Float(v) => Some(v.to_string()),
            FieldValue::String(v) => Some(v.clone()),
            FieldValue::Bytes(v) => Some(general_purpose::STANDARD.encode(v)),
            FieldValue::Message(_) | FieldValue::List(_) => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            FieldValue::Bool(v) => Value::Bool(*v),
            FieldValue::Int(v) => Value::from(*v),
            FieldValue::Uint(v) => Value::from(*v),
            FieldValue::Float(v) => match serde_json::Number::from_f64(*v) {
                Some(number) => Value::Number(number),
                None if v.is_nan() => Value::String("NaN".to_string()),
                None if v.is_sign_positive() => Value::String("Infinity".to_string()),
                None => Value::String("-Infinity".to_string()),
            },
            FieldValue::String(v) => Value::String(v.clone()),
            FieldValue::Bytes(v) => Value::String(general_purpose::STANDARD.encode(v)),
            FieldValue::Message(v) => v.as_structural_view(),
            FieldValue::List(values) => Value::Array(values.iter().map(Self::to_value).collect()),
        }
    }
}

/// A value does not fit the shape of its message type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} (at '{path}')")]
pub struct ShapeError {
    pub path: String,
    pub reason: String,
}

impl ShapeError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// How strictly a plain value is checked against its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Unknown fields are rejected. Used for caller-supplied requests.
    Strict,
    /// Unknown fields are ignored. Used for server responses.
    Lenient,
}

/// An instance of a [`MessageType`].
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    message_type: Arc<MessageType>,
    fields: BTreeMap<String, FieldValue>,
}

impl MessageEnvelope {
    /// An envelope with no field set.
    pub fn empty(message_type: Arc<MessageType>) -> Self {
        Self {
            message_type,
            fields: BTreeMap::new(),
        }
    }

    /// Builds an envelope from a plain JSON object, validating it against `message_type`.
    ///
    /// Nested message types are resolved through `registry`. Missing required fields and
    /// values of the wrong kind are always rejected; unknown fields only under
    /// [`Strictness::Strict`].
    pub fn from_value(
        message_type: Arc<MessageType>,
        value: &Value,
        registry: &Registry,
        strictness: Strictness,
    ) -> Result<Self, ShapeError> {
        build(message_type, value, registry, strictness, "$")
    }

    pub fn message_type(&self) -> &Arc<MessageType> {
        &self.message_type
    }

    /// The fully qualified name of the envelope's type.
    pub fn type_name(&self) -> &str {
        self.message_type.name()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Iterates over the set fields, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Produces a plain, acyclic snapshot of the envelope, independent of its lifetime.
    pub fn as_structural_view(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_value()))
                .collect::<Map<_, _>>(),
        )
    }
}

fn build(
    message_type: Arc<MessageType>,
    value: &Value,
    registry: &Registry,
    strictness: Strictness,
    path: &str,
) -> Result<MessageEnvelope, ShapeError> {
    let object = value.as_object().ok_or_else(|| {
        ShapeError::new(
            path,
            format!("expected an object for message '{}'", message_type.name()),
        )
    })?;

    if strictness == Strictness::Strict
        && let Some(unknown) = object.keys().find(|key| message_type.field(key).is_none())
    {
        return Err(ShapeError::new(
            path,
            format!(
                "unknown field '{unknown}' for message '{}'",
                message_type.name()
            ),
        ));
    }

    let mut fields = BTreeMap::new();

    for field in message_type.fields() {
        let field_path = format!("{path}.{}", field.name());

        match object.get(field.name()) {
            None | Some(Value::Null) => {
                if field.is_required() {
                    return Err(ShapeError::new(&field_path, "missing required field"));
                }
            }
            Some(raw) if field.is_repeated() => {
                let items = raw
                    .as_array()
                    .ok_or_else(|| ShapeError::new(&field_path, "expected an array"))?;

                if items.is_empty() {
                    continue;
                }

                let values = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        convert(field, item, registry, strictness, &format!("{field_path}[{i}]"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                fields.insert(field.name().to_string(), FieldValue::List(values));
            }
            Some(raw) => {
                let value = convert(field, raw, registry, strictness, &field_path)?;
                fields.insert(field.name().to_string(), value);
            }
        }
    }

    Ok(MessageEnvelope {
        message_type,
        fields,
    })
}

fn convert(
    field: &FieldDef,
    value: &Value,
    registry: &Registry,
    strictness: Strictness,
    path: &str,
) -> Result<FieldValue, ShapeError> {
    let mismatch = |expected: &str| ShapeError::new(path, format!("expected {expected}"));

    match field.kind() {
        FieldKind::Bool => value.as_bool().map(FieldValue::Bool).ok_or_else(|| mismatch("a bool")),
        FieldKind::Int32 => integer(value)
            .filter(|v| i32::try_from(*v).is_ok())
            .map(FieldValue::Int)
            .ok_or_else(|| mismatch("a 32-bit integer")),
        FieldKind::Int64 => integer(value)
            .map(FieldValue::Int)
            .ok_or_else(|| mismatch("a 64-bit integer")),
        FieldKind::Uint32 => unsigned(value)
            .filter(|v| u32::try_from(*v).is_ok())
            .map(FieldValue::Uint)
            .ok_or_else(|| mismatch("an unsigned 32-bit integer")),
        FieldKind::Uint64 => unsigned(value)
            .map(FieldValue::Uint)
            .ok_or_else(|| mismatch("an unsigned 64-bit integer")),
        FieldKind::Float | FieldKind::Double => float(value)
            .map(FieldValue::Float)
            .ok_or_else(|| mismatch("a number")),
        FieldKind::String => value
            .as_str()
            .map(|s| FieldValue::String(s.to_string()))
            .ok_or_else(|| mismatch("a string")),
        FieldKind::Bytes => value
            .as_str()
            .and_then(decode_base64)
            .map(FieldValue::Bytes)
            .ok_or_else(|| mismatch("a base64 string")),
        FieldKind::Enum => match value {
            Value::String(name) => Ok(FieldValue::String(name.clone())),
            other => integer(other)
                .map(FieldValue::Int)
                .ok_or_else(|| mismatch("an enum name or number")),
        },
        FieldKind::Message(name) => {
            let nested = registry.lookup_message(name).map_err(|_| {
                ShapeError::new(path, format!("message type '{name}' is not registered"))
            })?;
            build(nested, value, registry, strictness, path).map(FieldValue::Message)
        }
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        },
        _ => None,
    }
}

fn decode_base64(value: &str) -> Option<Vec<u8>> {
    [
        general_purpose::STANDARD,
        general_purpose::STANDARD_NO_PAD,
        general_purpose::URL_SAFE,
        general_purpose::URL_SAFE_NO_PAD,
    ]
    .iter()
    .find_map(|engine| engine.decode(value).ok())
}
