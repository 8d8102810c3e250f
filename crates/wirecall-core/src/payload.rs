//! Request bodies and response payloads.
//!
//! Requests carry plain JSON. Responses are JSON text shaped `{"result": ...}`
//! whose strings may encode values JSON has no type for. The default
//! [`StructuredDeserializer`] revives ISO-8601 timestamps into
//! [`RemoteValue::DateTime`]; everything else maps one-to-one onto JSON.

use crate::error::{Result, WirecallError};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A deserialized response value.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    DateTime(DateTime<Utc>),
    Array(Vec<RemoteValue>),
    Object(BTreeMap<String, RemoteValue>),
}

impl RemoteValue {
    /// Convert back to JSON. Timestamps render as RFC 3339 with milliseconds.
    pub fn to_json(&self) -> Value {
        match self {
            RemoteValue::Null => Value::Null,
            RemoteValue::Bool(b) => Value::Bool(*b),
            RemoteValue::Number(n) => Value::Number(n.clone()),
            RemoteValue::String(s) => Value::String(s.clone()),
            RemoteValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            RemoteValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            RemoteValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    /// Field lookup on objects.
    pub fn get(&self, key: &str) -> Option<&RemoteValue> {
        match self {
            RemoteValue::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RemoteValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            RemoteValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RemoteValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RemoteValue::Null)
    }
}

impl Serialize for RemoteValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Deserialized `{result}` envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    /// `None` when the payload carried no `result` field.
    pub result: Option<RemoteValue>,
}

/// Turns response text into an [`Envelope`].
pub trait PayloadDeserializer: Send + Sync {
    fn deserialize(&self, text: &str) -> Result<Envelope>;
}

/// JSON with ISO-8601 timestamp revival.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDeserializer;

impl StructuredDeserializer {
    pub fn new() -> Self {
        Self
    }

    /// Convert a JSON value, reviving timestamp strings.
    pub fn revive(value: Value) -> RemoteValue {
        match value {
            Value::Null => RemoteValue::Null,
            Value::Bool(b) => RemoteValue::Bool(b),
            Value::Number(n) => RemoteValue::Number(n),
            Value::String(s) => match parse_timestamp(&s) {
                Some(dt) => RemoteValue::DateTime(dt),
                None => RemoteValue::String(s),
            },
            Value::Array(items) => RemoteValue::Array(items.into_iter().map(Self::revive).collect()),
            Value::Object(fields) => RemoteValue::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Self::revive(v)))
                    .collect(),
            ),
        }
    }
}

impl PayloadDeserializer for StructuredDeserializer {
    fn deserialize(&self, text: &str) -> Result<Envelope> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Object(mut fields) => Ok(Envelope {
                result: fields.remove("result").map(Self::revive),
            }),
            Value::Null => Err(WirecallError::Payload {
                message: "payload is null".to_string(),
            }),
            // Scalars and arrays have no `result` field
            _ => Ok(Envelope::default()),
        }
    }
}

/// ISO-8601 date-time with optional fraction and offset.
static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d*)?(?:Z|[+-]\d{2}:?\d{2})?$").unwrap()
});

/// Parse an ISO-8601 timestamp. Strings without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if !ISO_TIMESTAMP.is_match(s) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serialize call params to the request body text.
///
/// Falsy params (`null`, `false`, `0`, `""`) are sent as `{}`.
pub fn serialize_params(params: &Value) -> Result<String> {
    if is_falsy(params) {
        return Ok("{}".to_string());
    }
    Ok(serde_json::to_string(params)?)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
