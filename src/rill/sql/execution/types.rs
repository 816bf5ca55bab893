//! Dynamic values flowing through the evaluator and the row model.

use chrono::{DateTime, TimeZone, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Immutable key/value mapping carried by an event.
pub type Message = HashMap<String, FieldValue>;

/// Immutable metadata mapping carried by an event (topic, headers, ...).
pub type Metadata = HashMap<String, FieldValue>;

/// A value in a row or the result of evaluating an expression
///
/// Integers keep their signedness; mixed numeric operands are coerced by the operators
/// module. Evaluation failures are values too: [`FieldValue::Error`] propagates through
/// every composite expression unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// SQL NULL, also the result of a missing key
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit unsigned integer
    UInteger(u64),
    /// 64-bit floating point number
    Float(f64),
    Boolean(bool),
    String(String),
    /// Point in time, UTC
    Timestamp(DateTime<Utc>),
    /// Raw bytes from binary-format streams
    Bytes(Vec<u8>),
    Array(Vec<FieldValue>),
    /// Nested string-keyed mapping
    Map(HashMap<String, FieldValue>),
    /// Evaluation error carried as a value
    Error(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::UInteger(u) => write!(f, "{}", u),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            FieldValue::Bytes(b) => write!(f, "{:?}", b),
            FieldValue::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            FieldValue::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, map[*k])?;
                }
                write!(f, "}}")
            }
            FieldValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Serialized the way sinks expect: timestamps as epoch milliseconds, errors as strings.
impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::UInteger(u) => serializer.serialize_u64(*u),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Timestamp(t) => serializer.serialize_i64(t.timestamp_millis()),
            FieldValue::Bytes(b) => serializer.serialize_bytes(b),
            FieldValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for elem in arr {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            }
            FieldValue::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            FieldValue::Error(e) => serializer.serialize_str(e),
        }
    }
}

impl FieldValue {
    /// Type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Integer(_) => "int64",
            FieldValue::UInteger(_) => "uint64",
            FieldValue::Float(_) => "float64",
            FieldValue::Boolean(_) => "bool",
            FieldValue::String(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
            FieldValue::Error(_) => "error",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FieldValue::Error(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldValue::Integer(_) | FieldValue::UInteger(_) | FieldValue::Float(_)
        )
    }

    pub fn error(message: impl Into<String>) -> FieldValue {
        FieldValue::Error(message.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of numeric values. Floats must be whole numbers.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::UInteger(u) => i64::try_from(*u).ok(),
            FieldValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::UInteger(u) => Some(*u as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Build from a decoded JSON document. Integers that fit `i64` stay integers.
    pub fn from_json(value: &serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::UInteger(u)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => FieldValue::String(s.clone()),
            serde_json::Value::Array(arr) => {
                FieldValue::Array(arr.iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Object(obj) => FieldValue::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Integer(i) => serde_json::Value::Number((*i).into()),
            FieldValue::UInteger(u) => serde_json::Value::Number((*u).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Boolean(b) => serde_json::Value::Bool(*b),
            FieldValue::String(s) | FieldValue::Error(s) => serde_json::Value::String(s.clone()),
            FieldValue::Timestamp(t) => serde_json::Value::Number(t.timestamp_millis().into()),
            FieldValue::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|x| serde_json::Value::Number((*x).into())).collect(),
            ),
            FieldValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(|v| v.to_json()).collect())
            }
            FieldValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Timestamp from epoch milliseconds.
    pub fn timestamp_millis(ms: i64) -> FieldValue {
        match Utc.timestamp_millis_opt(ms).single() {
            Some(t) => FieldValue::Timestamp(t),
            None => FieldValue::error(format!("invalid timestamp {}", ms)),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// Build a [`Message`] from a JSON object. Non-object documents give an empty message.
pub fn message_from_json(value: &serde_json::Value) -> Message {
    match FieldValue::from_json(value) {
        FieldValue::Map(m) => m,
        _ => Message::new(),
    }
}
