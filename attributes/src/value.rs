//! Dynamically typed attribute values.

use chrono::{DateTime, NaiveDate, Utc};
use std::net::IpAddr;

/// A plaintext attribute value or a raw column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// UTF-8 text; ciphertext columns always hold this variant
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// IP address
    Ip(IpAddr),
    /// Calendar date
    Date(NaiveDate),
    /// Timestamp
    DateTime(DateTime<Utc>),
    /// Structured document
    Json(serde_json::Value),
}

impl Value {
    /// Whether the value is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value carries something meaningful.
    ///
    /// Null, `false`, empty or whitespace-only text, and empty bytes or
    /// documents are blank.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Null | Self::Bool(false) => false,
            Self::Text(s) => !s.trim().is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::Json(serde_json::Value::Null) => false,
            Self::Json(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Self::Json(serde_json::Value::Array(a)) => !a.is_empty(),
            Self::Json(serde_json::Value::Object(o)) => !o.is_empty(),
            _ => true,
        }
    }

    /// Borrow the text, if this is [`Value::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is [`Value::Integer`].
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Ip(_) => "ip address",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Json(_) => "json",
        }
    }

    /// Convert into a JSON document.
    ///
    /// Bytes become an array of numbers; non-finite floats become null.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Self::Null => J::Null,
            Self::Bool(b) => J::Bool(*b),
            Self::Integer(i) => J::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            Self::Text(s) => J::String(s.clone()),
            Self::Bytes(b) => J::from(b.clone()),
            Self::Ip(ip) => J::String(ip.to_string()),
            Self::Date(d) => J::String(d.to_string()),
            Self::DateTime(dt) => J::String(dt.to_rfc3339()),
            Self::Json(j) => j.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<IpAddr> for Value {
    fn from(value: IpAddr) -> Self {
        Self::Ip(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<serde_json::Value> for Value {
    /// JSON `null` maps to [`Value::Null`]; everything else stays a document.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            other => Self::Json(other),
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
