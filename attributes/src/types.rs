//! Attribute value types and their casts.

use crate::error::SerializationError;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// The declared type of an encrypted attribute.
///
/// Values are cast when they are set and again after they are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeType {
    /// No conversion
    #[default]
    Value,
    /// Text
    String,
    /// 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// Boolean
    Boolean,
    /// Calendar date
    Date,
    /// UTC timestamp
    DateTime,
    /// JSON document
    Json,
}

const FALSE_WORDS: [&str; 6] = ["0", "f", "false", "off", "n", "no"];

impl AttributeType {
    /// Lowercase type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Json => "json",
        }
    }

    /// Convert `value` to this type.
    ///
    /// Null always casts to null. Blank text casts to null for every type
    /// except `String` and `Value`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Cast`] if the value has no sensible
    /// representation in this type.
    pub fn cast(self, value: Value) -> Result<Value, SerializationError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Value::Text(s) = &value {
            if s.trim().is_empty() && !matches!(self, Self::Value | Self::String) {
                return Ok(Value::Null);
            }
        }

        match self {
            Self::Value => Ok(value),
            Self::String => self.cast_string(value),
            Self::Integer => self.cast_integer(value),
            Self::Float => self.cast_float(value),
            Self::Boolean => self.cast_boolean(value),
            Self::Date => self.cast_date(value),
            Self::DateTime => self.cast_datetime(value),
            Self::Json => self.cast_json(value),
        }
    }

    fn mismatch(self, value: &Value) -> SerializationError {
        SerializationError::Cast {
            target: self.name(),
            found: value.kind(),
        }
    }

    fn cast_string(self, value: Value) -> Result<Value, SerializationError> {
        let text = match value {
            Value::Text(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Ip(ip) => ip.to_string(),
            Value::Date(d) => d.to_string(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            Value::Json(serde_json::Value::String(s)) => s,
            Value::Json(j) => j.to_string(),
            Value::Bytes(b) => String::from_utf8(b).map_err(|_| SerializationError::Cast {
                target: self.name(),
                found: "bytes",
            })?,
            Value::Null => return Ok(Value::Null),
        };
        Ok(Value::Text(text))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn cast_integer(self, value: Value) -> Result<Value, SerializationError> {
        let truncate = |f: f64| {
            if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Some(f.trunc() as i64)
            } else {
                None
            }
        };
        let result = match &value {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => truncate(*f),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(truncate))
            }
            Value::Json(j) => j.as_i64().or_else(|| j.as_f64().and_then(truncate)),
            _ => None,
        };
        result.map(Value::Integer).ok_or_else(|| self.mismatch(&value))
    }

    #[allow(clippy::cast_precision_loss)]
    fn cast_float(self, value: Value) -> Result<Value, SerializationError> {
        let result = match &value {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Json(j) => j.as_f64(),
            _ => None,
        };
        result.map(Value::Float).ok_or_else(|| self.mismatch(&value))
    }

    fn cast_boolean(self, value: Value) -> Result<Value, SerializationError> {
        let result = match &value {
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(s) => Some(!FALSE_WORDS.contains(&s.trim().to_ascii_lowercase().as_str())),
            Value::Json(serde_json::Value::Bool(b)) => Some(*b),
            _ => None,
        };
        result.map(Value::Bool).ok_or_else(|| self.mismatch(&value))
    }

    fn cast_date(self, value: Value) -> Result<Value, SerializationError> {
        let result = match &value {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date_naive()),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<NaiveDate>()
                    .ok()
                    .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
            }
            _ => None,
        };
        result.map(Value::Date).ok_or_else(|| self.mismatch(&value))
    }

    fn cast_datetime(self, value: Value) -> Result<Value, SerializationError> {
        let result = match &value {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0).map(|n| n.and_utc()),
            Value::Text(s) => parse_datetime(s.trim()),
            _ => None,
        };
        result.map(Value::DateTime).ok_or_else(|| self.mismatch(&value))
    }

    fn cast_json(self, value: Value) -> Result<Value, SerializationError> {
        match value {
            Value::Json(j) => Ok(Value::from(j)),
            Value::Text(s) => serde_json::from_str::<serde_json::Value>(&s)
                .map(Value::from)
                .map_err(|_| SerializationError::Cast {
                    target: self.name(),
                    found: "text",
                }),
            other => Ok(Value::from(other.to_json())),
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_casts_to_null() {
        for ty in [
            AttributeType::Value,
            AttributeType::String,
            AttributeType::Integer,
            AttributeType::Boolean,
            AttributeType::Json,
        ] {
            assert_eq!(ty.cast(Value::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_string_cast() {
        assert_eq!(AttributeType::String.cast(Value::from(42)).unwrap(), Value::from("42"));
        assert_eq!(AttributeType::String.cast(Value::from(true)).unwrap(), Value::from("true"));
        assert_eq!(AttributeType::String.cast(Value::from("")).unwrap(), Value::from(""));
    }

    #[test]
    fn test_integer_cast() {
        assert_eq!(AttributeType::Integer.cast(Value::from(" 12 ")).unwrap(), Value::from(12));
        assert_eq!(AttributeType::Integer.cast(Value::from("12.9")).unwrap(), Value::from(12));
        assert_eq!(AttributeType::Integer.cast(Value::from(3.7)).unwrap(), Value::from(3));
        assert_eq!(AttributeType::Integer.cast(Value::from("")).unwrap(), Value::Null);
        assert!(matches!(
            AttributeType::Integer.cast(Value::from("twelve")),
            Err(SerializationError::Cast { target: "integer", found: "text" })
        ));
    }

    #[test]
    fn test_boolean_cast() {
        assert_eq!(AttributeType::Boolean.cast(Value::from("false")).unwrap(), Value::from(false));
        assert_eq!(AttributeType::Boolean.cast(Value::from("0")).unwrap(), Value::from(false));
        assert_eq!(AttributeType::Boolean.cast(Value::from("yes")).unwrap(), Value::from(true));
        assert_eq!(AttributeType::Boolean.cast(Value::from(0)).unwrap(), Value::from(false));
    }

    #[test]
    fn test_date_cast() {
        let date = NaiveDate::from_ymd_opt(1984, 4, 1).unwrap();
        assert_eq!(AttributeType::Date.cast(Value::from("1984-04-01")).unwrap(), Value::from(date));
        assert_eq!(
            AttributeType::Date.cast(Value::from("1984-04-01T10:00:00Z")).unwrap(),
            Value::from(date)
        );
        assert!(AttributeType::Date.cast(Value::from("April")).is_err());
    }

    #[test]
    fn test_datetime_cast() {
        let parsed = AttributeType::DateTime
            .cast(Value::from("2020-01-15 13:54:09"))
            .unwrap();
        match parsed {
            Value::DateTime(dt) => assert_eq!(dt.to_rfc3339(), "2020-01-15T13:54:09+00:00"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_json_cast() {
        assert_eq!(
            AttributeType::Json.cast(Value::from(r#"{"a":1}"#)).unwrap(),
            Value::Json(json!({"a": 1}))
        );
        assert_eq!(AttributeType::Json.cast(Value::from(5)).unwrap(), Value::Json(json!(5)));
        assert!(AttributeType::Json.cast(Value::from("{oops")).is_err());
    }
}
