//! Conversion between attribute values and the plaintext handed to Vault.
//!
//! Built-in serializers short-circuit absent plaintext to [`Value::Null`]
//! before any decoding runs. Custom encode/decode pairs see the absent
//! value and decide for themselves.

use crate::error::SerializationError;
use crate::value::Value;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Encode/decode between a domain value and its plaintext string.
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Short name used in errors.
    fn name(&self) -> &'static str;

    /// Produce the plaintext for `value`; `None` stands for an absent value.
    ///
    /// # Errors
    ///
    /// Returns a [`SerializationError`] if the value cannot be represented.
    fn encode(&self, value: &Value) -> Result<Option<String>, SerializationError>;

    /// Rebuild a value from decrypted plaintext.
    ///
    /// # Errors
    ///
    /// Returns a [`SerializationError`] if the plaintext is malformed.
    fn decode(&self, plaintext: Option<&str>) -> Result<Value, SerializationError>;
}

/// Passes text through unchanged; other values use their textual form.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySerializer;

impl Serializer for IdentitySerializer {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, value: &Value) -> Result<Option<String>, SerializationError> {
        match value {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map(Some)
                .map_err(|_| SerializationError::encode(self.name(), "bytes are not valid UTF-8")),
            Value::Json(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Value::Json(j) => Ok(Some(j.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Integer(i) => Ok(Some(i.to_string())),
            Value::Float(f) => Ok(Some(f.to_string())),
            Value::Ip(ip) => Ok(Some(ip.to_string())),
            Value::Date(d) => Ok(Some(d.to_string())),
            Value::DateTime(dt) => Ok(Some(dt.to_rfc3339())),
        }
    }

    fn decode(&self, plaintext: Option<&str>) -> Result<Value, SerializationError> {
        Ok(plaintext.map_or(Value::Null, Value::from))
    }
}

/// Structured text: [`Value::Json`] documents stored as JSON.
///
/// Other variants are rejected, since decoding only ever yields documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Option<String>, SerializationError> {
        match value {
            Value::Null | Value::Json(serde_json::Value::Null) => Ok(None),
            Value::Json(document) => Ok(Some(serde_json::to_string(document)?)),
            other => Err(SerializationError::encode(
                self.name(),
                format!("expected a json document, found {}", other.kind()),
            )),
        }
    }

    fn decode(&self, plaintext: Option<&str>) -> Result<Value, SerializationError> {
        let Some(plaintext) = plaintext else {
            return Ok(Value::Null);
        };
        let document: serde_json::Value = serde_json::from_str(plaintext)?;
        Ok(Value::from(document))
    }
}

/// Binary framing: bytes are stored as standard base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn encode(&self, value: &Value) -> Result<Option<String>, SerializationError> {
        match value {
            Value::Null => Ok(None),
            Value::Bytes(b) => Ok(Some(BASE64.encode(b))),
            other => Err(SerializationError::encode(
                self.name(),
                format!("expected bytes, found {}", other.kind()),
            )),
        }
    }

    fn decode(&self, plaintext: Option<&str>) -> Result<Value, SerializationError> {
        let Some(plaintext) = plaintext else {
            return Ok(Value::Null);
        };
        BASE64
            .decode(plaintext)
            .map(Value::Bytes)
            .map_err(|e| SerializationError::decode(self.name(), e.to_string()))
    }
}

/// IP addresses in their canonical textual form.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpAddrSerializer;

impl Serializer for IpAddrSerializer {
    fn name(&self) -> &'static str {
        "ipaddr"
    }

    fn encode(&self, value: &Value) -> Result<Option<String>, SerializationError> {
        match value {
            Value::Null => Ok(None),
            Value::Ip(ip) => Ok(Some(ip.to_string())),
            Value::Text(s) => s
                .trim()
                .parse::<IpAddr>()
                .map(|ip| Some(ip.to_string()))
                .map_err(|e| SerializationError::encode(self.name(), e.to_string())),
            other => Err(SerializationError::encode(
                self.name(),
                format!("expected an IP address, found {}", other.kind()),
            )),
        }
    }

    fn decode(&self, plaintext: Option<&str>) -> Result<Value, SerializationError> {
        let Some(plaintext) = plaintext else {
            return Ok(Value::Null);
        };
        plaintext
            .parse::<IpAddr>()
            .map(Value::Ip)
            .map_err(|e| SerializationError::decode(self.name(), e.to_string()))
    }
}

/// Caller-supplied encode function.
pub type EncodeFn = Arc<dyn Fn(&Value) -> Result<Option<String>, SerializationError> + Send + Sync>;

/// Caller-supplied decode function. It receives absent plaintext as `None`.
pub type DecodeFn = Arc<dyn Fn(Option<&str>) -> Result<Value, SerializationError> + Send + Sync>;

/// A matched encode/decode pair.
#[derive(Clone)]
pub struct CustomSerializer {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl CustomSerializer {
    /// Pair an encode and a decode function.
    #[must_use]
    pub fn new(encode: EncodeFn, decode: DecodeFn) -> Self {
        Self { encode, decode }
    }

    /// Pair two plain functions or closures.
    #[must_use]
    pub fn from_fns<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&Value) -> Result<Option<String>, SerializationError> + Send + Sync + 'static,
        D: Fn(Option<&str>) -> Result<Value, SerializationError> + Send + Sync + 'static,
    {
        Self::new(Arc::new(encode), Arc::new(decode))
    }
}

impl fmt::Debug for CustomSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomSerializer").finish_non_exhaustive()
    }
}

impl Serializer for CustomSerializer {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn encode(&self, value: &Value) -> Result<Option<String>, SerializationError> {
        (self.encode)(value)
    }

    fn decode(&self, plaintext: Option<&str>) -> Result<Value, SerializationError> {
        (self.decode)(plaintext)
    }
}

/// Serializer selection for an attribute.
#[derive(Debug, Clone)]
pub enum SerializerKind {
    /// [`JsonSerializer`]
    Json,
    /// [`BinarySerializer`]
    Binary,
    /// [`IpAddrSerializer`]
    IpAddr,
    /// Any other implementation
    Custom(Arc<dyn Serializer>),
}

impl SerializerKind {
    /// Instantiate the selected serializer.
    #[must_use]
    pub fn resolve(self) -> Arc<dyn Serializer> {
        match self {
            Self::Json => Arc::new(JsonSerializer),
            Self::Binary => Arc::new(BinarySerializer),
            Self::IpAddr => Arc::new(IpAddrSerializer),
            Self::Custom(serializer) => serializer,
        }
    }
}
