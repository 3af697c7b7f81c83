//! Error types for policy definition and the attribute lifecycle.

use thiserror::Error;
use vault_transit::CryptoServiceError;

/// Invalid attribute options, raised while the registry is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Both a serializer and an encode/decode pair were given
    #[error("{attribute}: cannot use a custom encode/decode pair together with a serializer")]
    ConflictingSerializer {
        /// Attribute being defined
        attribute: String,
    },

    /// Only one half of an encode/decode pair was given
    #[error("{attribute}: `{missing}` must be given together with its counterpart")]
    IncompleteCodec {
        /// Attribute being defined
        attribute: String,
        /// The half that is missing
        missing: &'static str,
    },

    /// An option value is unusable
    #[error("{attribute}: {reason}")]
    InvalidOption {
        /// Attribute being defined
        attribute: String,
        /// What is wrong with it
        reason: String,
    },

    /// An entity type was reopened with a different table after its
    /// attributes derived their default keys
    #[error("{entity} is stored in {table}, cannot move it to {requested}")]
    TableChanged {
        /// Entity type
        entity: String,
        /// Table the attributes were defined against
        table: String,
        /// Table passed on reopening
        requested: String,
    },

    /// No policies were registered for the entity type
    #[error("unknown entity type {0}")]
    UnknownEntity(String),

    /// The entity type has no attribute of that name
    #[error("{entity} has no encrypted attribute {attribute}")]
    UnknownAttribute {
        /// Entity type
        entity: String,
        /// Requested attribute
        attribute: String,
    },
}

/// Encode, decode or cast failures. Plaintext is never included.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// A value could not be converted to the attribute's type
    #[error("cannot cast {found} to {target}")]
    Cast {
        /// Target attribute type
        target: &'static str,
        /// Kind of the offending value
        found: &'static str,
    },

    /// A serializer rejected a value on the way out
    #[error("{serializer} serializer cannot encode: {reason}")]
    Encode {
        /// Serializer name
        serializer: &'static str,
        /// Failure description
        reason: String,
    },

    /// A serializer rejected plaintext on the way in
    #[error("{serializer} serializer cannot decode: {reason}")]
    Decode {
        /// Serializer name
        serializer: &'static str,
        /// Failure description
        reason: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerializationError {
    /// Create an encode error.
    #[must_use]
    pub fn encode(serializer: &'static str, reason: impl Into<String>) -> Self {
        Self::Encode {
            serializer,
            reason: reason.into(),
        }
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(serializer: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            serializer,
            reason: reason.into(),
        }
    }
}

/// Failures reported by a record store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The row does not exist
    #[error("{table}#{id} not found")]
    NotFound {
        /// Table name
        table: String,
        /// Row id
        id: u64,
    },

    /// The store refused or failed the write; nothing was persisted
    #[error("save rejected: {0}")]
    Rejected(String),

    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Umbrella error for record operations.
#[derive(Error, Debug)]
pub enum RecordError {
    /// Invalid definition
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The crypto service failed
    #[error("crypto service error: {0}")]
    CryptoService(#[from] CryptoServiceError),

    /// Encode/decode/cast failure
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The record's entity has no such attribute or proxy
    #[error("{entity} has no attribute {attribute}")]
    UnknownAttribute {
        /// Entity type
        entity: String,
        /// Requested attribute
        attribute: String,
    },

    /// The operation needs a persisted record
    #[error("{0} record has not been saved yet")]
    NotPersisted(String),
}

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

impl RecordError {
    /// Create an unknown attribute error.
    #[must_use]
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Whether the failure came from the crypto service.
    #[must_use]
    pub const fn is_crypto_service(&self) -> bool {
        matches!(self, Self::CryptoService(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_transit::TransitError;

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::ConflictingSerializer {
            attribute: "details".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "details: cannot use a custom encode/decode pair together with a serializer"
        );
    }

    #[test]
    fn test_cast_error_has_no_value() {
        let err = SerializationError::Cast {
            target: "integer",
            found: "text",
        };
        assert_eq!(err.to_string(), "cannot cast text to integer");
    }

    #[test]
    fn test_crypto_error_conversion() {
        let err: RecordError = TransitError::RateLimited.into();
        assert!(err.is_crypto_service());
        assert!(matches!(err, RecordError::CryptoService(TransitError::RateLimited)));
    }
}
