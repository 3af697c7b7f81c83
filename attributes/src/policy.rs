//! Encryption policies and the registry that holds them.
//!
//! Policies are collected through a [`RegistryBuilder`] while entity types
//! are defined and frozen into a [`PolicyRegistry`] afterwards. Invalid
//! options fail at definition time, so a misconfigured application never
//! starts.

use crate::error::{ConfigurationError, SerializationError};
use crate::serializer::{
    CustomSerializer, DecodeFn, EncodeFn, IdentitySerializer, Serializer, SerializerKind,
};
use crate::types::AttributeType;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Default transit mount.
pub const DEFAULT_PATH: &str = "transit";

/// Default key id for an attribute: `<app>_<table>_<attribute>`.
#[must_use]
pub fn default_key_id(app: &str, table: &str, attribute: &str) -> String {
    format!("{app}_{table}_{attribute}")
}

/// Default ciphertext column for an attribute: `<attribute>_encrypted`.
#[must_use]
pub fn default_encrypted_column(attribute: &str) -> String {
    format!("{attribute}_encrypted")
}

/// Second ciphertext written with another key on every save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCopy {
    /// Column receiving the copy
    pub column: String,
    /// Key used for the copy
    pub key: String,
}

/// Options accepted when defining an encrypted attribute.
#[derive(Clone, Default)]
pub struct AttributeOptions {
    encrypted_column: Option<String>,
    path: Option<String>,
    key: Option<String>,
    convergent: bool,
    serializer: Option<SerializerKind>,
    encode: Option<EncodeFn>,
    decode: Option<DecodeFn>,
    attr_type: AttributeType,
    encrypted_copy: Option<EncryptedCopy>,
}

impl fmt::Debug for AttributeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeOptions")
            .field("encrypted_column", &self.encrypted_column)
            .field("path", &self.path)
            .field("key", &self.key)
            .field("convergent", &self.convergent)
            .field("serializer", &self.serializer)
            .field("encode", &self.encode.is_some())
            .field("decode", &self.decode.is_some())
            .field("attr_type", &self.attr_type)
            .field("encrypted_copy", &self.encrypted_copy)
            .finish()
    }
}

impl AttributeOptions {
    /// Options with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store ciphertext in `column` instead of `<name>_encrypted`.
    #[must_use]
    pub fn encrypted_column(mut self, column: impl Into<String>) -> Self {
        self.encrypted_column = Some(column.into());
        self
    }

    /// Use the transit mount at `path`.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use `key` instead of the derived key id.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Produce deterministic ciphertext.
    #[must_use]
    pub const fn convergent(mut self, convergent: bool) -> Self {
        self.convergent = convergent;
        self
    }

    /// Select a serializer.
    #[must_use]
    pub fn serializer(mut self, serializer: SerializerKind) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Supply the encode half of a custom pair.
    #[must_use]
    pub fn encode<F>(mut self, encode: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<String>, SerializationError> + Send + Sync + 'static,
    {
        self.encode = Some(Arc::new(encode));
        self
    }

    /// Supply the decode half of a custom pair.
    #[must_use]
    pub fn decode<F>(mut self, decode: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<Value, SerializationError> + Send + Sync + 'static,
    {
        self.decode = Some(Arc::new(decode));
        self
    }

    /// Declare the attribute's value type.
    #[must_use]
    pub const fn attr_type(mut self, attr_type: AttributeType) -> Self {
        self.attr_type = attr_type;
        self
    }

    /// Also encrypt every saved value with `key` into `column`.
    #[must_use]
    pub fn encrypted_copy(mut self, column: impl Into<String>, key: impl Into<String>) -> Self {
        self.encrypted_copy = Some(EncryptedCopy {
            column: column.into(),
            key: key.into(),
        });
        self
    }
}

/// Resolved encryption configuration of one attribute.
#[derive(Debug, Clone)]
pub struct AttributePolicy {
    /// Logical attribute name
    pub name: String,
    /// Physical ciphertext column
    pub encrypted_column: String,
    /// Transit mount
    pub path: String,
    /// Key id
    pub key: String,
    /// Deterministic ciphertext
    pub convergent: bool,
    /// Value <-> plaintext conversion
    pub serializer: Arc<dyn Serializer>,
    /// Declared value type
    pub attr_type: AttributeType,
    /// Optional second ciphertext
    pub encrypted_copy: Option<EncryptedCopy>,
}

impl AttributePolicy {
    /// Validate `options` and compute defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if a serializer is combined with an
    /// encode/decode pair, only half of a pair is given, or a name is empty.
    pub fn resolve(
        app: &str,
        table: &str,
        name: &str,
        options: AttributeOptions,
    ) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidOption {
            attribute: name.to_string(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("attribute name is empty"));
        }
        if options.serializer.is_some() && (options.encode.is_some() || options.decode.is_some()) {
            return Err(ConfigurationError::ConflictingSerializer {
                attribute: name.to_string(),
            });
        }

        let serializer: Arc<dyn Serializer> = match (options.serializer, options.encode, options.decode) {
            (Some(kind), None, None) => kind.resolve(),
            (None, Some(encode), Some(decode)) => Arc::new(CustomSerializer::new(encode, decode)),
            (None, Some(_), None) => {
                return Err(ConfigurationError::IncompleteCodec {
                    attribute: name.to_string(),
                    missing: "decode",
                });
            }
            (None, None, Some(_)) => {
                return Err(ConfigurationError::IncompleteCodec {
                    attribute: name.to_string(),
                    missing: "encode",
                });
            }
            _ => Arc::new(IdentitySerializer),
        };

        let encrypted_column = options
            .encrypted_column
            .unwrap_or_else(|| default_encrypted_column(name));
        if encrypted_column == name {
            return Err(invalid("the ciphertext column cannot share the attribute's name"));
        }
        if let Some(copy) = &options.encrypted_copy {
            if copy.column == encrypted_column || copy.column == name {
                return Err(invalid("the encrypted copy needs its own column"));
            }
        }

        Ok(Self {
            name: name.to_string(),
            encrypted_column,
            path: options.path.unwrap_or_else(|| DEFAULT_PATH.to_string()),
            key: options
                .key
                .unwrap_or_else(|| default_key_id(app, table, name)),
            convergent: options.convergent,
            serializer,
            attr_type: options.attr_type,
            encrypted_copy: options.encrypted_copy,
        })
    }
}

/// How a legacy proxy reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyOptions {
    /// Ignore the legacy column entirely
    pub encrypted_only: bool,
    /// Cast applied to written values
    pub cast: AttributeType,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            encrypted_only: false,
            cast: AttributeType::String,
        }
    }
}

/// A legacy plaintext column fronting an encrypted attribute.
#[derive(Debug, Clone)]
pub struct ProxyPolicy {
    /// Logical name the application uses
    pub name: String,
    /// Plaintext column being phased out
    pub legacy_column: String,
    /// Encrypted attribute that replaces it
    pub encrypted_attribute: String,
    /// Read/write behaviour
    pub options: ProxyOptions,
}

/// Strongly resolved handle to one attribute of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    entity: String,
    name: String,
    index: usize,
}

impl Accessor {
    /// Attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity type the handle belongs to.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) const fn index(&self) -> usize {
        self.index
    }
}

/// All encryption policies of one entity type, in definition order.
#[derive(Debug, Clone)]
pub struct EntityPolicySet {
    entity: String,
    table: String,
    attributes: Vec<AttributePolicy>,
    proxies: Vec<ProxyPolicy>,
    lazy_decrypt: bool,
}

impl EntityPolicySet {
    fn new(entity: &str, table: &str) -> Self {
        Self {
            entity: entity.to_string(),
            table: table.to_string(),
            attributes: Vec::new(),
            proxies: Vec::new(),
            lazy_decrypt: false,
        }
    }

    /// Entity type name.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Backing table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Policies in definition order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributePolicy] {
        &self.attributes
    }

    /// Whether decryption waits for the first read.
    #[must_use]
    pub const fn lazy_decrypt(&self) -> bool {
        self.lazy_decrypt
    }

    /// Policy for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributePolicy> {
        self.attributes.iter().find(|p| p.name == name)
    }

    /// Position of `name` in definition order.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|p| p.name == name)
    }

    /// Proxy declared as `name`.
    #[must_use]
    pub fn proxy(&self, name: &str) -> Option<&ProxyPolicy> {
        self.proxies.iter().find(|p| p.name == name)
    }

    /// Declared proxies.
    #[must_use]
    pub fn proxies(&self) -> &[ProxyPolicy] {
        &self.proxies
    }

    /// Resolve `name` once into an index-based handle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownAttribute`] if no such attribute
    /// is defined.
    pub fn accessor(&self, name: &str) -> Result<Accessor, ConfigurationError> {
        self.index_of(name)
            .map(|index| Accessor {
                entity: self.entity.clone(),
                name: name.to_string(),
                index,
            })
            .ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> ConfigurationError {
        ConfigurationError::UnknownAttribute {
            entity: self.entity.clone(),
            attribute: name.to_string(),
        }
    }

    fn upsert(&mut self, policy: AttributePolicy) {
        match self.attributes.iter_mut().find(|p| p.name == policy.name) {
            Some(existing) => *existing = policy,
            None => self.attributes.push(policy),
        }
    }
}

/// Collects policies while entity types are defined.
#[derive(Debug)]
pub struct RegistryBuilder {
    app: String,
    entities: BTreeMap<String, EntityPolicySet>,
}

impl RegistryBuilder {
    /// Start a registry for application `app`, used in default key ids.
    #[must_use]
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            entities: BTreeMap::new(),
        }
    }

    /// Declare (or reopen) an entity type stored in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::TableChanged`] when the entity already
    /// has attributes whose default keys were derived from another table.
    pub fn entity(&mut self, entity: &str, table: &str) -> Result<EntityBuilder<'_>, ConfigurationError> {
        let set = self
            .entities
            .entry(entity.to_string())
            .or_insert_with(|| EntityPolicySet::new(entity, table));
        if set.table != table {
            if !set.attributes.is_empty() {
                return Err(ConfigurationError::TableChanged {
                    entity: entity.to_string(),
                    table: set.table.clone(),
                    requested: table.to_string(),
                });
            }
            set.table = table.to_string();
        }
        Ok(EntityBuilder {
            app: &self.app,
            set,
        })
    }

    /// Define one encrypted attribute.
    ///
    /// An entity type that was not declared through [`Self::entity`] uses
    /// its own name as table name. Redefining an attribute replaces its
    /// policy in place.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for invalid options.
    pub fn define(
        &mut self,
        entity: &str,
        attribute: &str,
        options: AttributeOptions,
    ) -> Result<AttributePolicy, ConfigurationError> {
        let set = self
            .entities
            .entry(entity.to_string())
            .or_insert_with(|| EntityPolicySet::new(entity, entity));
        let policy = AttributePolicy::resolve(&self.app, &set.table, attribute, options)?;
        set.upsert(policy.clone());
        Ok(policy)
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> PolicyRegistry {
        PolicyRegistry {
            app: self.app,
            entities: self
                .entities
                .into_iter()
                .map(|(name, set)| (name, Arc::new(set)))
                .collect(),
        }
    }
}

/// Definition scope for one entity type.
#[derive(Debug)]
pub struct EntityBuilder<'a> {
    app: &'a str,
    set: &'a mut EntityPolicySet,
}

impl EntityBuilder<'_> {
    /// Define one encrypted attribute on this entity.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for invalid options.
    pub fn define(
        &mut self,
        attribute: &str,
        options: AttributeOptions,
    ) -> Result<&mut Self, ConfigurationError> {
        let policy = AttributePolicy::resolve(self.app, &self.set.table, attribute, options)?;
        self.set.upsert(policy);
        Ok(self)
    }

    /// Defer decryption until each attribute is first read.
    pub fn lazy_decrypt(&mut self, lazy: bool) -> &mut Self {
        self.set.lazy_decrypt = lazy;
        self
    }

    /// Front `encrypted_attribute` with the legacy plaintext column.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownAttribute`] if the encrypted
    /// attribute has not been defined yet.
    pub fn proxy(
        &mut self,
        name: &str,
        legacy_column: &str,
        encrypted_attribute: &str,
        options: ProxyOptions,
    ) -> Result<&mut Self, ConfigurationError> {
        if self.set.get(encrypted_attribute).is_none() {
            return Err(self.set.unknown(encrypted_attribute));
        }
        let proxy = ProxyPolicy {
            name: name.to_string(),
            legacy_column: legacy_column.to_string(),
            encrypted_attribute: encrypted_attribute.to_string(),
            options,
        };
        match self.set.proxies.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = proxy,
            None => self.set.proxies.push(proxy),
        }
        Ok(self)
    }
}

/// Immutable policies for every entity type.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    app: String,
    entities: BTreeMap<String, Arc<EntityPolicySet>>,
}

impl PolicyRegistry {
    /// Application name used for default key ids.
    #[must_use]
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Policies of `entity` in definition order; empty when undefined.
    #[must_use]
    pub fn lookup(&self, entity: &str) -> &[AttributePolicy] {
        self.entities
            .get(entity)
            .map_or(&[], |set| set.attributes())
    }

    /// Full policy set of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownEntity`] if nothing was defined.
    pub fn entity(&self, entity: &str) -> Result<Arc<EntityPolicySet>, ConfigurationError> {
        self.entities
            .get(entity)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownEntity(entity.to_string()))
    }
}
