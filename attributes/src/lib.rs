//! Field-level encrypted attributes.
//!
//! Selected attributes of an entity are encrypted through a Vault transit
//! engine before they reach the store. Application code reads and writes
//! plaintext through the [`AttributeController`]; only ciphertext columns
//! are persisted.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vault_attributes::{AttributeController, AttributeOptions, MemoryStore, RegistryBuilder};
//! use vault_transit::MemoryTransit;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = RegistryBuilder::new("shop");
//! registry.entity("Customer", "customers")?.define("ssn", AttributeOptions::new())?;
//! let customers = registry.build().entity("Customer")?;
//!
//! let controller = AttributeController::new(Arc::new(MemoryTransit::new()));
//! let store = MemoryStore::new();
//!
//! let mut customer = controller.build(&customers);
//! controller.set(&mut customer, "ssn", "123-45-6789")?;
//! controller.save(&store, &mut customer)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod policy;
mod proxy;
pub mod record;
pub mod serializer;
pub mod store;
pub mod types;
pub mod value;

pub use config::ControllerConfig;
pub use controller::AttributeController;
pub use error::{ConfigurationError, RecordError, RecordResult, SerializationError, StoreError};
pub use policy::{
    Accessor, AttributeOptions, AttributePolicy, EncryptedCopy, EntityBuilder, EntityPolicySet,
    PolicyRegistry, ProxyOptions, ProxyPolicy, RegistryBuilder, default_key_id,
};
pub use record::{AttributeState, EncryptedRecord, RecordId, Row};
pub use serializer::{
    BinarySerializer, CustomSerializer, IdentitySerializer, IpAddrSerializer, JsonSerializer,
    Serializer, SerializerKind,
};
pub use store::{MemoryStore, RecordStore};
pub use types::AttributeType;
pub use value::Value;
