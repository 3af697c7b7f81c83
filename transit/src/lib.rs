//! Vault transit engine access for field-level encryption.
//!
//! Provides the synchronous [`TransitProvider`] seam, an HTTP client for a
//! real Vault server and an in-memory oracle for development.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod memory;
pub mod provider;
pub mod wire;

pub use client::TransitClient;
pub use config::TransitConfig;
pub use error::{CryptoServiceError, TransitError, TransitResult};
pub use factory::TransitFactory;
pub use memory::MemoryTransit;
pub use provider::TransitProvider;
