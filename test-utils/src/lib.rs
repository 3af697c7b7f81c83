//! Shared test utilities for the vault-attributes crates.
//!
//! This crate provides:
//! - Proptest generators for attribute values
//! - Recording and failing transit providers, and a flaky record store
//! - A fake Vault transit server built on wiremock
//! - Sample entity definitions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fake_vault;
pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fake_vault::FakeVault;
pub use generators::*;
pub use mocks::{FailingTransit, FlakyStore, RecordingTransit, TransitCall, TransitOp};
