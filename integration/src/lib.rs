//! End-to-end tests for the vault-attributes crates live under `tests/`.

#![forbid(unsafe_code)]
