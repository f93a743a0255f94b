//! Infrastructure layer for Tessera.
//!
//! Contains implementations of the ports defined in `tessera-core`: the
//! definition source reader (local files and HTTP), in-memory expression
//! storage, and the `tessera.toml` configuration loader.

pub mod config;
pub mod source;
pub mod storage;
