//! Shared domain types for Tessera.
//!
//! This crate contains the data model every other Tessera crate builds on:
//! the canonical expression tree, flow expression ids and workitems, engine
//! events, recorded process errors, and configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod flow;
pub mod process_error;
pub mod tree;
