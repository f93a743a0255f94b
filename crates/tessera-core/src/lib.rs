//! Engine core for Tessera.
//!
//! This crate turns process definitions into expression trees, drives
//! iteration state for looping expressions, and journals expression failures.
//! It defines the "ports" (repository and source-reader traits) that the
//! infrastructure layer implements, and depends only on `tessera-types` --
//! never on `tessera-infra` or any network or database crate.

pub mod definition;
pub mod event;
pub mod iteration;
pub mod journal;
pub mod repository;
