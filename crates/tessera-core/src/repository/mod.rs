//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (tessera-infra) implements. The core crate never depends on any specific
//! storage technology.

pub mod expression;

pub use expression::{ExpressionFilter, ExpressionStorage};
