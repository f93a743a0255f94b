//! Expression storage implementations.

pub mod memory;

pub use memory::InMemoryExpressionStorage;
