//! Observability setup for Tessera binaries.

pub mod tracing_setup;
