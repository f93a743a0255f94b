//! Engine configuration types.
//!
//! `EngineConfig` is the top-level `tessera.toml`. All fields have defaults,
//! so an empty (or missing) file yields a usable configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Tessera engine core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allow process definitions to be fetched from non-`file` URIs.
    ///
    /// Off unless explicitly enabled.
    #[serde(default)]
    pub remote_definitions_allowed: bool,

    /// Capacity of the engine event bus (broadcast channel).
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Upper bound on operations a script definition may perform while
    /// building its tree.
    #[serde(default = "default_script_max_operations")]
    pub script_max_operations: u64,
}

fn default_event_bus_capacity() -> usize {
    1024
}

fn default_script_max_operations() -> u64 {
    100_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_definitions_allowed: false,
            event_bus_capacity: default_event_bus_capacity(),
            script_max_operations: default_script_max_operations(),
        }
    }
}
