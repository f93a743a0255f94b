//! Engine configuration loader.
//!
//! Reads `tessera.toml` from the configuration directory and deserializes it
//! into [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::Path;

use tessera_types::config::EngineConfig;

/// File name of the engine configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Load engine configuration from `{config_dir}/tessera.toml`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_engine_config(config_dir: &Path) -> EngineConfig {
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}
