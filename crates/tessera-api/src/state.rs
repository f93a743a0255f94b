//! Application state wiring the engine pieces together.
//!
//! AppState pins the generic definition parser to the concrete infra reader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tessera_core::definition::DefinitionParser;
use tessera_infra::config::load_engine_config;
use tessera_infra::source::SourceReader;
use tessera_types::config::EngineConfig;

/// Concrete parser type used by every command.
pub type ConcreteDefinitionParser = DefinitionParser<SourceReader>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: EngineConfig,
    pub config_dir: PathBuf,
    pub parser: Arc<ConcreteDefinitionParser>,
}

impl AppState {
    /// Load `tessera.toml` from `config_dir` and build the parser.
    ///
    /// `allow_remote` turns remote definition fetching on regardless of the
    /// file's setting.
    pub async fn init(config_dir: &Path, allow_remote: bool) -> Self {
        let mut config = load_engine_config(config_dir).await;
        if allow_remote {
            config.remote_definitions_allowed = true;
        }
        tracing::debug!(
            remote = config.remote_definitions_allowed,
            "engine configuration loaded"
        );

        let parser = DefinitionParser::new(&config, SourceReader::new());
        Self {
            config,
            config_dir: config_dir.to_path_buf(),
            parser: Arc::new(parser),
        }
    }
}
