//! Reads process definition text from local files and remote URLs.
//!
//! Implements the `UriReader` port from `tessera-core`. Whether a remote URL
//! may be fetched at all is decided by the definition parser before the
//! reader is called.

use tessera_core::definition::{DefinitionError, SourceLocation, UriReader};
use tracing::debug;

/// Local filesystem plus HTTP(S) reader.
#[derive(Debug, Clone)]
pub struct SourceReader {
    http: reqwest::Client,
}

impl SourceReader {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tessera/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    async fn read_local(&self, location: &SourceLocation) -> Result<String, DefinitionError> {
        let SourceLocation::Path(path) = location else {
            return Err(fetch_error(location, "not a local path"));
        };
        debug!(path = %path.display(), "reading definition file");
        tokio::fs::read_to_string(path)
            .await
            .map_err(|err| fetch_error(location, err))
    }

    async fn read_remote(&self, location: &SourceLocation) -> Result<String, DefinitionError> {
        let SourceLocation::Url(url) = location else {
            return Err(fetch_error(location, "not a url"));
        };
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(fetch_error(location, format!("unsupported scheme '{scheme}'"))),
        }
        debug!(%url, "fetching remote definition");
        self.http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| fetch_error(location, err))?
            .error_for_status()
            .map_err(|err| fetch_error(location, err))?
            .text()
            .await
            .map_err(|err| fetch_error(location, err))
    }
}

impl Default for SourceReader {
    fn default() -> Self {
        Self::new()
    }
}

impl UriReader for SourceReader {
    async fn read(&self, location: &SourceLocation) -> Result<String, DefinitionError> {
        if location.is_remote() {
            self.read_remote(location).await
        } else {
            self.read_local(location).await
        }
    }
}

fn fetch_error(location: &SourceLocation, err: impl std::fmt::Display) -> DefinitionError {
    DefinitionError::Fetch {
        uri: location.to_string(),
        message: err.to_string(),
    }
}
