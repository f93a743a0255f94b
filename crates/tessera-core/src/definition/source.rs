//! Definition sources: where a definition URI points, and the port that reads
//! it.

use std::path::PathBuf;

use url::Url;

use super::DefinitionError;

/// A resolved definition URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Local file (plain path or `file://` URL).
    Path(PathBuf),
    /// Any other URL scheme.
    Url(Url),
}

impl SourceLocation {
    /// Interpret `uri` as a URL, falling back to a local path when it has no
    /// scheme.
    pub fn parse(uri: &str) -> Result<Self, DefinitionError> {
        match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => {
                url.to_file_path()
                    .map(Self::Path)
                    .map_err(|_| DefinitionError::InvalidUri {
                        uri: uri.to_string(),
                        message: "not a local file path".to_string(),
                    })
            }
            Ok(url) => Ok(Self::Url(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self::Path(PathBuf::from(uri))),
            Err(err) => Err(DefinitionError::InvalidUri {
                uri: uri.to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// True for anything that is not a local file.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Reads the raw text behind a definition URI.
///
/// Only [`DefinitionParser::read_uri`](super::DefinitionParser::read_uri)
/// calls readers, after the remote-fetch policy has been applied.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait UriReader: Send + Sync {
    fn read(
        &self,
        location: &SourceLocation,
    ) -> impl std::future::Future<Output = Result<String, DefinitionError>> + Send;
}
