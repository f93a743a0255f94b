//! Process definition handling.
//!
//! A process definition arrives as an already-built tree, a JSON value, a
//! text document (XML, YAML, JSON or the tree-building script language) or a
//! URI pointing at one of those. [`DefinitionParser`] reduces all of them to a
//! canonical [`Node`](tessera_types::tree::Node) tree; the `render` module
//! goes the other way, back to script source or XML.

pub mod parser;
pub mod render;
pub mod script;
pub mod source;
pub mod xml;

use tessera_types::error::TreeError;
use thiserror::Error;

pub use parser::{
    DefinitionInput, DefinitionNames, DefinitionParser, RootPredicate, SourceRef, TreeBuilder,
};
pub use render::{extract_description, to_script_text, to_xml_node, to_xml_text};
pub use script::{ScriptTreeChecker, TreeChecker};
pub use source::{SourceLocation, UriReader};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while reading, parsing or rendering definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The input is neither a tree, a string nor a tree builder.
    #[error("cannot handle process definition of kind '{0}'")]
    UnsupportedInputKind(String),

    /// A non-`file` URI was given while remote definitions are disabled.
    #[error("remote process definitions are not allowed: '{0}'")]
    RemoteFetchDisallowed(String),

    /// The tree checker rejected a script definition.
    #[error("unsafe script definition: {0}")]
    UnsafeScript(String),

    /// Input parsed, but did not produce an expression tree.
    #[error("malformed expression tree: {0}")]
    MalformedTree(#[from] TreeError),

    /// XML, YAML or script syntax/evaluation failure.
    #[error("{format} parse error: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    /// XML rendering failure.
    #[error("render error: {0}")]
    Render(String),

    /// The URI could not be interpreted as a path or URL.
    #[error("invalid definition uri '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    /// The source reader failed to fetch the URI.
    #[error("cannot read '{uri}': {message}")]
    Fetch { uri: String, message: String },
}

impl DefinitionError {
    pub(crate) fn parse(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            format,
            message: err.to_string(),
        }
    }
}
