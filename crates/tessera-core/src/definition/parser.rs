//! The definition parser: any supported input in, canonical tree out.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tessera_types::config::EngineConfig;
use tessera_types::tree::{Child, Node, is_node, value_kind};
use tracing::debug;

use super::DefinitionError;
use super::script::{ScriptEvaluator, ScriptTreeChecker, TreeChecker};
use super::source::{SourceLocation, UriReader};
use super::xml::parse_xml;

/// Name of the node [`DefinitionParser::parse`] wraps unrecognized roots in.
pub const DEFINITION_MARKER: &str = "define";

pub const DEFAULT_DEFINITION_NAME: &str = "NoName";
pub const DEFAULT_REVISION: &str = "0";

/// Anything that can produce an expression tree on demand.
pub trait TreeBuilder: Send + Sync {
    fn make_tree(&self) -> Node;
}

impl<F> TreeBuilder for F
where
    F: Fn() -> Node + Send + Sync,
{
    fn make_tree(&self) -> Node {
        self()
    }
}

/// In-memory process definition input.
#[derive(Clone)]
pub enum DefinitionInput {
    Node(Node),
    /// A JSON value: either a node triple or a string holding a definition.
    Value(Value),
    Text(String),
    Builder(Arc<dyn TreeBuilder>),
}

impl fmt::Debug for DefinitionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

impl From<Node> for DefinitionInput {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Value> for DefinitionInput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for DefinitionInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for DefinitionInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A definition given either by location or in memory.
#[derive(Debug, Clone)]
pub enum SourceRef {
    Uri(String),
    Input(DefinitionInput),
}

/// Decides whether a root node name already denotes a process definition.
pub trait RootPredicate: Send + Sync {
    fn is_definition_root(&self, name: &str) -> bool;
}

impl<F> RootPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_definition_root(&self, name: &str) -> bool {
        self(name)
    }
}

/// The stock definition roots: `define`, `process_definition` and
/// `workflow_definition` (dashes and underscores are interchangeable).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionNames;

impl RootPredicate for DefinitionNames {
    fn is_definition_root(&self, name: &str) -> bool {
        matches!(
            name.replace('-', "_").as_str(),
            "define" | "process_definition" | "workflow_definition"
        )
    }
}

/// Reads and parses process definitions.
///
/// Remote URIs are only fetched when
/// [`EngineConfig::remote_definitions_allowed`] is set; script definitions
/// only run after the [`TreeChecker`] accepted them.
pub struct DefinitionParser<R> {
    remote_definitions_allowed: bool,
    reader: R,
    checker: Arc<dyn TreeChecker>,
    roots: Arc<dyn RootPredicate>,
    evaluator: ScriptEvaluator,
}

impl<R: UriReader> DefinitionParser<R> {
    pub fn new(config: &EngineConfig, reader: R) -> Self {
        Self {
            remote_definitions_allowed: config.remote_definitions_allowed,
            reader,
            checker: Arc::new(ScriptTreeChecker::new(config.script_max_operations)),
            roots: Arc::new(DefinitionNames),
            evaluator: ScriptEvaluator::new(config.script_max_operations),
        }
    }

    /// Replace the script safety gate.
    pub fn with_tree_checker(mut self, checker: impl TreeChecker + 'static) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    /// Replace the rule deciding which roots need no `define` wrapper.
    pub fn with_root_predicate(mut self, roots: impl RootPredicate + 'static) -> Self {
        self.roots = Arc::new(roots);
        self
    }

    pub fn remote_definitions_allowed(&self) -> bool {
        self.remote_definitions_allowed
    }

    /// Turn an in-memory definition into a tree rooted at a definition node.
    ///
    /// A root the [`RootPredicate`] does not recognize is wrapped as
    /// `define {name: NoName, revision: 0}` with the tree as its only child.
    pub fn parse(&self, input: impl Into<DefinitionInput>) -> Result<Node, DefinitionError> {
        let tree = match input.into() {
            DefinitionInput::Node(node) => node,
            DefinitionInput::Builder(builder) => builder.make_tree(),
            DefinitionInput::Text(text) => self.parse_text(&text)?,
            DefinitionInput::Value(Value::String(text)) => self.parse_text(&text)?,
            DefinitionInput::Value(value) if is_node(&value) => Node::try_from(value)?,
            DefinitionInput::Value(value) => {
                return Err(DefinitionError::UnsupportedInputKind(
                    value_kind(&value).to_string(),
                ));
            }
        };
        Ok(self.ensure_definition_root(tree))
    }

    /// Parse definition text, sniffing its syntax.
    ///
    /// After trimming: a leading `<` means XML, a leading `---` YAML; text
    /// that parses as JSON is taken as JSON; anything else is a script, which
    /// must pass the tree checker before it is evaluated. The tree is returned
    /// as parsed, without root wrapping.
    pub fn parse_text(&self, text: &str) -> Result<Node, DefinitionError> {
        let text = text.trim();

        if text.starts_with('<') {
            debug!("parsing xml definition");
            return parse_xml(text);
        }

        if is_yaml_document(text) {
            debug!("parsing yaml definition");
            let value: Value =
                serde_yaml_ng::from_str(text).map_err(|err| DefinitionError::parse("yaml", err))?;
            return Ok(Node::try_from(value)?);
        }

        if let Ok(value) = serde_json::from_str::<Value>(text) {
            debug!("parsing json definition");
            return Ok(Node::try_from(value)?);
        }

        debug!("checking script definition");
        self.checker.check(text)?;
        self.evaluator.evaluate(text)
    }

    /// Resolve a definition given by URI or in memory.
    pub async fn resolve_source(&self, source: SourceRef) -> Result<Node, DefinitionError> {
        match source {
            SourceRef::Uri(uri) => {
                let text = self.read_uri(&uri).await?;
                self.parse(DefinitionInput::Text(text))
            }
            SourceRef::Input(input) => self.parse(input),
        }
    }

    /// Read the text behind `uri`, enforcing the remote-fetch policy.
    ///
    /// Plain paths and `file://` URLs are always readable; any other scheme
    /// fails with [`DefinitionError::RemoteFetchDisallowed`] unless remote
    /// definitions are allowed.
    pub async fn read_uri(&self, uri: &str) -> Result<String, DefinitionError> {
        let location = SourceLocation::parse(uri)?;
        if location.is_remote() && !self.remote_definitions_allowed {
            return Err(DefinitionError::RemoteFetchDisallowed(uri.to_string()));
        }
        debug!(%location, "reading process definition");
        self.reader.read(&location).await
    }

    fn ensure_definition_root(&self, tree: Node) -> Node {
        if self.roots.is_definition_root(&tree.name) {
            return tree;
        }
        let mut attributes = Map::new();
        attributes.insert("name".to_string(), Value::from(DEFAULT_DEFINITION_NAME));
        attributes.insert("revision".to_string(), Value::from(DEFAULT_REVISION));
        Node {
            name: DEFINITION_MARKER.to_string(),
            attributes,
            children: vec![Child::Node(tree)],
        }
    }
}

fn is_yaml_document(text: &str) -> bool {
    text.strip_prefix("---")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}
