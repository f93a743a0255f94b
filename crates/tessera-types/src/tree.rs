//! The canonical expression tree.
//!
//! Every process definition, whatever its source syntax, is reduced to a tree
//! of `(name, attributes, children)` triples. On the wire (JSON, YAML, journal
//! payloads) a node is the array `[name, {attributes}, [children]]`; anything
//! that is not exactly that shape is a leaf text value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TreeError;

/// Ordered attribute map of a node (insertion order is preserved).
pub type Attributes = Map<String, Value>;

/// One node of an expression tree.
///
/// Nodes are plain values: deriving a new tree (for example overriding the
/// tree of a failed expression) means building a new `Node`, never mutating
/// one that is shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Node {
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<Child>,
}

/// A child of a node: either a nested node or a leaf text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Node(Node),
    Text(String),
}

/// Returns true iff `value` is exactly a `[string, object, array]` triple.
pub fn is_node(value: &Value) -> bool {
    match value {
        Value::Array(items) => {
            items.len() == 3
                && items[0].is_string()
                && items[1].is_object()
                && items[2].is_array()
        }
        _ => false,
    }
}

/// Short name of a JSON value's kind, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Node {
    /// A node with no attributes and no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Builder: add (or replace) an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder: append a child node or text.
    pub fn with_child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Direct child nodes, skipping leaf text.
    pub fn child_nodes(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter_map(Child::as_node)
    }

    /// The first leaf text among the direct children.
    pub fn first_text(&self) -> Option<&str> {
        self.children.iter().find_map(Child::as_text)
    }

    /// True when the node has exactly one child and it is leaf text.
    pub fn has_single_text_child(&self) -> bool {
        matches!(self.children.as_slice(), [Child::Text(_)])
    }

    /// Canonical `[name, {attributes}, [children]]` representation.
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl Child {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Child::Node(node) => Some(node),
            Child::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Child::Text(text) => Some(text),
            Child::Node(_) => None,
        }
    }

    /// Reads a child value: nodes are decomposed, everything else is leaf text.
    pub fn from_value(value: Value) -> Self {
        if is_node(&value) {
            match Node::try_from(value) {
                Ok(node) => Child::Node(node),
                // is_node() already checked the shape
                Err(err) => Child::Text(err.to_string()),
            }
        } else {
            match value {
                Value::String(text) => Child::Text(text),
                other => Child::Text(other.to_string()),
            }
        }
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl TryFrom<Value> for Node {
    type Error = TreeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if !is_node(&value) {
            return Err(TreeError::NotANode(value_kind(&value).to_string()));
        }
        let Value::Array(items) = value else {
            return Err(TreeError::NotANode("array".to_string()));
        };
        let mut items = items.into_iter();
        match (items.next(), items.next(), items.next()) {
            (Some(Value::String(name)), Some(Value::Object(attributes)), Some(Value::Array(children))) => {
                Ok(Node {
                    name,
                    attributes,
                    children: children.into_iter().map(Child::from_value).collect(),
                })
            }
            _ => Err(TreeError::NotANode("array".to_string())),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        let children = node
            .children
            .into_iter()
            .map(|child| match child {
                Child::Node(node) => Value::from(node),
                Child::Text(text) => Value::String(text),
            })
            .collect();
        Value::Array(vec![
            Value::String(node.name),
            Value::Object(node.attributes),
            Value::Array(children),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_node_accepts_exact_triples_only() {
        assert!(is_node(&json!(["a", {}, []])));
        assert!(is_node(&json!(["a", {"k": "1"}, ["x", ["b", {}, []]]])));

        assert!(!is_node(&json!("a")));
        assert!(!is_node(&json!(3)));
        assert!(!is_node(&json!(["a", {}])));
        assert!(!is_node(&json!(["a", {}, [], []])));
        assert!(!is_node(&json!([1, {}, []])));
        assert!(!is_node(&json!(["a", [], []])));
        assert!(!is_node(&json!(["a", {}, "x"])));
        assert!(!is_node(&json!({"name": "a"})));
    }

    #[test]
    fn test_try_from_value_builds_nested_tree() {
        let node = Node::try_from(json!(["a", {"k": "1"}, [["b", {}, ["x"]]]])).unwrap();
        assert_eq!(
            node,
            Node::new("a")
                .with_attribute("k", "1")
                .with_child(Node::new("b").with_child("x"))
        );
    }

    #[test]
    fn test_non_node_children_are_leaf_text() {
        let node = Node::try_from(json!(["a", {}, ["x", 3, ["too", "short"]]])).unwrap();
        assert_eq!(
            node.children,
            vec![
                Child::Text("x".to_string()),
                Child::Text("3".to_string()),
                Child::Text(r#"["too","short"]"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_try_from_rejects_scalars() {
        let err = Node::try_from(json!("define")).unwrap_err();
        assert_eq!(err, TreeError::NotANode("string".to_string()));
    }

    #[test]
    fn test_serde_uses_triple_form() {
        let node = Node::new("sequence")
            .with_attribute("tag", "main")
            .with_child(Node::new("participant").with_child("alice"));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            json!(["sequence", {"tag": "main"}, [["participant", {}, ["alice"]]]])
        );
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_yaml_triple_deserializes_to_same_tree() {
        let yaml = "--- \n- a\n- k: '1'\n- - - b\n    - {}\n    - [x]\n";
        let node: Node = serde_yaml_ng::from_str(yaml).unwrap();
        let expected = Node::try_from(json!(["a", {"k": "1"}, [["b", {}, ["x"]]]])).unwrap();
        assert_eq!(node, expected);
    }

    #[test]
    fn test_attribute_order_is_preserved() {
        let node = Node::try_from(json!(["a", {"z": 1, "a": 2, "m": 3}, []])).unwrap();
        let keys: Vec<&str> = node.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_helpers() {
        let node = Node::new("p").with_child("hello").with_child(Node::new("q"));
        assert_eq!(node.first_text(), Some("hello"));
        assert_eq!(node.child_nodes().count(), 1);
        assert!(!node.has_single_text_child());
        assert!(Node::new("p").with_child("x").has_single_text_child());
    }
}
