//! Rendering expression trees back to source forms.
//!
//! Two targets: the tree-building script language (the same call syntax
//! [`ScriptEvaluator`](super::script) reads) and XML. Both are pure functions
//! of the tree.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;
use tessera_types::tree::{Child, Node, is_node};

use super::DefinitionError;
use super::script::is_reserved;

const INDENT: &str = "  ";

/// Attribute rendered as a nested element instead of an XML attribute when
/// it holds a tree.
const VALUE_ATTRIBUTE: &str = "value";

/// Text of the first `description` child of `tree`, if any.
///
/// Only direct children are searched.
pub fn extract_description(tree: &Node) -> Option<&str> {
    tree.child_nodes()
        .find(|child| child.name == "description")
        .and_then(Node::first_text)
}

// ---------------------------------------------------------------------------
// Script rendering
// ---------------------------------------------------------------------------

/// Render `tree` as script source, indented by `indent` levels.
///
/// ```text
/// define(#{ name: "order" }, [
///   sequence([
///     participant("alice"),
///     participant("bob", #{ timeout: "2d" })
///   ])
/// ])
/// ```
///
/// A node whose only child is leaf text renders that text as its single
/// positional argument. Attribute keys are rendered in snake_case.
pub fn to_script_text(tree: &Node, indent: usize) -> String {
    let mut out = String::new();
    write_script(tree, indent, &mut out);
    out
}

fn write_script(node: &Node, indent: usize, out: &mut String) {
    let pad = INDENT.repeat(indent);
    out.push_str(&pad);
    out.push_str(&safe_identifier(&node.name));
    out.push('(');

    let mut args = Vec::new();
    let single_text = node.has_single_text_child();
    if let Some(text) = node.first_text().filter(|_| single_text) {
        args.push(string_literal(text));
    }
    if !node.attributes.is_empty() {
        args.push(map_literal(
            node.attributes
                .iter()
                .map(|(key, value)| (to_snake_case(key), value)),
        ));
    }
    out.push_str(&args.join(", "));

    if node.children.is_empty() || single_text {
        out.push(')');
        return;
    }

    if !args.is_empty() {
        out.push_str(", ");
    }
    out.push_str("[\n");
    for (i, child) in node.children.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        match child {
            Child::Node(child) => write_script(child, indent + 1, out),
            Child::Text(text) => {
                out.push_str(&pad);
                out.push_str(INDENT);
                out.push_str(&string_literal(text));
            }
        }
    }
    out.push('\n');
    out.push_str(&pad);
    out.push_str("])");
}

/// Turn an expression name into a callable identifier.
fn safe_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_reserved(&ident) {
        ident.push('_');
    }
    ident
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if c == '-' || c == ' ' {
            out.push('_');
        } else if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_reserved(key)
}

fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn map_literal<'a>(entries: impl Iterator<Item = (String, &'a Value)>) -> String {
    let entries: Vec<String> = entries
        .map(|(key, value)| {
            let key = if is_plain_key(&key) {
                key
            } else {
                string_literal(&key)
            };
            format!("{key}: {}", value_literal(value))
        })
        .collect();
    if entries.is_empty() {
        "#{}".to_string()
    } else {
        format!("#{{ {} }}", entries.join(", "))
    }
}

fn value_literal(value: &Value) -> String {
    match value {
        Value::Null => "()".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(value_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => map_literal(map.iter().map(|(k, v)| (k.clone(), v))),
    }
}

// ---------------------------------------------------------------------------
// XML rendering
// ---------------------------------------------------------------------------

/// A detached XML element, the intermediate form of [`to_xml_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlContent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlContent {
    Element(XmlElement),
    Text(String),
}

/// Convert `tree` into an XML element.
///
/// Attribute values that are not strings are written as their JSON text,
/// except a `value` attribute holding a tree, which becomes a nested element
/// placed before the regular children.
pub fn to_xml_node(tree: &Node) -> XmlElement {
    let mut attributes = Vec::with_capacity(tree.attributes.len());
    let mut children = Vec::with_capacity(tree.children.len());

    for (key, value) in &tree.attributes {
        match value {
            Value::String(text) => attributes.push((key.clone(), text.clone())),
            value if key == VALUE_ATTRIBUTE && is_node(value) => {
                match Node::try_from(value.clone()) {
                    Ok(nested) => children.push(XmlContent::Element(to_xml_node(&nested))),
                    Err(_) => attributes.push((key.clone(), value.to_string())),
                }
            }
            value => attributes.push((key.clone(), value.to_string())),
        }
    }

    children.extend(tree.children.iter().map(|child| match child {
        Child::Node(node) => XmlContent::Element(to_xml_node(node)),
        Child::Text(text) => XmlContent::Text(text.clone()),
    }));

    XmlElement {
        tag: tree.name.clone(),
        attributes,
        children,
    }
}

/// Render `tree` as an XML document (no declaration).
///
/// A negative `indent` yields compact output; otherwise nested elements are
/// indented by `indent` spaces per level.
pub fn to_xml_text(tree: &Node, indent: i32) -> Result<String, DefinitionError> {
    let element = to_xml_node(tree);
    let mut writer = match usize::try_from(indent) {
        Ok(width) => Writer::new_with_indent(Vec::new(), b' ', width),
        Err(_) => Writer::new(Vec::new()),
    };
    write_element(&mut writer, &element)?;
    String::from_utf8(writer.into_inner()).map_err(render_error)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), DefinitionError> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(render_error);
    }

    writer.write_event(Event::Start(start)).map_err(render_error)?;
    for child in &element.children {
        match child {
            XmlContent::Element(nested) => write_element(writer, nested)?,
            XmlContent::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(render_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
        .map_err(render_error)
}

fn render_error(err: impl std::fmt::Display) -> DefinitionError {
    DefinitionError::Render(err.to_string())
}
