//! XML process definitions.
//!
//! Each element becomes a node (tag name, attributes as strings), each
//! non-blank text run becomes a trimmed leaf. Comments, processing
//! instructions and the XML declaration are ignored.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;
use tessera_types::tree::{Attributes, Child, Node};

use super::DefinitionError;

const FORMAT: &str = "xml";

/// Parse an XML document into an expression tree.
pub fn parse_xml(xml: &str) -> Result<Node, DefinitionError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(element_node(&start)?),
            Event::Empty(start) => {
                let node = element_node(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| DefinitionError::parse(FORMAT, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                push_text(&mut stack, &text);
            }
            Event::CData(data) => push_text(&mut stack, &String::from_utf8_lossy(&data)),
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DefinitionError::parse(FORMAT, "unexpected end of document"));
    }
    root.ok_or_else(|| DefinitionError::parse(FORMAT, "no root element"))
}

fn element_node(start: &BytesStart<'_>) -> Result<Node, DefinitionError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Attributes::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        attributes.insert(key, Value::String(value));
    }
    Ok(Node {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), DefinitionError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Child::Node(node)),
        None if root.is_none() => *root = Some(node),
        None => return Err(DefinitionError::parse(FORMAT, "more than one root element")),
    }
    Ok(())
}

fn push_text(stack: &mut [Node], text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Child::Text(text.to_string()));
    }
}

fn xml_error(err: impl std::fmt::Display) -> DefinitionError {
    DefinitionError::parse(FORMAT, err)
}
