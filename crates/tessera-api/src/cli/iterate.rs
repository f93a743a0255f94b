//! Iteration preview command.

use anyhow::Result;
use console::style;
use serde_json::{Map, Value};

use tessera_core::iteration::{IterationState, LoopExpression};
use tessera_types::flow::{FlowExpressionId, Workitem};

/// Workitem field receiving the current element.
const TARGET_FIELD: &str = "value";

/// A loop expression built from command-line arguments.
struct ArgsLoop {
    attributes: Map<String, Value>,
}

impl LoopExpression for ArgsLoop {
    fn lookup_attribute(&self, name: &str, _workitem: &Workitem) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    fn lookup_variable(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Print every step of an iteration over `on`.
pub fn iterate(on: &str, separator: Option<String>, start: i64, json: bool) -> Result<()> {
    let mut attributes = Map::new();
    attributes.insert("on_value".to_string(), Value::from(on));
    attributes.insert("to_field".to_string(), Value::from(TARGET_FIELD));
    if let Some(separator) = separator {
        attributes.insert("value_separator".to_string(), Value::from(separator));
    }
    let expression = ArgsLoop { attributes };

    let mut workitem = Workitem::new(FlowExpressionId::launch("cli"));
    let mut state = IterationState::new(&expression, &mut workitem);

    let mut steps = Vec::new();
    let mut step = state.jump(&mut workitem, start);
    while let Some(current) = step {
        let value = workitem.field(TARGET_FIELD).cloned().unwrap_or(Value::Null);
        steps.push((current.position, value));
        step = state.next(&mut workitem);
    }

    if json {
        let report = serde_json::json!({
            "size": state.size(),
            "steps": steps
                .iter()
                .map(|(position, value)| serde_json::json!({"position": position, "value": value}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("  {} {} element(s)", style("Iterating").bold(), state.size());
    for (position, value) in steps {
        let value = value.as_str().map_or_else(|| value.to_string(), str::to_string);
        println!("  {:>3}  {}", style(position).dim(), value);
    }
    Ok(())
}
