//! Iteration state for looping expressions (`iterator`,
//! `concurrent_iterator`, `cursor` and friends).
//!
//! The list to iterate is resolved once, when the state is built, from the
//! loop expression's attributes:
//!
//! | attribute         | meaning                                        |
//! |-------------------|------------------------------------------------|
//! | `on_value`        | literal list (or delimited string)             |
//! | `on_field`        | name of a workitem field holding the list      |
//! | `on_variable`     | name of a process variable holding the list    |
//! | `on`              | literal list, last resort                      |
//! | `to_field`        | workitem field receiving the current value     |
//! | `to_variable`     | process variable receiving the current value   |
//! | `value_separator` | literal separator for delimited strings        |
//!
//! Each attribute may also be spelled with dashes (`on-value`). Progress is
//! mirrored into the workitem: [`ITERATOR_COUNT`] holds the list length and
//! [`ITERATOR_POSITION`] the last assigned position.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tessera_types::flow::Workitem;

/// Workitem field holding the number of elements to iterate over.
pub const ITERATOR_COUNT: &str = "__ic__";

/// Workitem field holding the position of the current element.
pub const ITERATOR_POSITION: &str = "__ip__";

/// What a looping expression exposes to its iteration state.
pub trait LoopExpression {
    /// Attribute of the expression, resolved in the context of `workitem`.
    fn lookup_attribute(&self, name: &str, workitem: &Workitem) -> Option<Value>;

    /// Process variable visible from the expression.
    fn lookup_variable(&self, name: &str) -> Option<Value>;
}

/// How a delimited string is cut into list elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
    /// A comma plus any whitespace after it.
    #[default]
    Comma,
    /// An exact string.
    Literal(String),
}

impl Separator {
    /// Split `text`; empty trailing pieces are dropped.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut pieces: Vec<String> = match self {
            Separator::Comma => text
                .split(',')
                .enumerate()
                .map(|(i, piece)| if i == 0 { piece } else { piece.trim_start() })
                .map(str::to_string)
                .collect(),
            Separator::Literal(sep) if sep.is_empty() => {
                text.chars().map(String::from).collect()
            }
            Separator::Literal(sep) => text.split(sep.as_str()).map(str::to_string).collect(),
        };
        while pieces.last().is_some_and(String::is_empty) {
            pieces.pop();
        }
        pieces
    }
}

/// The raw material of an iteration, before it becomes a list.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationSource {
    /// Already ordered values, iterated element by element.
    Values(Vec<Value>),
    /// A string to split with the loop's [`Separator`].
    Delimited(String),
}

impl IterationSource {
    /// Arrays are taken as-is; anything else is read as text (`null` and a
    /// missing source as the empty string).
    pub fn from_value(raw: Option<Value>) -> Self {
        match raw {
            Some(Value::Array(values)) => Self::Values(values),
            Some(Value::String(text)) => Self::Delimited(text),
            Some(Value::Null) | None => Self::Delimited(String::new()),
            Some(other) => Self::Delimited(other.to_string()),
        }
    }

    pub fn into_list(self, separator: &Separator) -> Vec<Value> {
        match self {
            Self::Values(values) => values,
            Self::Delimited(text) => separator
                .split(&text)
                .into_iter()
                .map(Value::String)
                .collect(),
        }
    }
}

/// The outcome of positioning an iteration on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationStep {
    pub position: usize,
    /// Variable assignment the caller must perform (`to_variable` mode).
    pub variable: Option<(String, Value)>,
}

impl IterationStep {
    /// Variables to set: the `to_variable` target (if any) and the position.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some((name, value)) = &self.variable {
            map.insert(name.clone(), value.clone());
        }
        map.insert(ITERATOR_POSITION.to_string(), Value::from(self.position));
        map
    }
}

/// Position within a resolved iteration list.
///
/// Serializable, so a looping expression can persist it between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationState {
    list: Vec<Value>,
    /// Position of the next element to hand out.
    index: usize,
    to_field: Option<String>,
    to_variable: Option<String>,
}

impl IterationState {
    /// Resolve the list from `expression` and record its size in
    /// `workitem[__ic__]`.
    pub fn new(expression: &impl LoopExpression, workitem: &mut Workitem) -> Self {
        let to_field = text_attribute(expression, "to_field", workitem);
        let to_variable = text_attribute(expression, "to_variable", workitem);
        let separator = text_attribute(expression, "value_separator", workitem)
            .map(Separator::Literal)
            .unwrap_or_default();

        let list = IterationSource::from_value(lookup_source(expression, workitem))
            .into_list(&separator);
        workitem.set_field(ITERATOR_COUNT, list.len());
        tracing::trace!(size = list.len(), "iteration list resolved");

        Self {
            list,
            index: 0,
            to_field,
            to_variable,
        }
    }

    /// Like [`new`](Self::new), but continue after the position recorded in
    /// `workitem[__ip__]`, if any.
    pub fn resume(expression: &impl LoopExpression, workitem: &mut Workitem) -> Self {
        let last = workitem
            .field(ITERATOR_POSITION)
            .and_then(Value::as_u64)
            .and_then(|p| usize::try_from(p).ok());
        let mut state = Self::new(expression, workitem);
        if let Some(last) = last {
            state.index = last.saturating_add(1).min(state.list.len());
        }
        state
    }

    pub fn has_next(&self) -> bool {
        self.index < self.list.len()
    }

    pub fn size(&self) -> usize {
        self.list.len()
    }

    /// Position of the element most recently handed out, if any.
    pub fn current_index(&self) -> Option<usize> {
        self.index.checked_sub(1)
    }

    /// Advance to the next element, or `None` once the list is exhausted.
    pub fn next(&mut self, workitem: &mut Workitem) -> Option<IterationStep> {
        self.position_at(workitem, self.index)
    }

    /// Restart from the first element.
    pub fn rewind(&mut self, workitem: &mut Workitem) -> Option<IterationStep> {
        self.position_at(workitem, 0)
    }

    /// Go to `target`, clamped to `0..=size`; `None` when that lands past the
    /// end.
    pub fn jump(&mut self, workitem: &mut Workitem, target: i64) -> Option<IterationStep> {
        let position = usize::try_from(target.max(0))
            .unwrap_or(usize::MAX)
            .min(self.list.len());
        self.position_at(workitem, position)
    }

    /// Move `offset` elements relative to the next position.
    pub fn skip(&mut self, workitem: &mut Workitem, offset: i64) -> Option<IterationStep> {
        let index = i64::try_from(self.index).unwrap_or(i64::MAX);
        self.jump(workitem, index.saturating_add(offset))
    }

    fn position_at(&mut self, workitem: &mut Workitem, position: usize) -> Option<IterationStep> {
        let value = self.list.get(position)?.clone();

        let variable = match &self.to_field {
            Some(field) => {
                workitem.set_field(field.clone(), value);
                None
            }
            None => self.to_variable.clone().map(|name| (name, value)),
        };
        workitem.set_field(ITERATOR_POSITION, position);
        self.index = position + 1;

        Some(IterationStep { position, variable })
    }
}

fn attribute(expression: &impl LoopExpression, name: &str, workitem: &Workitem) -> Option<Value> {
    expression
        .lookup_attribute(name, workitem)
        .or_else(|| expression.lookup_attribute(&name.replace('_', "-"), workitem))
        .filter(|value| !value.is_null())
}

fn text_attribute(expression: &impl LoopExpression, name: &str, workitem: &Workitem) -> Option<String> {
    attribute(expression, name, workitem).map(|value| match value {
        Value::String(text) => text,
        other => other.to_string(),
    })
}

fn lookup_source(expression: &impl LoopExpression, workitem: &Workitem) -> Option<Value> {
    attribute(expression, "on_value", workitem)
        .or_else(|| {
            text_attribute(expression, "on_field", workitem)
                .and_then(|field| workitem.field(&field).cloned())
        })
        .or_else(|| {
            text_attribute(expression, "on_variable", workitem)
                .and_then(|name| expression.lookup_variable(&name))
        })
        .or_else(|| attribute(expression, "on", workitem))
}
