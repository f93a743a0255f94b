//! Event types for the Tessera engine event bus.
//!
//! Workers publish `EngineEvent`s on a broadcast bus. Failures travel on the
//! `errors` topic together with the queue message that was being processed,
//! so the error journal can later re-emit that exact message onto the work
//! queue.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::{ExpressionHandle, FlowExpressionId, Workitem};
use crate::process_error::ErrorInfo;
use crate::tree::Node;

// ---------------------------------------------------------------------------
// Queue messages
// ---------------------------------------------------------------------------

/// What a work-queue message asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Launch,
    Apply,
    Reply,
    Cancel,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Launch => write!(f, "launch"),
            Direction::Apply => write!(f, "apply"),
            Direction::Reply => write!(f, "reply"),
            Direction::Cancel => write!(f, "cancel"),
        }
    }
}

/// Payload of a work-queue message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fei: Option<FlowExpressionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wfid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workitem: Option<Workitem>,
    /// The expression the message is about, when the sender had one at hand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<ExpressionHandle>,
}

impl MessagePayload {
    /// The expression this message targets: the explicit fei first, then the
    /// referenced expression's fei, then the workitem's fei.
    pub fn target_fei(&self) -> Option<&FlowExpressionId> {
        self.fei
            .as_ref()
            .or_else(|| self.expression.as_ref().map(|exp| &exp.fei))
            .or_else(|| self.workitem.as_ref().map(|wi| &wi.fei))
    }
}

/// A message on the engine's work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub direction: Direction,
    pub payload: MessagePayload,
}

impl QueueMessage {
    pub fn new(direction: Direction, payload: MessagePayload) -> Self {
        Self { direction, payload }
    }

    /// An `apply` message for the expression `fei`.
    pub fn apply(fei: FlowExpressionId, tree: Node, workitem: Workitem) -> Self {
        Self::new(
            Direction::Apply,
            MessagePayload {
                wfid: Some(fei.wfid.clone()),
                fei: Some(fei),
                tree: Some(tree),
                workitem: Some(workitem),
                expression: None,
            },
        )
    }

    /// A `reply` message handing `workitem` back to its expression.
    pub fn reply(workitem: Workitem) -> Self {
        Self::new(
            Direction::Reply,
            MessagePayload {
                wfid: Some(workitem.fei.wfid.clone()),
                workitem: Some(workitem),
                ..MessagePayload::default()
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

/// A live failure as raised by an expression, before it is journaled.
///
/// Faults are shared on the bus as-is; the journal turns them into plain
/// [`ErrorInfo`] data when it records them.
#[derive(Clone)]
pub struct Fault {
    kind: String,
    error: Arc<dyn std::error::Error + Send + Sync>,
    backtrace: Arc<Backtrace>,
}

/// Failure reported as plain strings (e.g. by a remote worker).
#[derive(Debug)]
struct ReportedFault(String);

impl fmt::Display for ReportedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ReportedFault {}

impl Fault {
    /// Wrap an error, recording its type name and (when enabled through
    /// `RUST_BACKTRACE`) a backtrace.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: std::any::type_name::<E>().to_string(),
            error: Arc::new(error),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// A fault known only by its kind and message.
    pub fn from_parts(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            error: Arc::new(ReportedFault(message.into())),
            backtrace: Arc::new(Backtrace::disabled()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Snapshot the fault as plain data: kind, message and backtrace frames.
    pub fn capture(&self) -> ErrorInfo {
        let trace = match self.backtrace.status() {
            BacktraceStatus::Captured => self
                .backtrace
                .to_string()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };
        ErrorInfo {
            kind: self.kind.clone(),
            message: self.message(),
            trace,
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("kind", &self.kind)
            .field("message", &self.error.to_string())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Engine events
// ---------------------------------------------------------------------------

/// Topics of the engine event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    Errors,
    WorkQueue,
}

/// Events broadcast on the engine event bus.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Processing `message` failed with `fault`.
    ExpressionFailed { message: QueueMessage, fault: Fault },

    /// Any error recorded for `fei` is obsolete (e.g. the expression was cancelled).
    ErrorRemoved { fei: FlowExpressionId },

    /// A message was placed on the work queue.
    Dispatched(QueueMessage),
}

impl EngineEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            EngineEvent::ExpressionFailed { .. } | EngineEvent::ErrorRemoved { .. } => {
                EventTopic::Errors
            }
            EngineEvent::Dispatched(_) => EventTopic::WorkQueue,
        }
    }

    /// Short event tag, used in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            EngineEvent::ExpressionFailed { .. } => "failed",
            EngineEvent::ErrorRemoved { .. } => "remove",
            EngineEvent::Dispatched(_) => "dispatched",
        }
    }
}
