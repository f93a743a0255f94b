//! Recorded execution failures.
//!
//! A `ProcessError` bundles the queue message whose processing failed, the
//! failure captured as plain data, and the capture time. Replaying the error
//! means re-emitting `message` onto the work queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::JournalError;
use crate::event::{Direction, QueueMessage};
use crate::flow::{FlowExpressionId, Workitem};
use crate::tree::Node;

/// A failure captured as data: kind name, message and backtrace frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub trace: Vec<String>,
}

/// Snapshot of one failure inside a process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessError {
    fei: FlowExpressionId,
    message: QueueMessage,
    error: ErrorInfo,
    at: DateTime<Utc>,
}

impl ProcessError {
    pub fn new(
        fei: FlowExpressionId,
        message: QueueMessage,
        error: ErrorInfo,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            fei,
            message,
            error,
            at,
        }
    }

    /// When the failure was captured.
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// The work-queue message whose processing failed.
    pub fn message(&self) -> &QueueMessage {
        &self.message
    }

    pub fn direction(&self) -> Direction {
        self.message.direction
    }

    /// The failing expression.
    pub fn fei(&self) -> &FlowExpressionId {
        &self.fei
    }

    pub fn wfid(&self) -> &str {
        &self.fei.wfid
    }

    pub fn tree(&self) -> Option<&Node> {
        self.message.payload.tree.as_ref()
    }

    pub fn workitem(&self) -> Option<&Workitem> {
        self.message.payload.workitem.as_ref()
    }

    pub fn error(&self) -> &ErrorInfo {
        &self.error
    }

    pub fn error_kind(&self) -> &str {
        &self.error.kind
    }

    pub fn error_message(&self) -> &str {
        &self.error.message
    }

    pub fn error_trace(&self) -> &[String] {
        &self.error.trace
    }

    /// Replace the tree the failed message carries, ahead of a replay.
    ///
    /// Fails when the message had no tree to begin with.
    pub fn set_tree(&mut self, tree: Node) -> Result<(), JournalError> {
        match self.message.payload.tree.as_mut() {
            Some(current) => {
                *current = tree;
                Ok(())
            }
            None => Err(JournalError::NoTreeToOverride),
        }
    }

    /// Plain-data view for export (admin tools, HTTP, logs).
    ///
    /// Always has `fei`, `error` (`[kind, message, first frame]`) and
    /// `direction`; `workitem` and `tree` only when `short` is false.
    pub fn to_export_map(&self, short: bool) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("fei".to_string(), json!(self.fei));
        map.insert(
            "error".to_string(),
            json!([
                self.error.kind,
                self.error.message,
                self.error.trace.first(),
            ]),
        );
        map.insert("direction".to_string(), json!(self.direction().to_string()));

        if short {
            return map;
        }

        map.insert("workitem".to_string(), json!(self.workitem()));
        map.insert("tree".to_string(), json!(self.tree()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MessagePayload;

    fn sample_error() -> ProcessError {
        let fei = FlowExpressionId::new("engine", "wf", "0.1");
        let mut wi = Workitem::new(fei.clone());
        wi.set_field("order", 42);
        let message = QueueMessage::apply(fei.clone(), Node::new("participant").with_child("alice"), wi);
        let error = ErrorInfo {
            kind: "ParticipantNotFound".to_string(),
            message: "no participant named 'alice'".to_string(),
            trace: vec!["frame-0".to_string(), "frame-1".to_string()],
        };
        ProcessError::new(fei, message, error, Utc::now())
    }

    #[test]
    fn test_accessors() {
        let err = sample_error();
        assert_eq!(err.direction(), Direction::Apply);
        assert_eq!(err.wfid(), "wf");
        assert_eq!(err.fei().expid, "0.1");
        assert_eq!(err.tree().unwrap().name, "participant");
        assert_eq!(err.workitem().unwrap().field("order"), Some(&json!(42)));
        assert_eq!(err.error_kind(), "ParticipantNotFound");
        assert_eq!(err.error_message(), "no participant named 'alice'");
        assert_eq!(err.error_trace().len(), 2);
    }

    #[test]
    fn test_set_tree_overrides_message_tree() {
        let mut err = sample_error();
        err.set_tree(Node::new("participant").with_child("bob")).unwrap();
        assert_eq!(err.tree().unwrap().first_text(), Some("bob"));
        assert_eq!(err.message().payload.tree.as_ref().unwrap().first_text(), Some("bob"));
    }

    #[test]
    fn test_set_tree_without_tree_fails() {
        let fei = FlowExpressionId::new("engine", "wf", "0.1");
        let message = QueueMessage::new(
            Direction::Reply,
            MessagePayload {
                workitem: Some(Workitem::new(fei.clone())),
                ..MessagePayload::default()
            },
        );
        let info = ErrorInfo { kind: "E".into(), message: "m".into(), trace: vec![] };
        let mut err = ProcessError::new(fei, message, info, Utc::now());

        let result = err.set_tree(Node::new("noop"));
        assert!(matches!(result, Err(JournalError::NoTreeToOverride)));
        assert!(err.tree().is_none());
    }

    #[test]
    fn test_export_map_short_form() {
        let map = sample_error().to_export_map(true);
        assert_eq!(map.len(), 3);
        assert_eq!(
            map["error"],
            json!(["ParticipantNotFound", "no participant named 'alice'", "frame-0"])
        );
        assert_eq!(map["direction"], json!("apply"));
        assert_eq!(map["fei"]["wfid"], json!("wf"));
    }

    #[test]
    fn test_export_map_long_form() {
        let map = sample_error().to_export_map(false);
        assert_eq!(map["tree"], json!(["participant", {}, ["alice"]]));
        assert_eq!(map["workitem"]["attributes"]["order"], json!(42));
    }

    #[test]
    fn test_export_map_without_trace_has_null_frame() {
        let mut err = sample_error();
        err.error.trace.clear();
        let map = err.to_export_map(true);
        assert_eq!(map["error"][2], Value::Null);
    }
}
