//! Identity and payload types for running process instances.
//!
//! A `FlowExpressionId` (fei) names one live expression inside one process
//! instance; a `Workitem` is the data that flows between expressions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Separator between a parent workflow instance id and a sub-process suffix.
pub const SUB_WFID_SEPARATOR: char = '_';

/// The top-level process instance id of `wfid` (`wf_2` -> `wf`).
pub fn parent_wfid_of(wfid: &str) -> &str {
    wfid.split_once(SUB_WFID_SEPARATOR)
        .map_or(wfid, |(parent, _)| parent)
}

// ---------------------------------------------------------------------------
// FlowExpressionId
// ---------------------------------------------------------------------------

/// Identifier of a live expression instance.
///
/// Sub-process instances carry a `wfid` of the form `<parent>_<n>`, so the
/// owning (parent) workflow instance id can always be derived from the `wfid`
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowExpressionId {
    pub engine_id: String,
    pub wfid: String,
    pub expid: String,
}

impl FlowExpressionId {
    pub fn new(
        engine_id: impl Into<String>,
        wfid: impl Into<String>,
        expid: impl Into<String>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            wfid: wfid.into(),
            expid: expid.into(),
        }
    }

    /// Root expression of a freshly launched process instance.
    pub fn launch(engine_id: impl Into<String>) -> Self {
        Self::new(engine_id, Uuid::now_v7().simple().to_string(), "0")
    }

    /// Id of the top-level process instance this expression belongs to.
    ///
    /// Equal to `wfid` for top-level instances.
    pub fn parent_wfid(&self) -> &str {
        parent_wfid_of(&self.wfid)
    }

    /// True when this expression runs inside a sub-process instance.
    pub fn is_in_subprocess(&self) -> bool {
        self.parent_wfid() != self.wfid
    }

    /// Id of the `index`-th child expression (`0.1` -> `0.1.2`).
    pub fn child(&self, index: usize) -> Self {
        Self::new(
            self.engine_id.clone(),
            self.wfid.clone(),
            format!("{}.{index}", self.expid),
        )
    }

    /// Root expression of the `n`-th sub-process instance spawned under this one.
    pub fn subprocess(&self, n: usize) -> Self {
        Self::new(
            self.engine_id.clone(),
            format!("{}{SUB_WFID_SEPARATOR}{n}", self.parent_wfid()),
            "0",
        )
    }
}

impl fmt::Display for FlowExpressionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.engine_id, self.wfid, self.expid)
    }
}

// ---------------------------------------------------------------------------
// Workitem
// ---------------------------------------------------------------------------

/// The mutable payload carried through a process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workitem {
    pub fei: FlowExpressionId,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Workitem {
    pub fn new(fei: FlowExpressionId) -> Self {
        Self {
            fei,
            attributes: Map::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }
}

// ---------------------------------------------------------------------------
// ExpressionHandle
// ---------------------------------------------------------------------------

/// A lightweight reference to a stored expression, as returned by storage
/// queries and carried in queue messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionHandle {
    pub fei: FlowExpressionId,
    /// Expression name (e.g. "sequence", "participant").
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parent_wfid_of_top_level_instance_is_wfid() {
        let fei = FlowExpressionId::new("engine", "20091016-abc", "0.1");
        assert_eq!(fei.parent_wfid(), "20091016-abc");
        assert!(!fei.is_in_subprocess());
    }

    #[test]
    fn test_parent_wfid_of_subprocess() {
        let fei = FlowExpressionId::new("engine", "20091016-abc_2", "0");
        assert_eq!(fei.parent_wfid(), "20091016-abc");
        assert!(fei.is_in_subprocess());
    }

    #[test]
    fn test_subprocess_and_child_ids() {
        let root = FlowExpressionId::new("engine", "wf", "0");
        assert_eq!(root.child(1).expid, "0.1");
        assert_eq!(root.child(1).child(0).expid, "0.1.0");

        let sub = root.child(3).subprocess(1);
        assert_eq!(sub.wfid, "wf_1");
        assert_eq!(sub.subprocess(2).wfid, "wf_2");
    }

    #[test]
    fn test_equality_requires_all_fields() {
        let a = FlowExpressionId::new("engine", "wf", "0.1");
        assert_eq!(a, FlowExpressionId::new("engine", "wf", "0.1"));
        assert_ne!(a, FlowExpressionId::new("other", "wf", "0.1"));
        assert_ne!(a, FlowExpressionId::new("engine", "wf_0", "0.1"));
        assert_ne!(a, FlowExpressionId::new("engine", "wf", "0.2"));
    }

    #[test]
    fn test_launch_generates_distinct_wfids() {
        let a = FlowExpressionId::launch("engine");
        let b = FlowExpressionId::launch("engine");
        assert_ne!(a.wfid, b.wfid);
        assert_eq!(a.expid, "0");
        assert!(!a.wfid.contains(SUB_WFID_SEPARATOR));
    }

    #[test]
    fn test_display() {
        let fei = FlowExpressionId::new("engine", "wf", "0.0");
        assert_eq!(fei.to_string(), "engine|wf|0.0");
    }

    #[test]
    fn test_workitem_fields_and_json_roundtrip() {
        let mut wi = Workitem::new(FlowExpressionId::new("engine", "wf", "0"));
        wi.set_field("customer", "acme");
        assert_eq!(wi.field("customer"), Some(&json!("acme")));

        let json = serde_json::to_string(&wi).unwrap();
        let back: Workitem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wi);

        assert_eq!(wi.remove_field("customer"), Some(json!("acme")));
        assert!(wi.field("customer").is_none());
    }
}
