use crate::{NodeId, RunFailure, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub type ExecutionId = String;

/// Lifecycle of a run: `queued -> running -> completed | failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Structural failures are detected before a run leaves `queued`, so
    /// `queued -> failed` is allowed as well.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Queued, Failed) | (Running, Running) | (Running, Completed) | (Running, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node counters carried by progress events and status writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCounts {
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
}

/// Run-scoped store of node results.
///
/// Append-only: each node id is written at most once. Iteration follows
/// insertion order, which is the plan order.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    order: Vec<NodeId>,
    results: HashMap<NodeId, Value>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result` for `node_id`. Returns `false` and leaves the store
    /// untouched when the node already has a result.
    pub fn insert(&mut self, node_id: impl Into<NodeId>, result: Value) -> bool {
        let node_id = node_id.into();
        if self.results.contains_key(&node_id) {
            return false;
        }
        self.order.push(node_id.clone());
        self.results.insert(node_id, result);
        true
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.results.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.results.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Value)> {
        self.order
            .iter()
            .filter_map(|id| self.results.get(id).map(|v| (id, v)))
    }

    /// Results keyed by node id, in plan order.
    pub fn to_map(&self) -> serde_json::Map<String, Value> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Partial set of fields written alongside a status change.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<NodeCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

impl ExecutionUpdate {
    pub fn counts(counts: NodeCounts) -> Self {
        Self {
            counts: Some(counts),
            ..Self::default()
        }
    }

    pub fn with_current_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.current_node = Some(node_id.into());
        self
    }

    pub fn with_results(mut self, results: serde_json::Map<String, Value>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_error(mut self, error: RunFailure) -> Self {
        self.error = Some(error);
        self
    }
}

/// Persisted view of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub status: ExecutionStatus,
    #[serde(flatten)]
    pub counts: NodeCounts,
    #[serde(default)]
    pub current_node: Option<NodeId>,
    #[serde(default)]
    pub results: serde_json::Map<String, Value>,
    #[serde(default)]
    pub error: Option<RunFailure>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(id: impl Into<ExecutionId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            workflow_id: None,
            user_id: None,
            status: ExecutionStatus::Queued,
            counts: NodeCounts::default(),
            current_node: None,
            results: serde_json::Map::new(),
            error: None,
            started_at: now,
            completed_at: None,
            duration_ms: None,
            updated_at: now,
        }
    }

    /// Apply a status write. Terminal states stamp completion time and
    /// duration.
    pub fn apply(&mut self, status: ExecutionStatus, update: ExecutionUpdate) {
        let now = Utc::now();
        self.status = status;
        if let Some(counts) = update.counts {
            self.counts = counts;
        }
        if update.current_node.is_some() {
            self.current_node = update.current_node;
        }
        if let Some(results) = update.results {
            self.results = results;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        if status.is_terminal() {
            self.completed_at = Some(now);
            self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        }
        self.updated_at = now;
    }
}
