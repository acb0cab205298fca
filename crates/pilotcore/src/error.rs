use crate::{NodeId, NodeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level failure of a run. The execution controller is the only place
/// that turns one of these into a persisted `failed` status.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Cycle(#[from] CycleDetected),

    #[error(transparent)]
    Node(#[from] NodeExecutionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Run cancelled before node {0}")]
    Cancelled(NodeId),
}

impl RunError {
    /// Stable machine-readable code for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::InvalidRequest(_) => "run.invalid_request",
            RunError::WorkflowNotFound(_) => "run.workflow_not_found",
            RunError::Graph(e) => e.kind(),
            RunError::Cycle(_) => "plan.cycle_detected",
            RunError::Node(e) => e.cause.kind(),
            RunError::Persistence(e) => e.kind(),
            RunError::Cancelled(_) => "run.cancelled",
        }
    }

    /// Node the failure is attributed to, when there is one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            RunError::Node(e) => Some(&e.node_id),
            RunError::Cycle(e) => Some(&e.node_id),
            RunError::Cancelled(id) => Some(id),
            _ => None,
        }
    }

    pub fn to_failure(&self) -> RunFailure {
        RunFailure {
            code: self.kind().to_string(),
            message: self.to_string(),
            node_id: self.node_id().map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Structural problems found while building the graph model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Workflow has no nodes")]
    Empty,

    #[error("Edge {from} -> {to} references unknown node {missing}")]
    DanglingEdge {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("No starting node (every node has an incoming edge)")]
    NoStart,
}

impl GraphError {
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::Empty => "graph.empty",
            GraphError::DanglingEdge { .. } => "graph.dangling_edge",
            GraphError::DuplicateNode(_) => "graph.duplicate_node",
            GraphError::NoStart => "graph.no_start",
        }
    }
}

/// Raised by the planner when the dependency walk re-enters a node that is
/// still on the traversal stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Circular dependency detected at node {node_id}")]
pub struct CycleDetected {
    pub node_id: NodeId,
}

/// Failure reported by a node strategy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unsupported node kind: {0}")]
    UnsupportedNodeKind(String),

    #[error("Upstream operation failed: {0}")]
    UpstreamError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl NodeError {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::MissingInput(_) => "node.missing_input",
            NodeError::MissingConfig(_) => "node.missing_config",
            NodeError::InvalidConfig(_) => "node.invalid_config",
            NodeError::UnsupportedNodeKind(_) => "node.unsupported_kind",
            NodeError::UpstreamError(_) => "node.upstream_error",
            NodeError::NetworkError(_) => "node.network_error",
        }
    }
}

/// A [`NodeError`] attributed to the node that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Node {node_id} ({node_kind}) failed: {cause}")]
pub struct NodeExecutionError {
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    #[source]
    pub cause: NodeError,
}

impl NodeExecutionError {
    pub fn new(node_id: impl Into<NodeId>, node_kind: NodeKind, cause: NodeError) -> Self {
        Self {
            node_id: node_id.into(),
            node_kind,
            cause,
        }
    }
}

/// Errors from the store and broadcast collaborators. Only the initial
/// workflow fetch lets one of these fail a run.
#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    /// The record exists and may no longer be written to.
    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),
}

impl PersistenceError {
    pub fn kind(&self) -> &'static str {
        match self {
            PersistenceError::NotFound(_) => "persistence.not_found",
            PersistenceError::Store(_) => "persistence.store",
            PersistenceError::Conflict(_) => "persistence.conflict",
            PersistenceError::Broadcast(_) => "persistence.broadcast",
        }
    }
}

/// Serialisable failure record, persisted on the execution and returned to
/// callers of the run entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub timestamp: DateTime<Utc>,
}
