//! Core abstractions for the PromptPilot workflow engine
//!
//! This crate provides the graph model, the execution data model, the error
//! taxonomy and the collaborator traits (store, broadcaster, node strategy)
//! that the runtime and node crates build on.

mod error;
pub mod events;
mod execution;
mod graph;
mod node;
pub mod store;
mod value;
mod workflow;

pub use error::{
    CycleDetected, GraphError, NodeError, NodeExecutionError, PersistenceError, RunError,
    RunFailure,
};
pub use events::*;
pub use execution::{
    ExecutionId, ExecutionRecord, ExecutionStatus, ExecutionUpdate, NodeCounts, ResultStore,
};
pub use graph::WorkflowGraph;
pub use node::{NodeContext, NodeStrategy, StrategyInfo};
pub use store::{InMemoryStore, LogEntry, LogLevel, WorkflowStore, WORKFLOW_LOG_NODE};
pub use value::{payload, Payload, PayloadExt};
pub use workflow::{Edge, Node, NodeId, NodeKind, Position, Workflow, WorkflowId, WorkflowStatus};

/// Result type for run-level operations
pub type Result<T> = std::result::Result<T, RunError>;
