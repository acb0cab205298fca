//! Workflow execution runtime
//!
//! This crate provides the planner, the input resolver, the node dispatcher
//! and the execution controller that runs a workflow node by node.

mod executor;
pub mod planner;
mod registry;
pub mod resolver;
mod runtime;

pub use executor::{ExecutionResult, RunOptions, WorkflowExecutor};
pub use planner::{plan, Plan};
pub use registry::NodeRegistry;
pub use resolver::resolve_inputs;
pub use runtime::{PilotRuntime, RunRequest, RunResponse, RuntimeConfig};
pub use tokio_util::sync::CancellationToken;
