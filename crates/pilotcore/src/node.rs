use crate::value::{Payload, PayloadExt};
use crate::{ExecutionId, NodeError, NodeId, NodeKind};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Executor strategy for one node kind.
#[async_trait]
pub trait NodeStrategy: Send + Sync {
    /// Kind this strategy serves.
    fn kind(&self) -> NodeKind;

    /// Run the node with its resolved inputs and configuration.
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError>;

    /// Description shown by node listings.
    fn info(&self) -> StrategyInfo {
        StrategyInfo::default()
    }
}

/// Human-facing description of a strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub description: String,
    pub category: String,
}

impl Default for StrategyInfo {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

impl StrategyInfo {
    pub fn new(description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
        }
    }
}

/// Everything a strategy gets to see for one invocation.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub node_id: NodeId,
    pub execution_id: ExecutionId,
    /// User who requested the run.
    pub user_id: String,
    /// Caller-supplied data for the run, surfaced by trigger nodes.
    pub trigger_data: Payload,
    /// Merged outputs of the node's direct predecessors.
    pub inputs: Payload,
    /// Static configuration for this node.
    pub config: Payload,
}

impl NodeContext {
    pub fn new(
        node_id: impl Into<NodeId>,
        execution_id: impl Into<ExecutionId>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            execution_id: execution_id.into(),
            user_id: user_id.into(),
            trigger_data: Payload::new(),
            inputs: Payload::new(),
            config: Payload::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Payload) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_trigger_data(mut self, trigger_data: Payload) -> Self {
        self.trigger_data = trigger_data;
        self
    }

    pub fn with_config(mut self, config: Payload) -> Self {
        self.config = config;
        self
    }

    /// Get a non-empty string config value or fail with `MissingConfig`.
    pub fn require_config_str(&self, name: &str) -> Result<&str, NodeError> {
        self.config
            .get_str(name)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| NodeError::MissingConfig(name.to_string()))
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }
}
