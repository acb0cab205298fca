use pilotcore::{
    Node, NodeContext, NodeError, NodeExecutionError, NodeKind, NodeStrategy, StrategyInfo,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of node strategies, keyed by node kind. Also the dispatcher:
/// [`NodeRegistry::dispatch`] routes a node to the strategy for its kind.
pub struct NodeRegistry {
    strategies: HashMap<NodeKind, Arc<dyn NodeStrategy>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register a strategy, replacing any previous one for the same kind.
    pub fn register(&mut self, strategy: Arc<dyn NodeStrategy>) {
        let kind = strategy.kind();
        tracing::info!("Registering node kind: {}", kind);
        self.strategies.insert(kind, strategy);
    }

    pub fn get(&self, kind: &NodeKind) -> Option<&Arc<dyn NodeStrategy>> {
        self.strategies.get(kind)
    }

    /// Get all registered node kinds
    pub fn list_node_kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.strategies.keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    /// Get metadata for a node kind
    pub fn info(&self, kind: &NodeKind) -> Option<StrategyInfo> {
        self.strategies.get(kind).map(|s| s.info())
    }

    /// Execute `node` with the strategy registered for its kind.
    pub async fn dispatch(
        &self,
        node: &Node,
        ctx: NodeContext,
    ) -> Result<Value, NodeExecutionError> {
        let fail = |cause: NodeError| NodeExecutionError::new(node.id.clone(), node.kind.clone(), cause);

        let strategy = match &node.kind {
            NodeKind::Trigger
            | NodeKind::AiText
            | NodeKind::AiImage
            | NodeKind::Webhook
            | NodeKind::Delay
            | NodeKind::Condition
            | NodeKind::Action
            | NodeKind::Loop => self.strategies.get(&node.kind),
            NodeKind::Other(_) => None,
        };

        let strategy = strategy
            .ok_or_else(|| fail(NodeError::UnsupportedNodeKind(node.kind.to_string())))?;

        tracing::debug!(node_id = %node.id, kind = %node.kind, "Dispatching node");

        strategy.execute(ctx).await.map_err(fail)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl NodeStrategy for Echo {
        fn kind(&self) -> NodeKind {
            NodeKind::Action
        }

        async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
            Ok(Value::Object(ctx.inputs))
        }
    }

    #[tokio::test]
    async fn unknown_and_unregistered_kinds_are_unsupported() {
        let registry = NodeRegistry::new();
        for kind in [NodeKind::Loop, NodeKind::Other("teleport".into())] {
            let node = Node::new("n", kind.clone());
            let err = registry
                .dispatch(&node, NodeContext::new("n", "e", "u"))
                .await
                .unwrap_err();
            assert_eq!(err.cause, NodeError::UnsupportedNodeKind(kind.to_string()));
            assert_eq!(err.node_id, "n");
        }
    }

    #[tokio::test]
    async fn registered_strategy_receives_inputs() {
        let mut registry = NodeRegistry::new();
        registry.register(Arc::new(Echo));

        let node = Node::new("n", NodeKind::Action);
        let ctx = NodeContext::new("n", "e", "u")
            .with_inputs(pilotcore::payload([("x", json!(1))]));
        let out = registry.dispatch(&node, ctx).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
        assert_eq!(registry.list_node_kinds(), vec![NodeKind::Action]);
    }
}
