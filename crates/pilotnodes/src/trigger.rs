use async_trait::async_trait;
use chrono::Utc;
use pilotcore::{NodeContext, NodeError, NodeKind, NodeStrategy, StrategyInfo};
use serde_json::{json, Value};

/// Entry node: records who started the run and when.
pub struct TriggerNode;

#[async_trait]
impl NodeStrategy for TriggerNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Trigger
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        tracing::debug!(node_id = %ctx.node_id, "Trigger fired by {}", ctx.user_id);

        let mut output = ctx.trigger_data;
        output.insert("triggeredAt".into(), json!(Utc::now().to_rfc3339()));
        output.insert("userId".into(), json!(ctx.user_id));
        output.insert("executionId".into(), json!(ctx.execution_id));

        Ok(Value::Object(output))
    }

    fn info(&self) -> StrategyInfo {
        StrategyInfo::new("Starts a workflow run and records run metadata", "trigger")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reports_run_metadata() {
        let ctx = NodeContext::new("t", "exec-9", "user-3");
        let out = TriggerNode.execute(ctx).await.unwrap();
        assert_eq!(out["userId"], json!("user-3"));
        assert_eq!(out["executionId"], json!("exec-9"));
        assert!(out["triggeredAt"].is_string());
    }

    #[tokio::test]
    async fn trigger_data_cannot_mask_metadata() {
        let data = pilotcore::payload([("text", json!("hello")), ("userId", json!("spoofed"))]);
        let ctx = NodeContext::new("t", "exec-9", "user-3").with_trigger_data(data);
        let out = TriggerNode.execute(ctx).await.unwrap();
        assert_eq!(out["text"], json!("hello"));
        assert_eq!(out["userId"], json!("user-3"));
    }
}
