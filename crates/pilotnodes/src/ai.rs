use async_trait::async_trait;
use pilotcore::{NodeContext, NodeError, NodeKind, NodeStrategy, Payload, PayloadExt, StrategyInfo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Request sent to an AI operation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRequest {
    pub operation: String,
    pub input: String,
    pub config: Payload,
}

/// Envelope returned by an AI operation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// External text/image AI operation.
#[async_trait]
pub trait AiOperations: Send + Sync {
    async fn call(&self, request: AiRequest) -> Result<AiResponse, NodeError>;
}

/// Which AI surface a node talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiTarget {
    Text,
    Image,
}

impl AiTarget {
    fn kind(self) -> NodeKind {
        match self {
            AiTarget::Text => NodeKind::AiText,
            AiTarget::Image => NodeKind::AiImage,
        }
    }

    fn default_operation(self) -> &'static str {
        match self {
            AiTarget::Text => "summarize",
            AiTarget::Image => "generate",
        }
    }

    /// Input keys searched for the prompt, in order of preference.
    fn input_keys(self) -> &'static [&'static str] {
        match self {
            AiTarget::Text => &["text", "input"],
            AiTarget::Image => &["text", "input", "prompt"],
        }
    }

    fn default_config(self) -> Payload {
        let defaults = match self {
            AiTarget::Text => json!({
                "model": "gpt-3.5-turbo",
                "maxTokens": 1000,
                "temperature": 0.7,
            }),
            AiTarget::Image => json!({
                "model": "dall-e-3",
                "size": "1024x1024",
                "quality": "standard",
            }),
        };
        match defaults {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }
}

/// ai-text / ai-image node: builds a request from the resolved inputs and
/// delegates to an [`AiOperations`] collaborator.
pub struct AiNode {
    target: AiTarget,
    operations: Arc<dyn AiOperations>,
}

impl AiNode {
    pub fn text(operations: Arc<dyn AiOperations>) -> Self {
        Self {
            target: AiTarget::Text,
            operations,
        }
    }

    pub fn image(operations: Arc<dyn AiOperations>) -> Self {
        Self {
            target: AiTarget::Image,
            operations,
        }
    }

    /// Build the collaborator request; defaults first, node config on top.
    pub fn build_request(&self, inputs: &Payload, config: &Payload) -> Result<AiRequest, NodeError> {
        let input = inputs
            .first_non_empty_str(self.target.input_keys())
            .ok_or_else(|| NodeError::MissingInput("text".to_string()))?;

        let operation = inputs
            .get_str("operation")
            .filter(|s| !s.is_empty())
            .unwrap_or(self.target.default_operation());

        let mut merged = self.target.default_config();
        for (key, value) in config {
            merged.insert(key.clone(), value.clone());
        }

        Ok(AiRequest {
            operation: operation.to_string(),
            input: input.to_string(),
            config: merged,
        })
    }
}

#[async_trait]
impl NodeStrategy for AiNode {
    fn kind(&self) -> NodeKind {
        self.target.kind()
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let request = self.build_request(&ctx.inputs, &ctx.config)?;

        tracing::info!(
            node_id = %ctx.node_id,
            operation = %request.operation,
            "Calling {} operation",
            self.target.kind()
        );

        let response = self.operations.call(request).await?;
        if !response.success {
            let message = response
                .error
                .unwrap_or_else(|| format!("{} operation failed", self.target.kind()));
            return Err(NodeError::UpstreamError(message));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    fn info(&self) -> StrategyInfo {
        match self.target {
            AiTarget::Text => StrategyInfo::new(
                "Summarize, translate, classify or generate text with an AI model",
                "ai",
            ),
            AiTarget::Image => StrategyInfo::new("Generate or edit images with an AI model", "ai"),
        }
    }
}

/// Collaborator that posts the request JSON to an HTTP endpoint.
pub struct HttpAiOperations {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpAiOperations {
    pub fn new(endpoint: Option<String>, api_key: Option<String>, timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait]
impl AiOperations for HttpAiOperations {
    async fn call(&self, request: AiRequest) -> Result<AiResponse, NodeError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| NodeError::UpstreamError("AI endpoint not configured".to_string()))?;

        let mut builder = self.client.post(endpoint).timeout(self.timeout).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NodeError::UpstreamError(format!("AI request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NodeError::UpstreamError(format!("Failed to read AI response: {}", e)))?;

        if !status.is_success() {
            return Err(NodeError::UpstreamError(format!(
                "AI operation returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| NodeError::UpstreamError(format!("Malformed AI response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilotcore::payload;

    struct Unreachable;

    #[async_trait]
    impl AiOperations for Unreachable {
        async fn call(&self, _request: AiRequest) -> Result<AiResponse, NodeError> {
            unreachable!("request should not be sent")
        }
    }

    #[test]
    fn text_is_preferred_over_input() {
        let node = AiNode::text(Arc::new(Unreachable));
        let inputs = payload([("text", json!("from text")), ("input", json!("from input"))]);
        let req = node.build_request(&inputs, &Payload::new()).unwrap();
        assert_eq!(req.input, "from text");
        assert_eq!(req.operation, "summarize");

        let inputs = payload([("input", json!("fallback"))]);
        assert_eq!(node.build_request(&inputs, &Payload::new()).unwrap().input, "fallback");
    }

    #[test]
    fn node_config_overrides_defaults() {
        let node = AiNode::text(Arc::new(Unreachable));
        let inputs = payload([("text", json!("hi")), ("operation", json!("translate"))]);
        let config = payload([("model", json!("gpt-4")), ("language", json!("French"))]);

        let req = node.build_request(&inputs, &config).unwrap();
        assert_eq!(req.operation, "translate");
        assert_eq!(req.config["model"], json!("gpt-4"));
        assert_eq!(req.config["maxTokens"], json!(1000));
        assert_eq!(req.config["language"], json!("French"));
    }

    #[test]
    fn image_accepts_prompt_input() {
        let node = AiNode::image(Arc::new(Unreachable));
        let inputs = payload([("prompt", json!("a lighthouse at dusk"))]);
        let req = node.build_request(&inputs, &Payload::new()).unwrap();
        assert_eq!(req.operation, "generate");
        assert_eq!(req.config["size"], json!("1024x1024"));
    }

    #[tokio::test]
    async fn empty_text_is_missing_input() {
        let node = AiNode::text(Arc::new(Unreachable));
        let ctx = NodeContext::new("s", "e", "u").with_inputs(payload([("text", json!(""))]));
        let err = node.execute(ctx).await.unwrap_err();
        assert_eq!(err, NodeError::MissingInput("text".to_string()));
    }

    #[tokio::test]
    async fn unconfigured_endpoint_is_upstream_error() {
        let ops = HttpAiOperations::new(None, None, 1_000);
        let req = AiRequest {
            operation: "summarize".into(),
            input: "x".into(),
            config: Payload::new(),
        };
        assert!(matches!(ops.call(req).await, Err(NodeError::UpstreamError(_))));
    }
}
