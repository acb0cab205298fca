use async_trait::async_trait;
use pilotcore::{NodeContext, NodeError, NodeKind, NodeStrategy, Payload, PayloadExt, StrategyInfo};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Sends the node's resolved inputs to an HTTP endpoint.
pub struct WebhookNode {
    client: reqwest::Client,
    default_timeout_ms: u64,
}

impl WebhookNode {
    pub fn new() -> Self {
        Self::with_default_timeout(DEFAULT_TIMEOUT_MS)
    }

    pub fn with_default_timeout(default_timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout_ms,
        }
    }
}

impl Default for WebhookNode {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(what: impl std::fmt::Display) -> NodeError {
    NodeError::InvalidConfig(what.to_string())
}

fn header_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), NodeError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| invalid(format!("header name '{}': {}", name, e)))?;
    let value =
        HeaderValue::from_str(value).map_err(|e| invalid(format!("header '{}': {}", name, e)))?;
    headers.insert(name, value);
    Ok(())
}

/// `Content-Type: application/json` overlaid with the configured headers.
fn build_headers(config: &Payload) -> Result<HeaderMap, NodeError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(custom) = config.get_object("headers") {
        for (name, value) in custom {
            let text = header_text(value)
                .ok_or_else(|| invalid(format!("header '{}' must be a scalar", name)))?;
            insert_header(&mut headers, name, &text)?;
        }
    }
    Ok(headers)
}

fn apply_authentication(
    request: reqwest::RequestBuilder,
    config: &Payload,
) -> Result<reqwest::RequestBuilder, NodeError> {
    let Some(auth) = config.get_object("authentication") else {
        return Ok(request);
    };
    let empty = Payload::new();
    let settings = auth.get_object("config").unwrap_or(&empty);
    let field = |name: &str| {
        settings
            .get_str(name)
            .ok_or_else(|| NodeError::MissingConfig(format!("authentication.config.{}", name)))
    };

    match auth.get_str("type").unwrap_or("none") {
        "none" => Ok(request),
        "basic" => Ok(request.basic_auth(field("username")?, settings.get_str("password"))),
        "bearer" => Ok(request.bearer_auth(field("token")?)),
        "api_key" => {
            let header = settings.get_str("header").unwrap_or("X-API-Key");
            let mut headers = HeaderMap::new();
            insert_header(&mut headers, header, field("key")?)?;
            Ok(request.headers(headers))
        }
        other => Err(invalid(format!("unsupported authentication type: {}", other))),
    }
}

#[async_trait]
impl NodeStrategy for WebhookNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Webhook
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let url = ctx.require_config_str("url")?;
        let url = reqwest::Url::parse(url).map_err(|e| invalid(format!("url '{}': {}", url, e)))?;

        let method_name = ctx.config.get_str("method").unwrap_or("POST").to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| invalid(format!("unsupported method: {}", method_name)))?;
        let timeout_ms = ctx
            .config
            .get_u64("timeout")
            .unwrap_or(self.default_timeout_ms);

        tracing::info!(node_id = %ctx.node_id, "{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(build_headers(&ctx.config)?)
            .timeout(Duration::from_millis(timeout_ms));

        if method != Method::GET && method != Method::HEAD {
            let body = serde_json::to_vec(&ctx.inputs)
                .map_err(|e| invalid(format!("inputs are not serializable: {}", e)))?;
            request = request.body(body);
        }
        let request = apply_authentication(request, &ctx.config)?;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NodeError::NetworkError(format!("Webhook timed out after {}ms: {}", timeout_ms, e))
            } else {
                NodeError::NetworkError(format!("Webhook request failed: {}", e))
            }
        })?;

        let status = response.status();
        let headers: serde_json::Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()),
                )
            })
            .collect();

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::NetworkError(format!("Failed to read response: {}", e)))?;
        let data = serde_json::from_str(&body_text).unwrap_or(Value::String(body_text));

        tracing::info!(node_id = %ctx.node_id, "Response status: {}", status);

        Ok(json!({
            "status": status.as_u16(),
            "statusText": status.canonical_reason().unwrap_or(""),
            "headers": headers,
            "data": data,
            "success": status.is_success(),
        }))
    }

    fn info(&self) -> StrategyInfo {
        StrategyInfo::new("Send the node inputs to an HTTP endpoint", "http")
    }
}
