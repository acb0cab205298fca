use crate::webhook::DEFAULT_TIMEOUT_MS;

/// Settings for the standard node set.
#[derive(Debug, Clone)]
pub struct NodesConfig {
    pub ai_text_endpoint: Option<String>,
    pub ai_image_endpoint: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_timeout_ms: u64,
    /// Used when a webhook node has no `timeout` of its own.
    pub webhook_timeout_ms: u64,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            ai_text_endpoint: None,
            ai_image_endpoint: None,
            ai_api_key: None,
            ai_timeout_ms: 60_000,
            webhook_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl NodesConfig {
    /// Read `PILOT_AI_TEXT_URL`, `PILOT_AI_IMAGE_URL`, `PILOT_AI_API_KEY` and
    /// `PILOT_AI_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            ai_text_endpoint: var("PILOT_AI_TEXT_URL"),
            ai_image_endpoint: var("PILOT_AI_IMAGE_URL"),
            ai_api_key: var("PILOT_AI_API_KEY"),
            ai_timeout_ms: var("PILOT_AI_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ai_timeout_ms),
            webhook_timeout_ms: defaults.webhook_timeout_ms,
        }
    }
}
