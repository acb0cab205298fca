//! Standard node library
//!
//! Strategies for the built-in node kinds: trigger, ai-text, ai-image,
//! webhook and delay.

mod ai;
mod config;
mod delay;
mod trigger;
mod webhook;

pub use ai::{AiNode, AiOperations, AiRequest, AiResponse, AiTarget, HttpAiOperations};
pub use config::NodesConfig;
pub use delay::{delay_ms, DelayNode};
pub use trigger::TriggerNode;
pub use webhook::WebhookNode;
use pilotruntime::NodeRegistry;

use std::sync::Arc;

/// Register the nodes that need no external collaborator.
pub fn register_core(registry: &mut NodeRegistry, config: &NodesConfig) {
    registry.register(Arc::new(TriggerNode));
    registry.register(Arc::new(WebhookNode::with_default_timeout(
        config.webhook_timeout_ms,
    )));
    registry.register(Arc::new(DelayNode));
}

/// Register the AI nodes against the given collaborators.
pub fn register_ai(
    registry: &mut NodeRegistry,
    text: Arc<dyn AiOperations>,
    image: Arc<dyn AiOperations>,
) {
    registry.register(Arc::new(AiNode::text(text)));
    registry.register(Arc::new(AiNode::image(image)));
}

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry, config: &NodesConfig) {
    register_core(registry, config);
    register_ai(
        registry,
        Arc::new(HttpAiOperations::new(
            config.ai_text_endpoint.clone(),
            config.ai_api_key.clone(),
            config.ai_timeout_ms,
        )),
        Arc::new(HttpAiOperations::new(
            config.ai_image_endpoint.clone(),
            config.ai_api_key.clone(),
            config.ai_timeout_ms,
        )),
    );
}
