use crate::{ExecutionId, ExecutionStatus, NodeCounts, NodeId, NodeKind, PersistenceError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Progress events published while a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    #[serde(rename = "execution.progress", rename_all = "camelCase")]
    ExecutionProgress {
        execution_id: ExecutionId,
        status: ExecutionStatus,
        counts: NodeCounts,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_node: Option<NodeId>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "node.started", rename_all = "camelCase")]
    NodeStarted {
        execution_id: ExecutionId,
        node_id: NodeId,
        node_kind: NodeKind,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "node.completed", rename_all = "camelCase")]
    NodeCompleted {
        execution_id: ExecutionId,
        node_id: NodeId,
        result: Value,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "node.failed", rename_all = "camelCase")]
    NodeFailed {
        execution_id: ExecutionId,
        node_id: NodeId,
        error: ErrorDetail,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> &str {
        match self {
            ExecutionEvent::ExecutionProgress { execution_id, .. }
            | ExecutionEvent::NodeStarted { execution_id, .. }
            | ExecutionEvent::NodeCompleted { execution_id, .. }
            | ExecutionEvent::NodeFailed { execution_id, .. } => execution_id,
        }
    }

    /// Wire name of the event (`node.started`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionEvent::ExecutionProgress { .. } => "execution.progress",
            ExecutionEvent::NodeStarted { .. } => "node.started",
            ExecutionEvent::NodeCompleted { .. } => "node.completed",
            ExecutionEvent::NodeFailed { .. } => "node.failed",
        }
    }
}

/// Error payload of a `node.failed` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

/// Sink for progress events. Publishing is fire-and-forget from the
/// engine's point of view: an error is logged by the caller and ignored.
pub trait ProgressBroadcaster: Send + Sync {
    fn publish(&self, event: ExecutionEvent) -> Result<(), PersistenceError>;
}

/// In-process event bus backed by a broadcast channel.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl ProgressBroadcaster for EventBus {
    fn publish(&self, event: ExecutionEvent) -> Result<(), PersistenceError> {
        self.emit(event);
        Ok(())
    }
}

/// Writes every event to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBroadcaster;

impl ProgressBroadcaster for TracingBroadcaster {
    fn publish(&self, event: ExecutionEvent) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| PersistenceError::Broadcast(e.to_string()))?;
        tracing::info!(
            event = event.name(),
            execution_id = event.execution_id(),
            "{}",
            payload
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl ProgressBroadcaster for NoopBroadcaster {
    fn publish(&self, _event: ExecutionEvent) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Publishes to several broadcasters; the first error is reported after
/// every sink has been tried.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn ProgressBroadcaster>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressBroadcaster>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressBroadcaster for Fanout {
    fn publish(&self, event: ExecutionEvent) -> Result<(), PersistenceError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event.clone()) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_dotted_type_tags() {
        let event = ExecutionEvent::NodeStarted {
            execution_id: "exec-1".into(),
            node_id: "n1".into(),
            node_kind: NodeKind::Webhook,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], json!("node.started"));
        assert_eq!(json["executionId"], json!("exec-1"));
        assert_eq!(json["nodeKind"], json!("webhook"));
    }

    #[tokio::test]
    async fn fanout_reaches_every_subscriber() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let fanout = Fanout::new()
            .with(bus.clone())
            .with(Arc::new(NoopBroadcaster));

        fanout
            .publish(ExecutionEvent::ExecutionProgress {
                execution_id: "exec-1".into(),
                status: ExecutionStatus::Running,
                counts: NodeCounts::default(),
                current_node: None,
                timestamp: Utc::now(),
            })
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "execution.progress");
    }
}
