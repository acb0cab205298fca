use crate::{ExecutionResult, NodeRegistry, RunOptions, WorkflowExecutor};
use chrono::{DateTime, Utc};
use pilotcore::{
    EventBus, ExecutionEvent, ExecutionId, ExecutionStatus, ExecutionUpdate, Fanout, Payload,
    PersistenceError, ProgressBroadcaster, RunError, RunFailure, Workflow, WorkflowId,
    WorkflowStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Request to run a stored workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub workflow_id: WorkflowId,
    /// Generated when empty.
    #[serde(default)]
    pub execution_id: ExecutionId,
    pub user_id: String,
    /// Optional payload exposed through trigger nodes.
    #[serde(default)]
    pub trigger_data: Payload,
}

/// Envelope returned for every run request: either the results or a
/// structured failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub success: bool,
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunResponse {
    fn completed(result: ExecutionResult) -> Self {
        Self {
            success: true,
            execution_id: result.execution_id,
            results: Some(result.results.to_map()),
            error: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// Failure envelope for `error`, without results.
    pub fn failed(execution_id: ExecutionId, error: &RunError) -> Self {
        Self {
            success: false,
            execution_id,
            results: None,
            error: Some(error.to_failure()),
            completed_at: None,
        }
    }
}

/// Main entry point: fetches workflows from the store and runs them.
pub struct PilotRuntime {
    store: Arc<dyn WorkflowStore>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
}

impl PilotRuntime {
    /// Create a runtime that publishes to its own event bus only.
    pub fn new(
        registry: Arc<NodeRegistry>,
        store: Arc<dyn WorkflowStore>,
        config: RuntimeConfig,
    ) -> Self {
        Self::with_broadcasters(registry, store, config, Vec::new())
    }

    /// Create a runtime that publishes to its event bus and to `extra`.
    pub fn with_broadcasters(
        registry: Arc<NodeRegistry>,
        store: Arc<dyn WorkflowStore>,
        config: RuntimeConfig,
        extra: Vec<Arc<dyn ProgressBroadcaster>>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let fanout = extra
            .into_iter()
            .fold(Fanout::new().with(event_bus.clone()), Fanout::with);
        let executor = Arc::new(WorkflowExecutor::new(registry, store.clone(), Arc::new(fanout)));

        Self {
            store,
            executor,
            event_bus,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        self.executor.registry()
    }

    pub fn executor(&self) -> &Arc<WorkflowExecutor> {
        &self.executor
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Handle a run request. Never fails: errors come back inside the
    /// envelope.
    pub async fn handle(&self, mut request: RunRequest) -> RunResponse {
        if request.execution_id.trim().is_empty() {
            request.execution_id = Uuid::new_v4().to_string();
        }
        let execution_id = request.execution_id.clone();

        match self.execute_request(&request).await {
            Ok(result) => RunResponse::completed(result),
            Err(e) => RunResponse::failed(execution_id, &e),
        }
    }

    /// Fetch `request.workflow_id` from the store and run it.
    ///
    /// An execution id that has already finished is rejected without
    /// running anything.
    pub async fn execute_request(&self, request: &RunRequest) -> Result<ExecutionResult, RunError> {
        let options = RunOptions::new(request.execution_id.clone(), request.user_id.clone())
            .with_trigger_data(request.trigger_data.clone());

        if request.workflow_id.trim().is_empty() || request.user_id.trim().is_empty() {
            let err = RunError::InvalidRequest(
                "missing required fields: workflowId, userId".to_string(),
            );
            return Err(self.executor.abort(&options, err).await);
        }

        tracing::info!(
            workflow_id = %request.workflow_id,
            execution_id = %options.execution_id,
            "Executing workflow for user {}",
            request.user_id
        );

        match self
            .store
            .update_execution_status(
                &options.execution_id,
                ExecutionStatus::Queued,
                ExecutionUpdate::default(),
            )
            .await
        {
            Ok(()) => {}
            Err(PersistenceError::Conflict(reason)) => {
                tracing::warn!(execution_id = %options.execution_id, "Refusing to run again: {}", reason);
                return Err(RunError::InvalidRequest(format!(
                    "execution {} has already finished",
                    options.execution_id
                )));
            }
            Err(e) => {
                tracing::warn!(execution_id = %options.execution_id, "Failed to persist queued status: {}", e);
            }
        }

        let workflow = match self.store.get(&request.workflow_id).await {
            Ok(workflow) => workflow,
            Err(PersistenceError::NotFound(_)) => {
                let err = RunError::WorkflowNotFound(request.workflow_id.clone());
                return Err(self.executor.abort(&options, err).await);
            }
            Err(e) => return Err(self.executor.abort(&options, e.into()).await),
        };

        self.executor.run(&workflow, &options).await
    }

    /// Execute a workflow directly (without the store lookup)
    pub async fn execute(
        &self,
        workflow: &Workflow,
        options: &RunOptions,
    ) -> Result<ExecutionResult, RunError> {
        self.executor.run(workflow, options).await
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
}

impl RuntimeConfig {
    /// Read overrides from `PILOT_EVENT_BUFFER`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = std::env::var("PILOT_EVENT_BUFFER")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            config.event_buffer_size = size;
        }
        config
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}
