use crate::planner::{self, Plan};
use crate::registry::NodeRegistry;
use crate::resolver::resolve_inputs;
use chrono::Utc;
use pilotcore::{
    ErrorDetail, ExecutionEvent, ExecutionId, ExecutionStatus, ExecutionUpdate, LogEntry,
    LogLevel, Node, NodeContext, NodeCounts, Payload, ProgressBroadcaster, ResultStore,
    RunError, Workflow, WorkflowGraph, WorkflowStore, WORKFLOW_LOG_NODE,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-run parameters supplied by the caller.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub execution_id: ExecutionId,
    pub user_id: String,
    /// Handed to every node; trigger nodes include it in their output.
    pub trigger_data: Payload,
    /// Checked between nodes; a cancelled run fails before its next node.
    pub cancellation: CancellationToken,
}

impl RunOptions {
    pub fn new(execution_id: impl Into<ExecutionId>, user_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            user_id: user_id.into(),
            trigger_data: Payload::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_trigger_data(mut self, trigger_data: Payload) -> Self {
        self.trigger_data = trigger_data;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub results: ResultStore,
    pub counts: NodeCounts,
    pub duration_ms: u64,
}

/// Runs one workflow at a time, strictly sequentially in plan order.
///
/// The executor itself is stateless and can be shared between concurrent
/// runs; every run owns its own `RunState`.
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
    store: Arc<dyn WorkflowStore>,
    broadcaster: Arc<dyn ProgressBroadcaster>,
}

/// Mutable state of a single run. Only the executor touches it.
struct RunState {
    execution_id: ExecutionId,
    user_id: String,
    status: ExecutionStatus,
    counts: NodeCounts,
    results: ResultStore,
    started: Instant,
}

impl WorkflowExecutor {
    pub fn new(
        registry: Arc<NodeRegistry>,
        store: Arc<dyn WorkflowStore>,
        broadcaster: Arc<dyn ProgressBroadcaster>,
    ) -> Self {
        Self {
            registry,
            store,
            broadcaster,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Execute `workflow` and return the result of every node.
    ///
    /// Any failure (graph, plan, node, cancellation) is persisted as a
    /// `failed` status before it is returned.
    pub async fn run(
        &self,
        workflow: &Workflow,
        options: &RunOptions,
    ) -> Result<ExecutionResult, RunError> {
        let mut run = RunState {
            execution_id: options.execution_id.clone(),
            user_id: options.user_id.clone(),
            status: ExecutionStatus::Queued,
            counts: NodeCounts::default(),
            results: ResultStore::new(),
            started: Instant::now(),
        };

        tracing::info!(
            execution_id = %run.execution_id,
            workflow_id = %workflow.id,
            "Starting workflow execution"
        );
        self.log(&run, WORKFLOW_LOG_NODE, LogLevel::Info, "Workflow execution started", None)
            .await;

        let graph = match WorkflowGraph::new(&workflow.nodes, &workflow.edges) {
            Ok(graph) => graph,
            Err(e) => return Err(self.fail(&mut run, e.into()).await),
        };
        let plan = match planner::plan(graph.nodes(), graph.edges()) {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(&mut run, e.into()).await),
        };

        run.counts.total_nodes = plan.len();
        let update = ExecutionUpdate::counts(run.counts);
        self.transition(&mut run, ExecutionStatus::Running, update).await;

        if let Err(e) = self.execute_plan(&mut run, &plan, workflow, options).await {
            return Err(self.fail(&mut run, e).await);
        }

        let update = ExecutionUpdate::counts(run.counts).with_results(run.results.to_map());
        self.transition(&mut run, ExecutionStatus::Completed, update).await;
        self.log(
            &run,
            WORKFLOW_LOG_NODE,
            LogLevel::Info,
            "Workflow execution completed successfully",
            None,
        )
        .await;

        let duration_ms = run.started.elapsed().as_millis() as u64;
        tracing::info!(
            execution_id = %run.execution_id,
            completed = run.counts.completed_nodes,
            "Workflow completed in {}ms",
            duration_ms
        );

        Ok(ExecutionResult {
            execution_id: run.execution_id,
            results: run.results,
            counts: run.counts,
            duration_ms,
        })
    }

    /// Persist a failure for a run that could not start (e.g. the workflow
    /// could not be fetched) and hand the error back.
    pub async fn abort(&self, options: &RunOptions, error: RunError) -> RunError {
        let mut run = RunState {
            execution_id: options.execution_id.clone(),
            user_id: options.user_id.clone(),
            status: ExecutionStatus::Queued,
            counts: NodeCounts::default(),
            results: ResultStore::new(),
            started: Instant::now(),
        };
        self.fail(&mut run, error).await
    }

    async fn execute_plan(
        &self,
        run: &mut RunState,
        plan: &Plan<'_>,
        workflow: &Workflow,
        options: &RunOptions,
    ) -> Result<(), RunError> {
        for node in plan.nodes().iter().copied() {
            if options.cancellation.is_cancelled() {
                return Err(RunError::Cancelled(node.id.clone()));
            }
            self.execute_node(run, node, workflow, options).await?;
        }
        Ok(())
    }

    async fn execute_node(
        &self,
        run: &mut RunState,
        node: &Node,
        workflow: &Workflow,
        options: &RunOptions,
    ) -> Result<(), RunError> {
        self.log(
            run,
            &node.id,
            LogLevel::Info,
            &format!("Executing node: {}", node.id),
            None,
        )
        .await;
        self.publish(ExecutionEvent::NodeStarted {
            execution_id: run.execution_id.clone(),
            node_id: node.id.clone(),
            node_kind: node.kind.clone(),
            timestamp: Utc::now(),
        });

        let ctx = NodeContext::new(node.id.clone(), run.execution_id.clone(), run.user_id.clone())
            .with_trigger_data(options.trigger_data.clone())
            .with_inputs(resolve_inputs(&node.id, &workflow.edges, &run.results))
            .with_config(node.config.clone());

        let start = Instant::now();
        let outcome = self.registry.dispatch(node, ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                tracing::info!("Node {} completed in {}ms", node.id, duration_ms);

                run.results.insert(node.id.clone(), result.clone());
                run.counts.completed_nodes += 1;

                let update = ExecutionUpdate::counts(run.counts).with_current_node(node.id.clone());
                self.transition(run, ExecutionStatus::Running, update).await;

                self.publish(ExecutionEvent::NodeCompleted {
                    execution_id: run.execution_id.clone(),
                    node_id: node.id.clone(),
                    result,
                    duration_ms,
                    timestamp: Utc::now(),
                });
                self.log(
                    run,
                    &node.id,
                    LogLevel::Info,
                    &format!("Node {} completed successfully", node.id),
                    Some(json!({ "durationMs": duration_ms })),
                )
                .await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Node {} failed: {}", node.id, e);

                run.counts.failed_nodes += 1;
                self.log(
                    run,
                    &node.id,
                    LogLevel::Error,
                    &format!("Node {} failed: {}", node.id, e.cause),
                    Some(json!({ "kind": e.cause.kind() })),
                )
                .await;
                self.publish(ExecutionEvent::NodeFailed {
                    execution_id: run.execution_id.clone(),
                    node_id: node.id.clone(),
                    error: ErrorDetail {
                        kind: e.cause.kind().to_string(),
                        message: e.cause.to_string(),
                    },
                    timestamp: Utc::now(),
                });
                Err(e.into())
            }
        }
    }

    /// Single point where an error becomes a persisted `failed` status.
    async fn fail(&self, run: &mut RunState, error: RunError) -> RunError {
        let failure = error.to_failure();
        tracing::error!(
            execution_id = %run.execution_id,
            code = %failure.code,
            "Workflow execution failed: {}",
            error
        );

        self.log(
            run,
            WORKFLOW_LOG_NODE,
            LogLevel::Error,
            &format!("Workflow execution failed: {}", error),
            serde_json::to_value(&failure).ok(),
        )
        .await;

        let update = ExecutionUpdate::counts(run.counts).with_error(failure);
        self.transition(run, ExecutionStatus::Failed, update).await;
        error
    }

    /// Move the run to `status`, then persist and broadcast it. Persistence
    /// and broadcast failures are logged and otherwise ignored.
    async fn transition(&self, run: &mut RunState, status: ExecutionStatus, update: ExecutionUpdate) {
        if run.status != status && !run.status.can_transition_to(status) {
            tracing::warn!(
                execution_id = %run.execution_id,
                "Ignoring invalid status transition {} -> {}",
                run.status,
                status
            );
            return;
        }
        run.status = status;

        let current_node = update.current_node.clone();
        if let Err(e) = self
            .store
            .update_execution_status(&run.execution_id, status, update)
            .await
        {
            tracing::warn!(execution_id = %run.execution_id, "Failed to persist status {}: {}", status, e);
        }

        self.publish(ExecutionEvent::ExecutionProgress {
            execution_id: run.execution_id.clone(),
            status,
            counts: run.counts,
            current_node,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: ExecutionEvent) {
        let name = event.name();
        if let Err(e) = self.broadcaster.publish(event) {
            tracing::warn!("Failed to broadcast {}: {}", name, e);
        }
    }

    async fn log(
        &self,
        run: &RunState,
        node_id: &str,
        level: LogLevel,
        message: &str,
        data: Option<Value>,
    ) {
        let mut entry = LogEntry::new(run.execution_id.clone(), node_id, level, message);
        if let Some(data) = data {
            entry = entry.with_data(data);
        }
        if let Err(e) = self.store.create_log_entry(entry).await {
            tracing::warn!(execution_id = %run.execution_id, "Failed to create log entry: {}", e);
        }
    }
}
