use crate::{
    ExecutionId, ExecutionRecord, ExecutionStatus, ExecutionUpdate, NodeId, PersistenceError,
    Workflow, WorkflowId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Node id used for run-level log entries.
pub const WORKFLOW_LOG_NODE: &str = "workflow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One append-only log record for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        execution_id: impl Into<ExecutionId>,
        node_id: impl Into<NodeId>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            node_id: node_id.into(),
            level,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Persistence collaborator for workflows, execution status and logs.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, workflow_id: &str) -> Result<Workflow, PersistenceError>;

    /// Fails with [`PersistenceError::Conflict`] once the execution is
    /// completed or failed.
    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        update: ExecutionUpdate,
    ) -> Result<(), PersistenceError>;

    async fn create_log_entry(&self, entry: LogEntry) -> Result<(), PersistenceError>;
}

/// Process-local store used by the server, the CLI and tests.
#[derive(Default)]
pub struct InMemoryStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    executions: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
    logs: RwLock<Vec<LogEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_workflow(&self, workflow: Workflow) {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow);
    }

    pub async fn remove_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.workflows.write().await.remove(workflow_id)
    }

    pub async fn list_workflows(&self) -> Vec<Workflow> {
        let mut all: Vec<Workflow> = self.workflows.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Register a queued execution before it is run. An id that is already
    /// known is never reused.
    pub async fn create_execution(
        &self,
        execution_id: &str,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<ExecutionRecord, PersistenceError> {
        let mut executions = self.executions.write().await;
        if let Some(existing) = executions.get(execution_id) {
            return Err(PersistenceError::Conflict(format!(
                "execution {} already exists ({})",
                execution_id, existing.status
            )));
        }

        let mut record = ExecutionRecord::new(execution_id);
        record.workflow_id = Some(workflow_id.to_string());
        record.user_id = Some(user_id.to_string());
        executions.insert(execution_id.to_string(), record.clone());
        Ok(record)
    }

    pub async fn execution(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.executions.read().await.get(execution_id).cloned()
    }

    pub async fn logs_for(&self, execution_id: &str) -> Vec<LogEntry> {
        self.logs
            .read()
            .await
            .iter()
            .filter(|l| l.execution_id == execution_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn get(&self, workflow_id: &str) -> Result<Workflow, PersistenceError> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(format!("workflow {}", workflow_id)))
    }

    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        update: ExecutionUpdate,
    ) -> Result<(), PersistenceError> {
        let mut executions = self.executions.write().await;
        let record = executions
            .entry(execution_id.to_string())
            .or_insert_with(|| ExecutionRecord::new(execution_id));

        if record.status.is_terminal() {
            return Err(PersistenceError::Conflict(format!(
                "execution {} is already {}",
                execution_id, record.status
            )));
        }

        record.apply(status, update);
        Ok(())
    }

    async fn create_log_entry(&self, entry: LogEntry) -> Result<(), PersistenceError> {
        self.logs.write().await.push(entry);
        Ok(())
    }
}
