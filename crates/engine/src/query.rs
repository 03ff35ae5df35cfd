//! Query service: read-only façade answering "get task" and "list tasks".
//!
//! Stateless between calls: every query resolves the workflow through the
//! catalog and formats the result from scratch. A query either succeeds as a
//! whole or fails with a not-found error.

use std::sync::Arc;

use tracing::instrument;

use crate::catalog::WorkflowCatalog;
use crate::schema::{TaskCollection, TaskResponse, WorkflowCollection};
use crate::EngineError;

#[derive(Debug, Clone)]
pub struct QueryService {
    catalog: Arc<WorkflowCatalog>,
}

impl QueryService {
    pub fn new(catalog: Arc<WorkflowCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<WorkflowCatalog> {
        &self.catalog
    }

    /// Describe a single task.
    ///
    /// # Errors
    /// [`EngineError::WorkflowNotFound`] or [`EngineError::TaskNotFound`].
    #[instrument(skip(self))]
    pub async fn get_task(&self, workflow_id: &str, task_id: &str) -> Result<TaskResponse, EngineError> {
        let workflow = self.catalog.lookup(workflow_id).await?;
        let task = workflow.resolve_task(task_id)?;
        Ok(task.format())
    }

    /// Describe every task of a workflow, in definition order.
    ///
    /// # Errors
    /// [`EngineError::WorkflowNotFound`].
    #[instrument(skip(self))]
    pub async fn list_tasks(&self, workflow_id: &str) -> Result<TaskCollection, EngineError> {
        let workflow = self.catalog.lookup(workflow_id).await?;
        let tasks = workflow.list_tasks().iter().map(|t| t.format()).collect();
        Ok(TaskCollection::new(tasks))
    }

    /// Ids of every resolvable workflow, sorted.
    pub async fn list_workflows(&self) -> WorkflowCollection {
        WorkflowCollection::new(self.catalog.workflow_ids().await)
    }
}
