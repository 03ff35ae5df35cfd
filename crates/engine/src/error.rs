//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the catalog engine (validation, loading, lookup).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Lookup errors ------

    /// No workflow with this identifier is registered anywhere.
    #[error("workflow not found: '{0}'")]
    WorkflowNotFound(String),

    /// The workflow exists but has no task with this identifier.
    #[error("task '{task_id}' not found in workflow '{workflow_id}'")]
    TaskNotFound {
        workflow_id: String,
        task_id: String,
    },

    // ------ Validation errors ------

    /// A task descriptor failed construction-time validation.
    #[error("invalid task '{task_id}': {message}")]
    Validation {
        task_id: String,
        message: String,
    },

    /// Two or more tasks share the same ID.
    #[error("duplicate task ID: '{0}'")]
    DuplicateTaskId(String),

    /// A downstream reference names a task that doesn't exist in the workflow.
    #[error("task '{task_id}' references unknown downstream task '{downstream_id}'")]
    UnknownTaskReference {
        task_id: String,
        downstream_id: String,
    },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    /// The task's class reference is not in the operator registry.
    #[error("operator error: {0}")]
    Operator(#[from] operators::OperatorError),

    // ------ Loading errors ------

    /// A workflow source file could not be read or parsed.
    #[error("cannot load workflow source '{origin}': {message}")]
    Source {
        origin: String,
        message: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig {
        field: String,
        message: String,
    },

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}

impl EngineError {
    /// Whether this error means "no such workflow or task".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound(_) | Self::TaskNotFound { .. }
        )
    }
}
