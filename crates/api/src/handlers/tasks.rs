use axum::{
    extract::{Path, State},
    Json,
};

use super::AppState;
use crate::ApiError;
use engine::{TaskCollection, TaskResponse};

pub async fn list(
    Path(workflow_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TaskCollection>, ApiError> {
    let tasks = state.query.list_tasks(&workflow_id).await?;
    Ok(Json(tasks))
}

pub async fn get(
    Path((workflow_id, task_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = state.query.get_task(&workflow_id, &task_id).await?;
    Ok(Json(task))
}
