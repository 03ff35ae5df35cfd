use axum::{extract::State, Json};

use super::AppState;
use engine::WorkflowCollection;

pub async fn list(State(state): State<AppState>) -> Json<WorkflowCollection> {
    Json(state.query.list_workflows().await)
}
