//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use engine::{
    CatalogConfig, DbSnapshotStore, SerializationCache, TaskDescriptor, WorkflowCatalog,
    WorkflowDefinition,
};
use operators::builtin::{BashOperator, DummyOperator};
use operators::OperatorRegistry;

use crate::{router, AppState};

fn test_dag() -> WorkflowDefinition {
    WorkflowDefinition::builder("test_dag")
        .start_date(Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap())
        .task(TaskDescriptor::builder("op1", &DummyOperator).build().unwrap())
        .build()
        .unwrap()
}

async fn direct_app() -> Router {
    let catalog = WorkflowCatalog::new(CatalogConfig::default());
    catalog.register(test_dag()).await;
    router(AppState::new(Arc::new(catalog)))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_healthy() {
    let (status, body) = get_json(direct_app().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn get_task_returns_formatted_task() {
    let (status, body) = get_json(direct_app().await, "/api/v1/workflows/test_dag/tasks/op1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "op1");
    assert_eq!(body["class_ref"]["class_name"], "DummyOperator");
    assert_eq!(body["start_date"], "2020-06-15T00:00:00+00:00");
    assert_eq!(
        body["retry_delay"],
        json!({"__type": "TimeDelta", "days": 0, "seconds": 300, "microseconds": 0})
    );
    assert_eq!(body["ui_color"], "#e8f7e4");
    assert_eq!(body["weight_rule"], "downstream");
}

#[tokio::test]
async fn list_tasks_wraps_collection() {
    let (status, body) = get_json(direct_app().await, "/api/v1/workflows/test_dag/tasks").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_entries"], 1);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(body["tasks"][0]["task_id"], "op1");
}

#[tokio::test]
async fn unknown_task_is_404_problem() {
    let (status, body) =
        get_json(direct_app().await, "/api/v1/workflows/test_dag/tasks/xxxx_not_existing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["title"], "Not Found");
    assert!(body["detail"].as_str().unwrap().contains("xxxx_not_existing"));
}

#[tokio::test]
async fn unknown_workflow_is_404_on_both_routes() {
    for uri in [
        "/api/v1/workflows/xxxx_not_existing/tasks",
        "/api/v1/workflows/xxxx_not_existing/tasks/op1",
    ] {
        let (status, body) = get_json(direct_app().await, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["status"], 404);
    }
}

#[tokio::test]
async fn list_workflows_is_sorted() {
    let catalog = WorkflowCatalog::new(CatalogConfig::default());
    catalog.register(test_dag()).await;
    catalog
        .register(
            WorkflowDefinition::builder("nightly_backup")
                .task(TaskDescriptor::builder("dump", &BashOperator).build().unwrap())
                .build()
                .unwrap(),
        )
        .await;
    let app = router(AppState::new(Arc::new(catalog)));

    let (status, body) = get_json(app, "/api/v1/workflows").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "workflows": ["nightly_backup", "test_dag"], "total_entries": 2 })
    );
}

#[tokio::test]
async fn serialized_mode_answers_from_snapshots() {
    let pool = db::pool::create_memory_pool().await.unwrap();
    let cache = SerializationCache::new(
        Arc::new(DbSnapshotStore::new(pool)),
        Arc::new(OperatorRegistry::with_builtins()),
    );
    cache.put(&test_dag(), Utc::now()).await.unwrap();

    let catalog = WorkflowCatalog::new(CatalogConfig::serialized()).with_cache(cache);
    let app = router(AppState::new(Arc::new(catalog)));

    let (direct_status, direct_body) =
        get_json(direct_app().await, "/api/v1/workflows/test_dag/tasks/op1").await;
    let (status, body) = get_json(app, "/api/v1/workflows/test_dag/tasks/op1").await;

    assert_eq!(status, direct_status);
    assert_eq!(body, direct_body);
}
