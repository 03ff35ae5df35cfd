//! `api` crate: HTTP surface of the workflow catalog.
//!
//! Routes:
//!   GET /health
//!   GET /api/v1/workflows
//!   GET /api/v1/workflows/:workflow_id/tasks
//!   GET /api/v1/workflows/:workflow_id/tasks/:task_id
//!
//! Every route is read-only and answers from the [`QueryService`].

pub mod error;
pub mod handlers;

#[cfg(test)]
mod endpoint_tests;

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use engine::{QueryService, WorkflowCatalog};

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub query: QueryService,
}

impl AppState {
    pub fn new(catalog: Arc<WorkflowCatalog>) -> Self {
        Self {
            query: QueryService::new(catalog),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/workflows", get(handlers::workflows::list))
        .route("/api/v1/workflows/:workflow_id/tasks", get(handlers::tasks::list))
        .route(
            "/api/v1/workflows/:workflow_id/tasks/:task_id",
            get(handlers::tasks::get),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `bind` and serve until ctrl-c.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
