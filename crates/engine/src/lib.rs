//! `engine` crate: task and workflow models, DAG validation, snapshots, the
//! workflow catalog, and the query service.

pub mod catalog;
pub mod config;
pub mod dag;
pub mod error;
pub mod models;
pub mod query;
pub mod schema;
pub mod snapshot;
pub mod source;

pub use catalog::WorkflowCatalog;
pub use config::{CatalogConfig, CatalogMode, OperatorDefaults};
pub use dag::validate_dag;
pub use error::EngineError;
pub use models::{TaskBuilder, TaskDescriptor, TriggerRule, WeightRule, WorkflowDefinition};
pub use query::QueryService;
pub use schema::{TaskCollection, TaskResponse, WorkflowCollection};
pub use snapshot::{
    DbSnapshotStore, MemorySnapshotStore, SerializationCache, SnapshotError, SnapshotStore,
};
