//! Serialized workflow snapshots and the store they live in.
//!
//! A snapshot is a versioned JSON document:
//!
//! ```json
//! { "__version": 1, "workflow": { "workflow_id": "...", "tasks": [ ... ] } }
//! ```
//!
//! Decoding resolves every task's class reference through the
//! [`OperatorRegistry`], so a snapshot naming an unknown operator is treated as
//! corrupt. Corrupt snapshots surface as [`SnapshotError::Deserialization`]
//! and the catalog turns them into cache misses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use db::models::SerializedWorkflowRow;
pub use db::models::WriteOutcome;
use db::repository::serialized_workflows as snapshot_repo;
use db::DbPool;
use operators::{ClassRef, OperatorRegistry};

use crate::config::OperatorDefaults;
use crate::models::{TaskBuilder, TaskDescriptor, TriggerRule, WeightRule, WorkflowDefinition};

/// Encoding version written by this build. Older or newer versions are
/// rejected on decode.
pub const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The stored document could not be turned back into a definition.
    #[error("corrupt snapshot for '{workflow_id}': {message}")]
    Deserialization {
        workflow_id: String,
        message: String,
    },

    /// A definition could not be encoded.
    #[error("cannot encode snapshot: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("snapshot store error: {0}")]
    Store(#[from] db::DbError),
}

// ---------------------------------------------------------------------------
// Encoded shape
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(rename = "__version")]
    version: u32,
    workflow: SerializedWorkflow,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedWorkflow {
    workflow_id: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    doc_md: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    tasks: Vec<SerializedTask>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedTask {
    task_id: String,
    class_name: String,
    module_path: String,
    owner: String,
    queue: String,
    pool: String,
    pool_slots: u32,
    priority_weight: i32,
    retries: u32,
    /// Whole microseconds.
    retry_delay_us: u64,
    retry_exponential_backoff: bool,
    depends_on_past: bool,
    wait_for_downstream: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    /// Whole microseconds.
    execution_timeout_us: Option<u64>,
    trigger_rule: TriggerRule,
    weight_rule: WeightRule,
    ui_color: String,
    ui_fgcolor: String,
    downstream_task_ids: Vec<String>,
    template_fields: Vec<String>,
    extra_links: Vec<String>,
}

impl From<&TaskDescriptor> for SerializedTask {
    fn from(task: &TaskDescriptor) -> Self {
        Self {
            task_id: task.task_id().to_owned(),
            class_name: task.class_ref().class_name.clone(),
            module_path: task.class_ref().module_path.clone(),
            owner: task.owner().to_owned(),
            queue: task.queue().to_owned(),
            pool: task.pool().to_owned(),
            pool_slots: task.pool_slots(),
            priority_weight: task.priority_weight(),
            retries: task.retries(),
            retry_delay_us: micros(task.retry_delay()),
            retry_exponential_backoff: task.retry_exponential_backoff(),
            depends_on_past: task.depends_on_past(),
            wait_for_downstream: task.wait_for_downstream(),
            start_date: task.start_date(),
            end_date: task.end_date(),
            execution_timeout_us: task.execution_timeout().map(micros),
            trigger_rule: task.trigger_rule(),
            weight_rule: task.weight_rule(),
            ui_color: task.ui_color().to_owned(),
            ui_fgcolor: task.ui_fgcolor().to_owned(),
            downstream_task_ids: task.downstream_task_ids().map(str::to_owned).collect(),
            template_fields: task.template_fields().to_vec(),
            extra_links: task.extra_links().to_vec(),
        }
    }
}

/// Encode a definition as a snapshot document.
pub fn encode(definition: &WorkflowDefinition) -> Result<String, SnapshotError> {
    let document = SnapshotDocument {
        version: SNAPSHOT_VERSION,
        workflow: SerializedWorkflow {
            workflow_id: definition.workflow_id().to_owned(),
            start_date: definition.start_date(),
            end_date: definition.end_date(),
            doc_md: definition.doc_md().map(str::to_owned),
            description: definition.description().map(str::to_owned),
            tags: definition.tags().to_vec(),
            tasks: definition.list_tasks().iter().map(SerializedTask::from).collect(),
        },
    };
    Ok(serde_json::to_string(&document)?)
}

/// Decode a snapshot document back into a validated definition.
///
/// # Errors
/// [`SnapshotError::Deserialization`] for malformed JSON, an unsupported
/// version, an unknown operator, or a definition that fails validation.
pub fn decode(
    workflow_id: &str,
    data: &str,
    registry: &OperatorRegistry,
) -> Result<WorkflowDefinition, SnapshotError> {
    let corrupt = |message: String| SnapshotError::Deserialization {
        workflow_id: workflow_id.to_owned(),
        message,
    };

    let raw: serde_json::Value = serde_json::from_str(data).map_err(|e| corrupt(e.to_string()))?;
    let version = raw
        .get("__version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| corrupt("missing __version".into()))?;
    if version != u64::from(SNAPSHOT_VERSION) {
        return Err(corrupt(format!("unsupported snapshot version {version}")));
    }

    let document: SnapshotDocument =
        serde_json::from_value(raw).map_err(|e| corrupt(e.to_string()))?;
    let workflow = document.workflow;
    if workflow.workflow_id != workflow_id {
        return Err(corrupt(format!(
            "snapshot belongs to workflow '{}'",
            workflow.workflow_id
        )));
    }

    let defaults = OperatorDefaults::default();
    let mut builder = WorkflowDefinition::builder(workflow.workflow_id);
    if let Some(start) = workflow.start_date {
        builder = builder.start_date(start);
    }
    if let Some(end) = workflow.end_date {
        builder = builder.end_date(end);
    }
    if let Some(doc) = workflow.doc_md {
        builder = builder.doc_md(doc);
    }
    if let Some(description) = workflow.description {
        builder = builder.description(description);
    }
    for tag in workflow.tags {
        builder = builder.tag(tag);
    }

    for task in workflow.tasks {
        let class_ref = ClassRef::new(task.class_name, task.module_path);
        let operator = registry
            .resolve_ref(&class_ref)
            .map_err(|e| corrupt(e.to_string()))?;

        let mut task_builder = TaskBuilder::new(task.task_id, operator.as_ref(), &defaults)
            .owner(task.owner)
            .queue(task.queue)
            .pool(task.pool)
            .pool_slots(task.pool_slots)
            .priority_weight(task.priority_weight)
            .retries(task.retries)
            .retry_delay(Duration::from_micros(task.retry_delay_us))
            .retry_exponential_backoff(task.retry_exponential_backoff)
            .depends_on_past(task.depends_on_past)
            .wait_for_downstream(task.wait_for_downstream)
            .trigger_rule(task.trigger_rule)
            .weight_rule(task.weight_rule)
            .ui_color(task.ui_color)
            .ui_fgcolor(task.ui_fgcolor)
            .template_fields(task.template_fields)
            .extra_links(task.extra_links);

        if let Some(start) = task.start_date {
            task_builder = task_builder.start_date(start);
        }
        if let Some(end) = task.end_date {
            task_builder = task_builder.end_date(end);
        }
        if let Some(timeout) = task.execution_timeout_us {
            task_builder = task_builder.execution_timeout(Duration::from_micros(timeout));
        }
        for downstream in task.downstream_task_ids {
            task_builder = task_builder.downstream(downstream);
        }

        builder = builder.task(task_builder.build().map_err(|e| corrupt(e.to_string()))?);
    }

    builder.build().map_err(|e| corrupt(e.to_string()))
}

/// Built descriptors never exceed `u64::MAX` microseconds.
fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// A stored snapshot, still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedSnapshot {
    pub workflow_id: String,
    pub data: String,
    pub last_updated: DateTime<Utc>,
}

impl From<SerializedWorkflowRow> for SerializedSnapshot {
    fn from(row: SerializedWorkflowRow) -> Self {
        Self {
            workflow_id: row.workflow_id,
            data: row.data,
            last_updated: row.last_updated,
        }
    }
}

/// Durable key-value store of encoded snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Write `data` unless the stored snapshot is newer or identical.
    async fn put(
        &self,
        workflow_id: &str,
        data: &str,
        as_of: DateTime<Utc>,
    ) -> Result<WriteOutcome, SnapshotError>;

    async fn get(&self, workflow_id: &str) -> Result<Option<SerializedSnapshot>, SnapshotError>;

    async fn last_updated(&self, workflow_id: &str) -> Result<Option<DateTime<Utc>>, SnapshotError>;

    /// Returns `false` when there was nothing to remove.
    async fn remove(&self, workflow_id: &str) -> Result<bool, SnapshotError>;

    async fn list_ids(&self) -> Result<Vec<String>, SnapshotError>;
}

/// [`SnapshotStore`] backed by the `serialized_workflows` table.
#[derive(Debug, Clone)]
pub struct DbSnapshotStore {
    pool: DbPool,
}

impl DbSnapshotStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SnapshotStore for DbSnapshotStore {
    async fn put(
        &self,
        workflow_id: &str,
        data: &str,
        as_of: DateTime<Utc>,
    ) -> Result<WriteOutcome, SnapshotError> {
        Ok(snapshot_repo::upsert_serialized_workflow(&self.pool, workflow_id, data, as_of).await?)
    }

    async fn get(&self, workflow_id: &str) -> Result<Option<SerializedSnapshot>, SnapshotError> {
        let row = snapshot_repo::get_serialized_workflow(&self.pool, workflow_id).await?;
        Ok(row.map(SerializedSnapshot::from))
    }

    async fn last_updated(&self, workflow_id: &str) -> Result<Option<DateTime<Utc>>, SnapshotError> {
        Ok(snapshot_repo::get_last_updated(&self.pool, workflow_id).await?)
    }

    async fn remove(&self, workflow_id: &str) -> Result<bool, SnapshotError> {
        match snapshot_repo::delete_serialized_workflow(&self.pool, workflow_id).await {
            Ok(()) => Ok(true),
            Err(db::DbError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_ids(&self) -> Result<Vec<String>, SnapshotError> {
        Ok(snapshot_repo::list_workflow_ids(&self.pool).await?)
    }
}

/// In-process [`SnapshotStore`], used by tests and single-process setups.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, SerializedSnapshot>>,
    read_delay: Option<Duration>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get` sleep first, to exercise read timeouts.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Store `data` verbatim, bypassing every check.
    pub async fn insert_raw(&self, workflow_id: &str, data: &str, last_updated: DateTime<Utc>) {
        self.snapshots.write().await.insert(
            workflow_id.to_owned(),
            SerializedSnapshot {
                workflow_id: workflow_id.to_owned(),
                data: data.to_owned(),
                last_updated,
            },
        );
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn put(
        &self,
        workflow_id: &str,
        data: &str,
        as_of: DateTime<Utc>,
    ) -> Result<WriteOutcome, SnapshotError> {
        let mut snapshots = self.snapshots.write().await;
        if let Some(existing) = snapshots.get(workflow_id) {
            if existing.last_updated > as_of {
                return Ok(WriteOutcome::Superseded);
            }
            if existing.data == data {
                return Ok(WriteOutcome::Unchanged);
            }
        }
        snapshots.insert(
            workflow_id.to_owned(),
            SerializedSnapshot {
                workflow_id: workflow_id.to_owned(),
                data: data.to_owned(),
                last_updated: as_of,
            },
        );
        Ok(WriteOutcome::Written)
    }

    async fn get(&self, workflow_id: &str) -> Result<Option<SerializedSnapshot>, SnapshotError> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.snapshots.read().await.get(workflow_id).cloned())
    }

    async fn last_updated(&self, workflow_id: &str) -> Result<Option<DateTime<Utc>>, SnapshotError> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(workflow_id)
            .map(|s| s.last_updated))
    }

    async fn remove(&self, workflow_id: &str) -> Result<bool, SnapshotError> {
        Ok(self.snapshots.write().await.remove(workflow_id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<String>, SnapshotError> {
        let mut ids: Vec<String> = self.snapshots.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// SerializationCache
// ---------------------------------------------------------------------------

/// A decoded snapshot together with its store timestamp.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub definition: WorkflowDefinition,
    pub last_updated: DateTime<Utc>,
}

/// Encodes definitions into, and decodes them out of, a [`SnapshotStore`].
#[derive(Clone)]
pub struct SerializationCache {
    store: Arc<dyn SnapshotStore>,
    registry: Arc<OperatorRegistry>,
}

impl std::fmt::Debug for SerializationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializationCache")
            .field("operators", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl SerializationCache {
    pub fn new(store: Arc<dyn SnapshotStore>, registry: Arc<OperatorRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Snapshot `definition` as of `as_of`.
    #[instrument(skip(self, definition), fields(workflow_id = %definition.workflow_id()))]
    pub async fn put(
        &self,
        definition: &WorkflowDefinition,
        as_of: DateTime<Utc>,
    ) -> Result<WriteOutcome, SnapshotError> {
        let data = encode(definition)?;
        let outcome = self.store.put(definition.workflow_id(), &data, as_of).await?;
        debug!(?outcome, "snapshot write");
        Ok(outcome)
    }

    /// The encoded snapshot, if any. No side effects.
    pub async fn get(&self, workflow_id: &str) -> Result<Option<SerializedSnapshot>, SnapshotError> {
        self.store.get(workflow_id).await
    }

    /// Fetch and decode the snapshot for `workflow_id`.
    pub async fn load(&self, workflow_id: &str) -> Result<Option<LoadedSnapshot>, SnapshotError> {
        let Some(snapshot) = self.store.get(workflow_id).await? else {
            return Ok(None);
        };
        let definition = decode(workflow_id, &snapshot.data, &self.registry)?;
        Ok(Some(LoadedSnapshot {
            definition,
            last_updated: snapshot.last_updated,
        }))
    }

    pub async fn last_updated(&self, workflow_id: &str) -> Result<Option<DateTime<Utc>>, SnapshotError> {
        self.store.last_updated(workflow_id).await
    }

    pub async fn remove(&self, workflow_id: &str) -> Result<bool, SnapshotError> {
        self.store.remove(workflow_id).await
    }

    pub async fn list_ids(&self) -> Result<Vec<String>, SnapshotError> {
        self.store.list_ids().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use operators::builtin::{BashOperator, DummyOperator};
    use operators::mock::MockOperator;

    use crate::EngineError;

    fn registry() -> Arc<OperatorRegistry> {
        Arc::new(OperatorRegistry::with_builtins())
    }

    fn sample() -> WorkflowDefinition {
        WorkflowDefinition::builder("etl")
            .start_date(Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap())
            .doc_md("details")
            .tag("nightly")
            .task(
                TaskDescriptor::builder("extract", &BashOperator)
                    .retries(2)
                    .retry_delay(Duration::from_millis(1_500))
                    .execution_timeout(Duration::from_secs(600))
                    .downstream("load")
                    .build()
                    .unwrap(),
            )
            .task(
                TaskDescriptor::builder("load", &DummyOperator)
                    .trigger_rule(TriggerRule::AllDone)
                    .weight_rule(WeightRule::Absolute)
                    .ui_color("#123456")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn round_trip_preserves_order_and_fields() {
        let original = sample();
        let data = encode(&original).unwrap();
        let decoded = decode("etl", &data, &registry()).unwrap();

        assert_eq!(decoded, original);
        let ids: Vec<&str> = decoded.list_tasks().iter().map(|t| t.task_id()).collect();
        assert_eq!(ids, vec!["extract", "load"]);
    }

    #[test]
    fn inherited_dates_round_trip() {
        let original = WorkflowDefinition::builder("windowed")
            .start_date(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap())
            .end_date(Utc.with_ymd_and_hms(2020, 7, 1, 0, 0, 0).unwrap())
            .task(
                TaskDescriptor::builder("late", &DummyOperator)
                    .start_date(Utc.with_ymd_and_hms(2020, 6, 20, 0, 0, 0).unwrap())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let decoded = decode("windowed", &encode(&original).unwrap(), &registry()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn task_starting_after_inherited_end_cannot_be_built() {
        // Such a definition would encode but never decode again.
        let result = WorkflowDefinition::builder("windowed")
            .start_date(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap())
            .end_date(Utc.with_ymd_and_hms(2020, 7, 1, 0, 0, 0).unwrap())
            .task(
                TaskDescriptor::builder("late", &DummyOperator)
                    .start_date(Utc.with_ymd_and_hms(2020, 8, 1, 0, 0, 0).unwrap())
                    .build()
                    .unwrap(),
            )
            .build();
        assert!(matches!(result, Err(EngineError::Validation { task_id, .. }) if task_id == "late"));
    }

    #[test]
    fn long_durations_round_trip_exactly() {
        let four_centuries = Duration::from_secs(400 * 365 * 24 * 3600) + Duration::from_micros(1);
        let original = WorkflowDefinition::builder("long")
            .task(
                TaskDescriptor::builder("t", &DummyOperator)
                    .retry_delay(four_centuries)
                    .execution_timeout(Duration::from_micros(u64::MAX))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let decoded = decode("long", &encode(&original).unwrap(), &registry()).unwrap();
        let task = decoded.resolve_task("t").unwrap();
        assert_eq!(task.retry_delay(), four_centuries);
        assert_eq!(task.execution_timeout(), Some(Duration::from_micros(u64::MAX)));
    }

    #[test]
    fn custom_operator_properties_survive_round_trip_and_format() {
        let custom = MockOperator::new("S3KeySensor", "plugins.sensors")
            .with_colors("#19647e", "#fff")
            .with_template_fields(&["bucket_key"])
            .with_extra_links(&["S3 Console"]);
        let mut registry = OperatorRegistry::with_builtins();
        registry.register(Arc::new(custom.clone())).unwrap();

        let original = WorkflowDefinition::builder("sensing")
            .task(TaskDescriptor::builder("wait", &custom).build().unwrap())
            .build()
            .unwrap();
        let decoded = decode("sensing", &encode(&original).unwrap(), &registry).unwrap();
        assert_eq!(decoded, original);

        let formatted = decoded.resolve_task("wait").unwrap().format();
        assert_eq!(formatted.class_ref.class_name, "S3KeySensor");
        assert_eq!(formatted.class_ref.module_path, "plugins.sensors");
        assert_eq!(formatted.ui_color, "#19647e");
        assert_eq!(formatted.ui_fgcolor, "#fff");
        assert_eq!(formatted.template_fields, vec!["bucket_key"]);
        assert_eq!(formatted.extra_links, vec!["S3 Console"]);
    }

    #[test]
    fn document_carries_version() {
        let value: serde_json::Value = serde_json::from_str(&encode(&sample()).unwrap()).unwrap();
        assert_eq!(value["__version"], SNAPSHOT_VERSION);
        assert_eq!(value["workflow"]["tasks"][0]["retry_delay_us"], 1_500_000);
        assert_eq!(value["workflow"]["tasks"][0]["execution_timeout_us"], 600_000_000);
    }

    #[test]
    fn garbage_is_a_deserialization_error() {
        assert!(matches!(
            decode("etl", "{not json", &registry()),
            Err(SnapshotError::Deserialization { .. })
        ));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let data = encode(&sample()).unwrap().replacen("\"__version\":1", "\"__version\":99", 1);
        assert!(matches!(
            decode("etl", &data, &registry()),
            Err(SnapshotError::Deserialization { message, .. }) if message.contains("99")
        ));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let empty = OperatorRegistry::new();
        assert!(matches!(
            decode("etl", &encode(&sample()).unwrap(), &empty),
            Err(SnapshotError::Deserialization { .. })
        ));
    }

    #[test]
    fn snapshot_for_another_workflow_is_rejected() {
        let data = encode(&sample()).unwrap();
        assert!(decode("other", &data, &registry()).is_err());
    }

    #[tokio::test]
    async fn memory_store_is_last_write_wins() {
        let store = MemorySnapshotStore::new();
        let t1 = Utc.with_ymd_and_hms(2020, 6, 15, 1, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2020, 6, 15, 2, 0, 0).unwrap();

        assert_eq!(store.put("wf", "v2", t2).await.unwrap(), WriteOutcome::Written);
        assert_eq!(store.put("wf", "v1", t1).await.unwrap(), WriteOutcome::Superseded);
        assert_eq!(store.put("wf", "v2", t2).await.unwrap(), WriteOutcome::Unchanged);
        assert_eq!(store.get("wf").await.unwrap().unwrap().data, "v2");
        assert!(store.remove("wf").await.unwrap());
        assert!(!store.remove("wf").await.unwrap());
    }

    #[tokio::test]
    async fn cache_round_trips_through_database() {
        let pool = db::pool::create_memory_pool().await.unwrap();
        let cache = SerializationCache::new(Arc::new(DbSnapshotStore::new(pool)), registry());
        let as_of = Utc.with_ymd_and_hms(2020, 6, 16, 0, 0, 0).unwrap();

        assert_eq!(cache.put(&sample(), as_of).await.unwrap(), WriteOutcome::Written);

        let loaded = cache.load("etl").await.unwrap().expect("snapshot stored");
        assert_eq!(loaded.definition, sample());
        assert_eq!(loaded.last_updated, as_of);
        assert_eq!(cache.list_ids().await.unwrap(), vec!["etl"]);
        assert!(cache.load("missing").await.unwrap().is_none());
    }
}
