//! Workflow source files.
//!
//! A source file is a JSON document describing one workflow:
//!
//! ```json
//! {
//!   "workflow_id": "test_dag",
//!   "start_date": "2020-06-15T00:00:00Z",
//!   "doc_md": "details",
//!   "default_args": { "owner": "data-eng", "retries": 1 },
//!   "tasks": [
//!     { "task_id": "op1", "operator": "DummyOperator", "downstream": ["op2"] },
//!     { "task_id": "op2", "operator": "airflow.operators.bash_operator.BashOperator" }
//!   ]
//! }
//! ```
//!
//! Field precedence is task > `default_args` > [`OperatorDefaults`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use operators::OperatorRegistry;

use crate::config::OperatorDefaults;
use crate::models::{TaskBuilder, TriggerRule, WeightRule, WorkflowDefinition};
use crate::EngineError;

/// Top-level document of a workflow source file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowSource {
    pub workflow_id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub doc_md: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub default_args: TaskArgs,
    pub tasks: Vec<TaskSource>,
}

/// Task fields that can be set per task or through `default_args`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskArgs {
    pub owner: Option<String>,
    pub queue: Option<String>,
    pub pool: Option<String>,
    pub pool_slots: Option<u32>,
    pub priority_weight: Option<i32>,
    pub retries: Option<u32>,
    pub retry_delay_secs: Option<f64>,
    pub retry_exponential_backoff: Option<bool>,
    pub depends_on_past: Option<bool>,
    pub wait_for_downstream: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub execution_timeout_secs: Option<f64>,
    pub trigger_rule: Option<TriggerRule>,
    pub weight_rule: Option<WeightRule>,
}

impl TaskArgs {
    /// Field-wise `self` if set, else `fallback`.
    fn or(&self, fallback: &TaskArgs) -> TaskArgs {
        TaskArgs {
            owner: self.owner.clone().or_else(|| fallback.owner.clone()),
            queue: self.queue.clone().or_else(|| fallback.queue.clone()),
            pool: self.pool.clone().or_else(|| fallback.pool.clone()),
            pool_slots: self.pool_slots.or(fallback.pool_slots),
            priority_weight: self.priority_weight.or(fallback.priority_weight),
            retries: self.retries.or(fallback.retries),
            retry_delay_secs: self.retry_delay_secs.or(fallback.retry_delay_secs),
            retry_exponential_backoff: self
                .retry_exponential_backoff
                .or(fallback.retry_exponential_backoff),
            depends_on_past: self.depends_on_past.or(fallback.depends_on_past),
            wait_for_downstream: self.wait_for_downstream.or(fallback.wait_for_downstream),
            start_date: self.start_date.or(fallback.start_date),
            end_date: self.end_date.or(fallback.end_date),
            execution_timeout_secs: self.execution_timeout_secs.or(fallback.execution_timeout_secs),
            trigger_rule: self.trigger_rule.or(fallback.trigger_rule),
            weight_rule: self.weight_rule.or(fallback.weight_rule),
        }
    }
}

/// One task entry of a source file.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSource {
    pub task_id: String,
    /// `module.Class` identifier or a bare, unambiguous class name.
    pub operator: String,
    #[serde(default)]
    pub downstream: Vec<String>,
    #[serde(default)]
    pub upstream: Vec<String>,
    pub ui_color: Option<String>,
    pub ui_fgcolor: Option<String>,
    #[serde(flatten)]
    pub args: TaskArgs,
    /// Keys matching no known field, e.g. a misspelt `retires`.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

impl TaskSource {
    /// Names of the keys that matched no task field.
    pub fn unknown_fields(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }
}

/// Outcome of loading a directory of source files.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully built definitions, in file-name order.
    pub workflows: Vec<WorkflowDefinition>,
    /// Files that failed to load, with the reason.
    pub import_errors: BTreeMap<PathBuf, String>,
}

impl WorkflowSource {
    /// Resolve operators, apply defaults, and validate.
    pub fn build(
        self,
        registry: &OperatorRegistry,
        defaults: &OperatorDefaults,
    ) -> Result<WorkflowDefinition, EngineError> {
        let mut builder = WorkflowDefinition::builder(self.workflow_id);
        if let Some(start) = self.start_date {
            builder = builder.start_date(start);
        }
        if let Some(end) = self.end_date {
            builder = builder.end_date(end);
        }
        if let Some(doc) = self.doc_md {
            builder = builder.doc_md(doc);
        }
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        for tag in self.tags {
            builder = builder.tag(tag);
        }

        let mut edges: Vec<(String, String)> = Vec::new();

        for task in self.tasks {
            for field in task.unknown_fields() {
                warn!(task_id = %task.task_id, "ignoring unknown task field '{}'", field);
            }
            let operator = registry.resolve(&task.operator)?;
            let args = task.args.or(&self.default_args);
            let mut task_builder = apply_args(
                TaskBuilder::new(task.task_id.clone(), operator.as_ref(), defaults),
                &task.task_id,
                args,
            )?;

            if let Some(color) = task.ui_color {
                task_builder = task_builder.ui_color(color);
            }
            if let Some(color) = task.ui_fgcolor {
                task_builder = task_builder.ui_fgcolor(color);
            }
            for downstream in task.downstream {
                task_builder = task_builder.downstream(downstream);
            }
            for upstream in task.upstream {
                edges.push((upstream, task.task_id.clone()));
            }

            builder = builder.task(task_builder.build()?);
        }

        for (upstream, downstream) in edges {
            builder = builder.dependency(upstream, downstream);
        }

        builder.build()
    }
}

fn apply_args(mut builder: TaskBuilder, task_id: &str, args: TaskArgs) -> Result<TaskBuilder, EngineError> {
    if let Some(owner) = args.owner {
        builder = builder.owner(owner);
    }
    if let Some(queue) = args.queue {
        builder = builder.queue(queue);
    }
    if let Some(pool) = args.pool {
        builder = builder.pool(pool);
    }
    if let Some(slots) = args.pool_slots {
        builder = builder.pool_slots(slots);
    }
    if let Some(weight) = args.priority_weight {
        builder = builder.priority_weight(weight);
    }
    if let Some(retries) = args.retries {
        builder = builder.retries(retries);
    }
    if let Some(secs) = args.retry_delay_secs {
        builder = builder.retry_delay(seconds(task_id, "retry_delay_secs", secs)?);
    }
    if let Some(enabled) = args.retry_exponential_backoff {
        builder = builder.retry_exponential_backoff(enabled);
    }
    if let Some(enabled) = args.depends_on_past {
        builder = builder.depends_on_past(enabled);
    }
    if let Some(enabled) = args.wait_for_downstream {
        builder = builder.wait_for_downstream(enabled);
    }
    if let Some(start) = args.start_date {
        builder = builder.start_date(start);
    }
    if let Some(end) = args.end_date {
        builder = builder.end_date(end);
    }
    if let Some(secs) = args.execution_timeout_secs {
        builder = builder.execution_timeout(seconds(task_id, "execution_timeout_secs", secs)?);
    }
    if let Some(rule) = args.trigger_rule {
        builder = builder.trigger_rule(rule);
    }
    if let Some(rule) = args.weight_rule {
        builder = builder.weight_rule(rule);
    }
    Ok(builder)
}

fn seconds(task_id: &str, field: &str, value: f64) -> Result<Duration, EngineError> {
    Duration::try_from_secs_f64(value).map_err(|e| EngineError::Validation {
        task_id: task_id.to_owned(),
        message: format!("{field}: {e}"),
    })
}

/// Parse and build a workflow from JSON text. `origin` names the source in
/// error messages.
pub fn parse_workflow(
    origin: &str,
    json: &str,
    registry: &OperatorRegistry,
    defaults: &OperatorDefaults,
) -> Result<WorkflowDefinition, EngineError> {
    let source: WorkflowSource = serde_json::from_str(json).map_err(|e| EngineError::Source {
        origin: origin.to_owned(),
        message: e.to_string(),
    })?;
    source.build(registry, defaults)
}

/// Load a single workflow source file.
pub fn load_file(
    path: &Path,
    registry: &OperatorRegistry,
    defaults: &OperatorDefaults,
) -> Result<WorkflowDefinition, EngineError> {
    let origin = path.display().to_string();
    let json = std::fs::read_to_string(path).map_err(|e| EngineError::Source {
        origin: origin.clone(),
        message: e.to_string(),
    })?;
    parse_workflow(&origin, &json, registry, defaults)
}

/// Load every `*.json` file in `dir` (non-recursive).
///
/// A file that fails to load, or that repeats an already-loaded workflow id,
/// is recorded in [`LoadReport::import_errors`] and does not stop the others.
///
/// # Errors
/// [`EngineError::Source`] only when the directory itself cannot be read.
pub fn load_directory(
    dir: &Path,
    registry: &OperatorRegistry,
    defaults: &OperatorDefaults,
) -> Result<LoadReport, EngineError> {
    let unreadable = |e: std::io::Error| EngineError::Source {
        origin: dir.display().to_string(),
        message: e.to_string(),
    };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(unreadable)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut report = LoadReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for path in paths {
        match load_file(&path, registry, defaults) {
            Ok(definition) if !seen.insert(definition.workflow_id().to_owned()) => {
                warn!("duplicate workflow id '{}' in {}", definition.workflow_id(), path.display());
                report.import_errors.insert(
                    path,
                    format!("workflow '{}' is already defined", definition.workflow_id()),
                );
            }
            Ok(definition) => report.workflows.push(definition),
            Err(e) => {
                warn!("failed to load {}: {}", path.display(), e);
                report.import_errors.insert(path, e.to_string());
            }
        }
    }

    info!(
        "loaded {} workflows from {} ({} import errors)",
        report.workflows.len(),
        dir.display(),
        report.import_errors.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn registry() -> OperatorRegistry {
        OperatorRegistry::with_builtins()
    }

    #[test]
    fn minimal_source_uses_defaults_and_inherits_start() {
        let json = r#"{
            "workflow_id": "test_dag",
            "start_date": "2020-06-15T00:00:00Z",
            "doc_md": "details",
            "tasks": [{ "task_id": "op1", "operator": "DummyOperator" }]
        }"#;

        let wf = parse_workflow("inline", json, &registry(), &OperatorDefaults::default()).unwrap();
        let task = wf.resolve_task("op1").unwrap();

        assert_eq!(wf.doc_md(), Some("details"));
        assert_eq!(task.owner(), "airflow");
        assert_eq!(task.retry_delay(), Duration::from_secs(300));
        assert_eq!(
            task.start_date(),
            Some(Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn task_fields_override_default_args() {
        let json = r##"{
            "workflow_id": "wf",
            "default_args": { "owner": "team", "retries": 2, "retry_delay_secs": 60 },
            "tasks": [
                { "task_id": "a", "operator": "BashOperator", "retries": 5, "trigger_rule": "one_success" },
                { "task_id": "b", "operator": "DummyOperator", "upstream": ["a"], "ui_color": "#abcdef" }
            ]
        }"##;

        let wf = parse_workflow("inline", json, &registry(), &OperatorDefaults::default()).unwrap();
        let a = wf.resolve_task("a").unwrap();
        let b = wf.resolve_task("b").unwrap();

        assert_eq!(a.owner(), "team");
        assert_eq!(a.retries(), 5);
        assert_eq!(a.retry_delay(), Duration::from_secs(60));
        assert_eq!(a.trigger_rule(), TriggerRule::OneSuccess);
        assert_eq!(a.downstream_task_ids().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(b.retries(), 2);
        assert_eq!(b.ui_color(), "#abcdef");
    }

    #[test]
    fn misspelt_task_field_is_collected_not_applied() {
        let json = r#"{
            "workflow_id": "wf",
            "tasks": [{ "task_id": "a", "operator": "DummyOperator", "retires": 3, "retries": 1 }]
        }"#;

        let source: WorkflowSource = serde_json::from_str(json).unwrap();
        let unknown: Vec<&str> = source.tasks[0].unknown_fields().collect();
        assert_eq!(unknown, vec!["retires"]);
        assert_eq!(source.tasks[0].args.retries, Some(1));

        let wf = source.build(&registry(), &OperatorDefaults::default()).unwrap();
        assert_eq!(wf.resolve_task("a").unwrap().retries(), 1);
    }

    #[test]
    fn unknown_operator_fails() {
        let json = r#"{ "workflow_id": "wf", "tasks": [{ "task_id": "a", "operator": "GhostOperator" }] }"#;
        let err = parse_workflow("inline", json, &registry(), &OperatorDefaults::default()).unwrap_err();
        assert!(matches!(err, EngineError::Operator(_)));
    }

    #[test]
    fn malformed_json_is_a_source_error() {
        let err = parse_workflow("broken.json", "{", &registry(), &OperatorDefaults::default()).unwrap_err();
        assert!(matches!(err, EngineError::Source { origin, .. } if origin == "broken.json"));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{ "workflow_id": "wf", "tasks": [{ "task_id": "a", "operator": "DummyOperator", "retry_delay_secs": -1 }] }"#;
        let err = parse_workflow("inline", json, &registry(), &OperatorDefaults::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { task_id, .. } if task_id == "a"));
    }

    #[test]
    fn directory_load_collects_import_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = r#"{ "workflow_id": "good", "tasks": [{ "task_id": "a", "operator": "DummyOperator" }] }"#;
        let cyclic = r#"{ "workflow_id": "cyclic", "tasks": [
            { "task_id": "a", "operator": "DummyOperator", "downstream": ["b"] },
            { "task_id": "b", "operator": "DummyOperator", "downstream": ["a"] }
        ] }"#;
        std::fs::write(dir.path().join("a_good.json"), good).unwrap();
        std::fs::write(dir.path().join("b_cyclic.json"), cyclic).unwrap();
        std::fs::write(dir.path().join("c_again.json"), good).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let report = load_directory(dir.path(), &registry(), &OperatorDefaults::default()).unwrap();

        let ids: Vec<&str> = report.workflows.iter().map(|w| w.workflow_id()).collect();
        assert_eq!(ids, vec!["good"]);
        assert_eq!(report.import_errors.len(), 2);
        assert!(report.import_errors[&dir.path().join("b_cyclic.json")].contains("cycle"));
        assert!(report.import_errors.contains_key(&dir.path().join("c_again.json")));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = load_directory(Path::new("/definitely/not/here"), &registry(), &OperatorDefaults::default());
        assert!(matches!(err, Err(EngineError::Source { .. })));
    }
}
