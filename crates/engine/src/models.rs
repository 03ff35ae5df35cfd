//! Core domain models for the catalog.
//!
//! A [`WorkflowDefinition`] owns an ordered list of [`TaskDescriptor`]s. Both
//! are immutable once built: every invariant is checked by the builders, and
//! the catalog only hands out shared references.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use operators::{ClassRef, Operator};

use crate::config::OperatorDefaults;
use crate::dag::validate_dag;
use crate::EngineError;

// ---------------------------------------------------------------------------
// TriggerRule
// ---------------------------------------------------------------------------

/// When a task becomes eligible, given the outcome of its upstream tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    #[default]
    AllSuccess,
    AllFailed,
    AllDone,
    OneSuccess,
    OneFailed,
    NoneFailed,
    NoneFailedOrSkipped,
    NoneSkipped,
    Dummy,
}

impl TriggerRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllSuccess => "all_success",
            Self::AllFailed => "all_failed",
            Self::AllDone => "all_done",
            Self::OneSuccess => "one_success",
            Self::OneFailed => "one_failed",
            Self::NoneFailed => "none_failed",
            Self::NoneFailedOrSkipped => "none_failed_or_skipped",
            Self::NoneSkipped => "none_skipped",
            Self::Dummy => "dummy",
        }
    }
}

impl fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerRule {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_success" => Ok(Self::AllSuccess),
            "all_failed" => Ok(Self::AllFailed),
            "all_done" => Ok(Self::AllDone),
            "one_success" => Ok(Self::OneSuccess),
            "one_failed" => Ok(Self::OneFailed),
            "none_failed" => Ok(Self::NoneFailed),
            "none_failed_or_skipped" => Ok(Self::NoneFailedOrSkipped),
            "none_skipped" => Ok(Self::NoneSkipped),
            "dummy" => Ok(Self::Dummy),
            other => Err(format!("unknown trigger rule: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// WeightRule
// ---------------------------------------------------------------------------

/// How a task's effective priority is derived from its relatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightRule {
    /// Own weight plus the weights of every downstream task.
    #[default]
    Downstream,
    /// Own weight plus the weights of every upstream task.
    Upstream,
    /// Own weight only.
    Absolute,
}

impl WeightRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downstream => "downstream",
            Self::Upstream => "upstream",
            Self::Absolute => "absolute",
        }
    }
}

impl fmt::Display for WeightRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightRule {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "downstream" => Ok(Self::Downstream),
            "upstream" => Ok(Self::Upstream),
            "absolute" => Ok(Self::Absolute),
            other => Err(format!("unknown weight rule: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskDescriptor
// ---------------------------------------------------------------------------

/// Static configuration of a single task.
///
/// Built through [`TaskBuilder`]; fields are read through accessors so the
/// construction-time invariants cannot be bypassed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    task_id: String,
    class_ref: ClassRef,
    owner: String,
    queue: String,
    pool: String,
    pool_slots: u32,
    priority_weight: i32,
    retries: u32,
    retry_delay: Duration,
    retry_exponential_backoff: bool,
    depends_on_past: bool,
    wait_for_downstream: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    execution_timeout: Option<Duration>,
    trigger_rule: TriggerRule,
    weight_rule: WeightRule,
    ui_color: String,
    ui_fgcolor: String,
    pub(crate) downstream_task_ids: BTreeSet<String>,
    template_fields: Vec<String>,
    extra_links: Vec<String>,
}

impl TaskDescriptor {
    /// Start building a task backed by `operator`, using the stock defaults.
    pub fn builder(task_id: impl Into<String>, operator: &dyn Operator) -> TaskBuilder {
        TaskBuilder::new(task_id, operator, &OperatorDefaults::default())
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn class_ref(&self) -> &ClassRef {
        &self.class_ref
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn pool_slots(&self) -> u32 {
        self.pool_slots
    }

    pub fn priority_weight(&self) -> i32 {
        self.priority_weight
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn retry_exponential_backoff(&self) -> bool {
        self.retry_exponential_backoff
    }

    pub fn depends_on_past(&self) -> bool {
        self.depends_on_past
    }

    pub fn wait_for_downstream(&self) -> bool {
        self.wait_for_downstream
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout
    }

    pub fn trigger_rule(&self) -> TriggerRule {
        self.trigger_rule
    }

    pub fn weight_rule(&self) -> WeightRule {
        self.weight_rule
    }

    pub fn ui_color(&self) -> &str {
        &self.ui_color
    }

    pub fn ui_fgcolor(&self) -> &str {
        &self.ui_fgcolor
    }

    /// Downstream task ids in sorted order.
    pub fn downstream_task_ids(&self) -> impl Iterator<Item = &str> {
        self.downstream_task_ids.iter().map(String::as_str)
    }

    pub fn template_fields(&self) -> &[String] {
        &self.template_fields
    }

    pub fn extra_links(&self) -> &[String] {
        &self.extra_links
    }
}

/// Builder for [`TaskDescriptor`].
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: TaskDescriptor,
}

impl TaskBuilder {
    /// Seed a task from the operator's static properties and `defaults`.
    pub fn new(task_id: impl Into<String>, operator: &dyn Operator, defaults: &OperatorDefaults) -> Self {
        Self {
            task: TaskDescriptor {
                task_id: task_id.into(),
                class_ref: operator.class_ref(),
                owner: defaults.owner.clone(),
                queue: defaults.queue.clone(),
                pool: defaults.pool.clone(),
                pool_slots: 1,
                priority_weight: 1,
                retries: defaults.retries,
                retry_delay: defaults.retry_delay,
                retry_exponential_backoff: false,
                depends_on_past: false,
                wait_for_downstream: false,
                start_date: None,
                end_date: None,
                execution_timeout: None,
                trigger_rule: TriggerRule::default(),
                weight_rule: WeightRule::default(),
                ui_color: operator.ui_color().to_owned(),
                ui_fgcolor: operator.ui_fgcolor().to_owned(),
                downstream_task_ids: BTreeSet::new(),
                template_fields: operator.template_fields(),
                extra_links: operator.extra_links(),
            },
        }
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.task.owner = owner.into();
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.task.queue = queue.into();
        self
    }

    pub fn pool(mut self, pool: impl Into<String>) -> Self {
        self.task.pool = pool.into();
        self
    }

    pub fn pool_slots(mut self, pool_slots: u32) -> Self {
        self.task.pool_slots = pool_slots;
        self
    }

    pub fn priority_weight(mut self, priority_weight: i32) -> Self {
        self.task.priority_weight = priority_weight;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.task.retries = retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.task.retry_delay = retry_delay;
        self
    }

    pub fn retry_exponential_backoff(mut self, enabled: bool) -> Self {
        self.task.retry_exponential_backoff = enabled;
        self
    }

    pub fn depends_on_past(mut self, enabled: bool) -> Self {
        self.task.depends_on_past = enabled;
        self
    }

    /// Waiting for the previous run's downstream tasks implies depending on
    /// the past run, so this also sets `depends_on_past`.
    pub fn wait_for_downstream(mut self, enabled: bool) -> Self {
        self.task.wait_for_downstream = enabled;
        if enabled {
            self.task.depends_on_past = true;
        }
        self
    }

    pub fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.task.start_date = Some(start_date);
        self
    }

    pub fn end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.task.end_date = Some(end_date);
        self
    }

    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.task.execution_timeout = Some(timeout);
        self
    }

    pub fn trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.task.trigger_rule = rule;
        self
    }

    pub fn weight_rule(mut self, rule: WeightRule) -> Self {
        self.task.weight_rule = rule;
        self
    }

    pub fn ui_color(mut self, color: impl Into<String>) -> Self {
        self.task.ui_color = color.into();
        self
    }

    pub fn ui_fgcolor(mut self, color: impl Into<String>) -> Self {
        self.task.ui_fgcolor = color.into();
        self
    }

    pub fn template_fields(mut self, fields: Vec<String>) -> Self {
        self.task.template_fields = fields;
        self
    }

    pub fn extra_links(mut self, links: Vec<String>) -> Self {
        self.task.extra_links = links;
        self
    }

    /// Add a downstream dependency on `task_id`.
    pub fn downstream(mut self, task_id: impl Into<String>) -> Self {
        self.task.downstream_task_ids.insert(task_id.into());
        self
    }

    /// Validate and produce the descriptor.
    ///
    /// Durations are truncated to microseconds, the finest unit a snapshot
    /// or the formatted output can carry.
    ///
    /// # Errors
    /// [`EngineError::Validation`] for an empty id, `pool_slots < 1`, an end
    /// date before the start date, a self-referencing downstream id, or a
    /// duration longer than `u64::MAX` microseconds.
    pub fn build(self) -> Result<TaskDescriptor, EngineError> {
        let mut task = self.task;
        let invalid = |task_id: &str, message: String| EngineError::Validation {
            task_id: task_id.to_owned(),
            message,
        };

        if task.task_id.trim().is_empty() {
            return Err(invalid(&task.task_id, "task_id must not be empty".into()));
        }
        if task.pool_slots < 1 {
            return Err(invalid(
                &task.task_id,
                format!("pool slots must be >= 1, got {}", task.pool_slots),
            ));
        }
        if task.downstream_task_ids.contains(&task.task_id) {
            return Err(invalid(&task.task_id, "task cannot be downstream of itself".into()));
        }
        if let (Some(start), Some(end)) = (task.start_date, task.end_date) {
            if end < start {
                return Err(invalid(
                    &task.task_id,
                    format!("end_date {end} is before start_date {start}"),
                ));
            }
        }

        let too_long = |what: &str, d: Duration| {
            invalid(
                &task.task_id,
                format!("{what} of {}s exceeds u64::MAX microseconds", d.as_secs()),
            )
        };
        if u64::try_from(task.retry_delay.as_micros()).is_err() {
            return Err(too_long("retry_delay", task.retry_delay));
        }
        if let Some(timeout) = task.execution_timeout {
            if u64::try_from(timeout.as_micros()).is_err() {
                return Err(too_long("execution_timeout", timeout));
            }
        }

        task.retry_delay = truncate_to_micros(task.retry_delay);
        task.execution_timeout = task.execution_timeout.map(truncate_to_micros);
        Ok(task)
    }
}

fn truncate_to_micros(d: Duration) -> Duration {
    Duration::new(d.as_secs(), d.subsec_micros() * 1_000)
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete, validated workflow definition.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    workflow_id: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    doc_md: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    tasks: Vec<TaskDescriptor>,
    index: HashMap<String, usize>,
    topological_order: Vec<String>,
}

impl WorkflowDefinition {
    pub fn builder(workflow_id: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder {
            workflow_id: workflow_id.into(),
            start_date: None,
            end_date: None,
            doc_md: None,
            description: None,
            tags: Vec::new(),
            tasks: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn doc_md(&self) -> Option<&str> {
        self.doc_md.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Tasks in definition order.
    pub fn list_tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    /// Resolve a task by id.
    ///
    /// # Errors
    /// [`EngineError::TaskNotFound`] when the workflow has no such task.
    pub fn resolve_task(&self, task_id: &str) -> Result<&TaskDescriptor, EngineError> {
        self.index
            .get(task_id)
            .map(|&i| &self.tasks[i])
            .ok_or_else(|| EngineError::TaskNotFound {
                workflow_id: self.workflow_id.clone(),
                task_id: task_id.to_owned(),
            })
    }

    /// Re-run graph validation. Always succeeds for a built definition.
    pub fn validate(&self) -> Result<Vec<String>, EngineError> {
        validate_dag(&self.tasks)
    }

    /// Task ids in a valid execution order.
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Ids of the tasks that list `task_id` as downstream, in definition order.
    pub fn upstream_task_ids(&self, task_id: &str) -> Result<Vec<&str>, EngineError> {
        self.resolve_task(task_id)?;
        Ok(self
            .tasks
            .iter()
            .filter(|t| t.downstream_task_ids.contains(task_id))
            .map(|t| t.task_id())
            .collect())
    }

    /// Effective priority of a task under its weight rule.
    pub fn priority_weight_total(&self, task_id: &str) -> Result<i64, EngineError> {
        let task = self.resolve_task(task_id)?;
        let own = i64::from(task.priority_weight);

        let relatives = match task.weight_rule {
            WeightRule::Absolute => return Ok(own),
            WeightRule::Downstream => self.relatives(task_id, |t| {
                t.downstream_task_ids.iter().map(String::as_str).collect()
            }),
            WeightRule::Upstream => self.relatives(task_id, |t| {
                self.tasks
                    .iter()
                    .filter(|u| u.downstream_task_ids.contains(t.task_id()))
                    .map(|u| u.task_id())
                    .collect()
            }),
        };

        Ok(own
            + relatives
                .iter()
                .map(|id| i64::from(self.tasks[self.index[*id]].priority_weight))
                .sum::<i64>())
    }

    /// All transitive relatives of `task_id` reachable through `step`,
    /// excluding the task itself.
    fn relatives<'a, F>(&'a self, task_id: &'a str, step: F) -> BTreeSet<&'a str>
    where
        F: Fn(&'a TaskDescriptor) -> Vec<&'a str>,
    {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = vec![task_id];

        while let Some(id) = stack.pop() {
            let task = &self.tasks[self.index[id]];
            for next in step(task) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }

        seen
    }
}

/// Builder for [`WorkflowDefinition`].
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    workflow_id: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    doc_md: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    tasks: Vec<TaskDescriptor>,
    edges: Vec<(String, String)>,
}

impl WorkflowBuilder {
    pub fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn doc_md(mut self, doc_md: impl Into<String>) -> Self {
        self.doc_md = Some(doc_md.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Append a task; definition order is preserved.
    pub fn task(mut self, task: TaskDescriptor) -> Self {
        self.tasks.push(task);
        self
    }

    /// Declare `upstream >> downstream` after the tasks were built.
    pub fn dependency(mut self, upstream: impl Into<String>, downstream: impl Into<String>) -> Self {
        self.edges.push((upstream.into(), downstream.into()));
        self
    }

    /// Validate and produce the definition.
    ///
    /// Tasks without their own start/end date inherit the workflow's.
    ///
    /// # Errors
    /// - [`EngineError::Validation`] for an empty workflow id, a
    ///   dependency naming an unknown or identical upstream task, or an end
    ///   date before the start date once dates are inherited.
    /// - [`EngineError::DuplicateTaskId`], [`EngineError::UnknownTaskReference`],
    ///   [`EngineError::CycleDetected`] from graph validation.
    pub fn build(self) -> Result<WorkflowDefinition, EngineError> {
        if self.workflow_id.trim().is_empty() {
            return Err(EngineError::Validation {
                task_id: String::new(),
                message: "workflow_id must not be empty".into(),
            });
        }

        let mut tasks = self.tasks;

        for (upstream, downstream) in self.edges {
            if upstream == downstream {
                return Err(EngineError::Validation {
                    task_id: upstream,
                    message: "task cannot be downstream of itself".into(),
                });
            }
            let task = tasks
                .iter_mut()
                .find(|t| t.task_id == upstream)
                .ok_or_else(|| EngineError::Validation {
                    task_id: upstream.clone(),
                    message: format!("dependency on '{downstream}' names an unknown upstream task"),
                })?;
            task.downstream_task_ids.insert(downstream);
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(EngineError::Validation {
                    task_id: String::new(),
                    message: format!("workflow end_date {end} is before start_date {start}"),
                });
            }
        }

        for task in &mut tasks {
            if task.start_date.is_none() {
                task.start_date = self.start_date;
            }
            if task.end_date.is_none() {
                task.end_date = self.end_date;
            }
            if let (Some(start), Some(end)) = (task.start_date, task.end_date) {
                if end < start {
                    return Err(EngineError::Validation {
                        task_id: task.task_id.clone(),
                        message: format!("end_date {end} is before start_date {start}"),
                    });
                }
            }
        }

        let topological_order = validate_dag(&tasks)?;
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.task_id.clone(), i))
            .collect();

        Ok(WorkflowDefinition {
            workflow_id: self.workflow_id,
            start_date: self.start_date,
            end_date: self.end_date,
            doc_md: self.doc_md,
            description: self.description,
            tags: self.tags,
            tasks,
            index,
            topological_order,
        })
    }
}
