//! Presentation shapes returned by the query service.
//!
//! Every optional field is serialized as `null` rather than omitted, so the
//! key set of a formatted task never varies.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{TaskDescriptor, TriggerRule, WeightRule};

const SECS_PER_DAY: u64 = 86_400;

/// `class_ref` object of a formatted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassReference {
    pub class_name: String,
    pub module_path: String,
}

/// A duration split into days, seconds, and microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDelta {
    #[serde(rename = "__type")]
    pub kind: String,
    pub days: u64,
    pub seconds: u64,
    pub microseconds: u32,
}

impl From<Duration> for TimeDelta {
    fn from(d: Duration) -> Self {
        let total = d.as_secs();
        Self {
            kind: "TimeDelta".to_string(),
            days: total / SECS_PER_DAY,
            seconds: total % SECS_PER_DAY,
            microseconds: d.subsec_micros(),
        }
    }
}

/// External representation of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub class_ref: ClassReference,
    pub depends_on_past: bool,
    pub downstream_task_ids: Vec<String>,
    pub end_date: Option<String>,
    pub execution_timeout: Option<String>,
    pub extra_links: Vec<String>,
    pub owner: String,
    pub pool: String,
    pub pool_slots: u32,
    pub priority_weight: i32,
    pub queue: String,
    pub retries: u32,
    pub retry_delay: TimeDelta,
    pub retry_exponential_backoff: bool,
    pub start_date: Option<String>,
    pub task_id: String,
    pub template_fields: Vec<String>,
    pub trigger_rule: TriggerRule,
    pub ui_color: String,
    pub ui_fgcolor: String,
    pub wait_for_downstream: bool,
    pub weight_rule: WeightRule,
}

/// Response of the "list tasks" query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCollection {
    pub tasks: Vec<TaskResponse>,
    pub total_entries: usize,
}

impl TaskCollection {
    pub fn new(tasks: Vec<TaskResponse>) -> Self {
        let total_entries = tasks.len();
        Self { tasks, total_entries }
    }
}

/// Response of the "list workflows" query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowCollection {
    pub workflows: Vec<String>,
    pub total_entries: usize,
}

impl WorkflowCollection {
    pub fn new(workflows: Vec<String>) -> Self {
        let total_entries = workflows.len();
        Self { workflows, total_entries }
    }
}

impl TaskDescriptor {
    /// Produce the external representation of this task.
    pub fn format(&self) -> TaskResponse {
        TaskResponse {
            class_ref: ClassReference {
                class_name: self.class_ref().class_name.clone(),
                module_path: self.class_ref().module_path.clone(),
            },
            depends_on_past: self.depends_on_past(),
            downstream_task_ids: self.downstream_task_ids().map(str::to_owned).collect(),
            end_date: self.end_date().map(format_datetime),
            execution_timeout: self.execution_timeout().map(format_duration),
            extra_links: self.extra_links().to_vec(),
            owner: self.owner().to_owned(),
            pool: self.pool().to_owned(),
            pool_slots: self.pool_slots(),
            priority_weight: self.priority_weight(),
            queue: self.queue().to_owned(),
            retries: self.retries(),
            retry_delay: TimeDelta::from(self.retry_delay()),
            retry_exponential_backoff: self.retry_exponential_backoff(),
            start_date: self.start_date().map(format_datetime),
            task_id: self.task_id().to_owned(),
            template_fields: self.template_fields().to_vec(),
            trigger_rule: self.trigger_rule(),
            ui_color: self.ui_color().to_owned(),
            ui_fgcolor: self.ui_fgcolor().to_owned(),
            wait_for_downstream: self.wait_for_downstream(),
            weight_rule: self.weight_rule(),
        }
    }
}

/// ISO-8601 timestamp with an explicit `+00:00` offset.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// ISO-8601 duration in seconds, e.g. `PT300S` or `PT1.5S`.
pub fn format_duration(d: Duration) -> String {
    let micros = d.subsec_micros();
    if micros == 0 {
        format!("PT{}S", d.as_secs())
    } else {
        let fraction = format!("{micros:06}");
        format!("PT{}.{}S", d.as_secs(), fraction.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use operators::builtin::DummyOperator;
    use serde_json::json;

    #[test]
    fn time_delta_splits_days() {
        let delta = TimeDelta::from(Duration::new(2 * 86_400 + 300, 250_000_000));
        assert_eq!(delta.days, 2);
        assert_eq!(delta.seconds, 300);
        assert_eq!(delta.microseconds, 250_000);
    }

    #[test]
    fn datetimes_use_explicit_offset() {
        let dt = Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(format_datetime(dt), "2020-06-15T00:00:00+00:00");
    }

    #[test]
    fn durations_format_as_iso8601() {
        assert_eq!(format_duration(Duration::from_secs(300)), "PT300S");
        assert_eq!(format_duration(Duration::from_millis(1_500)), "PT1.5S");
        assert_eq!(format_duration(Duration::from_micros(7)), "PT0.000007S");
    }

    #[test]
    fn absent_optionals_serialize_as_null() {
        let task = TaskDescriptor::builder("op1", &DummyOperator).build().unwrap();
        let value = serde_json::to_value(task.format()).unwrap();

        assert_eq!(value["end_date"], json!(null));
        assert_eq!(value["start_date"], json!(null));
        assert_eq!(value["execution_timeout"], json!(null));
        assert_eq!(value.as_object().unwrap().len(), 22);
    }

    #[test]
    fn set_optionals_are_formatted() {
        let task = TaskDescriptor::builder("op1", &DummyOperator)
            .end_date(Utc.with_ymd_and_hms(2021, 1, 1, 12, 30, 0).unwrap())
            .execution_timeout(Duration::from_secs(3_600))
            .downstream("z")
            .downstream("b")
            .build()
            .unwrap();
        let value = serde_json::to_value(task.format()).unwrap();

        assert_eq!(value["end_date"], json!("2021-01-01T12:30:00+00:00"));
        assert_eq!(value["execution_timeout"], json!("PT3600S"));
        assert_eq!(value["downstream_task_ids"], json!(["b", "z"]));
    }
}
