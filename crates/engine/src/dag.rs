//! DAG validation: run whenever a workflow definition is built.
//!
//! Rules enforced:
//! 1. Task IDs must be unique within the workflow.
//! 2. Every downstream ID must name a task of the same workflow, and never
//!    the task itself.
//! 3. The directed graph must be acyclic (topological sort must succeed).
//!
//! Returns a topologically-sorted list of task IDs on success. Ties are
//! broken by definition order, so the result is deterministic.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{models::TaskDescriptor, EngineError};

/// Validate the tasks' dependency graph and return them in execution order.
///
/// # Errors
/// - [`EngineError::DuplicateTaskId`] if two tasks share an ID.
/// - [`EngineError::Validation`] if a task lists itself as downstream.
/// - [`EngineError::UnknownTaskReference`] if a downstream ID is missing.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_dag(tasks: &[TaskDescriptor]) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure task IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for task in tasks {
        if !seen_ids.insert(task.task_id()) {
            return Err(EngineError::DuplicateTaskId(task.task_id().to_owned()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate downstream references
    // -----------------------------------------------------------------------
    for task in tasks {
        for downstream in task.downstream_task_ids() {
            if downstream == task.task_id() {
                return Err(EngineError::Validation {
                    task_id: task.task_id().to_owned(),
                    message: "task cannot be downstream of itself".into(),
                });
            }
            if !seen_ids.contains(downstream) {
                return Err(EngineError::UnknownTaskReference {
                    task_id: task.task_id().to_owned(),
                    downstream_id: downstream.to_owned(),
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // 3. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    let mut in_degree: HashMap<&str, usize> =
        tasks.iter().map(|t| (t.task_id(), 0)).collect();

    for task in tasks {
        for downstream in task.downstream_task_ids() {
            *in_degree.entry(downstream).or_insert(0) += 1;
        }
    }

    let by_id: HashMap<&str, &TaskDescriptor> =
        tasks.iter().map(|t| (t.task_id(), t)).collect();

    // Seed the queue with roots, in definition order.
    let mut queue: VecDeque<&str> = tasks
        .iter()
        .map(|t| t.task_id())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(tasks.len());

    while let Some(task_id) = queue.pop_front() {
        sorted.push(task_id.to_owned());

        for neighbour in by_id[task_id].downstream_task_ids() {
            if let Some(deg) = in_degree.get_mut(neighbour) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    // If we didn't visit every task the graph contains a cycle.
    if sorted.len() != tasks.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(sorted)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use operators::builtin::DummyOperator;

    fn make_task(id: &str, downstream: &[&str]) -> TaskDescriptor {
        let mut task = TaskDescriptor::builder(id, &DummyOperator).build().unwrap();
        // Bypass the builder so invalid graphs can be fed to the validator.
        task.downstream_task_ids = downstream.iter().map(|d| d.to_string()).collect();
        task
    }

    #[test]
    fn valid_linear_dag_returns_sorted_order() {
        // a → b → c, declared out of order
        let tasks = vec![make_task("c", &[]), make_task("a", &["b"]), make_task("b", &["c"])];

        let sorted = validate_dag(&tasks).expect("should be valid");
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn valid_diamond_dag() {
        //   a
        //  / \
        // b   c
        //  \ /
        //   d
        let tasks = vec![
            make_task("a", &["b", "c"]),
            make_task("b", &["d"]),
            make_task("c", &["d"]),
            make_task("d", &[]),
        ];

        let sorted = validate_dag(&tasks).expect("should be valid");
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn independent_roots_keep_definition_order() {
        let tasks = vec![make_task("z", &[]), make_task("m", &[]), make_task("a", &[])];
        assert_eq!(validate_dag(&tasks).unwrap(), vec!["z", "m", "a"]);
    }

    #[test]
    fn duplicate_task_id_is_rejected() {
        let tasks = vec![make_task("a", &[]), make_task("a", &[])];
        assert!(matches!(
            validate_dag(&tasks),
            Err(EngineError::DuplicateTaskId(id)) if id == "a"
        ));
    }

    #[test]
    fn downstream_referencing_missing_task_is_rejected() {
        let tasks = vec![make_task("a", &["ghost"])];
        assert!(matches!(
            validate_dag(&tasks),
            Err(EngineError::UnknownTaskReference { downstream_id, .. }) if downstream_id == "ghost"
        ));
    }

    #[test]
    fn self_loop_is_rejected() {
        let tasks = vec![make_task("a", &["a"])];
        assert!(matches!(validate_dag(&tasks), Err(EngineError::Validation { .. })));
    }

    #[test]
    fn cycle_is_detected() {
        // a → b → c → a
        let tasks = vec![
            make_task("a", &["b"]),
            make_task("b", &["c"]),
            make_task("c", &["a"]),
        ];
        assert!(matches!(validate_dag(&tasks), Err(EngineError::CycleDetected)));
    }

    #[test]
    fn single_task_no_edges_is_valid() {
        let tasks = vec![make_task("solo", &[])];
        assert_eq!(validate_dag(&tasks).unwrap(), vec!["solo"]);
    }
}
