// src/dag/result.rs

//! Results of an executor run.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::dag::task::TaskError;
use crate::dag::task_info::TaskState;
use crate::types::TaskId;

/// Terminal outcome of a single task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult<T> {
    /// The work ran and produced a value.
    Completed(T),
    /// The work ran and failed (or panicked).
    Failed(TaskError),
    /// The task never ran because these dependencies did not complete.
    Blocked { failed_dependencies: Vec<TaskId> },
    /// The run timed out before the task could start.
    Cancelled,
}

impl<T> TaskResult<T> {
    pub fn state(&self) -> TaskState {
        match self {
            TaskResult::Completed(_) => TaskState::Completed,
            TaskResult::Failed(_) => TaskState::Failed,
            TaskResult::Blocked { .. } => TaskState::Blocked,
            TaskResult::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskResult::Completed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            TaskResult::Completed(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            TaskResult::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// When a task was handed to a worker and when its outcome was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub started: Instant,
    pub finished: Instant,
}

impl TaskTiming {
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }
}

/// Mapping from task id to its terminal result.
///
/// Each id is written exactly once; the map is final when every task of the
/// run has an entry.
#[derive(Debug, Clone)]
pub struct ExecutionResult<T> {
    results: BTreeMap<TaskId, TaskResult<T>>,
    timings: BTreeMap<TaskId, TaskTiming>,
}

impl<T> Default for ExecutionResult<T> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            timings: BTreeMap::new(),
        }
    }
}

impl<T> ExecutionResult<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal result. Returns `false` (and keeps the first entry)
    /// if the task already has one.
    pub(crate) fn record(&mut self, task: &str, result: TaskResult<T>) -> bool {
        if self.results.contains_key(task) {
            return false;
        }
        self.results.insert(task.to_string(), result);
        true
    }

    pub(crate) fn record_timing(&mut self, task: &str, timing: TaskTiming) {
        self.timings.insert(task.to_string(), timing);
    }

    pub fn get(&self, task: &str) -> Option<&TaskResult<T>> {
        self.results.get(task)
    }

    /// Value produced by `task`, if it completed.
    pub fn value(&self, task: &str) -> Option<&T> {
        self.results.get(task).and_then(TaskResult::value)
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.results.get(task).map(TaskResult::state)
    }

    /// Start/finish instants for tasks that were dispatched to a worker.
    pub fn timing(&self, task: &str) -> Option<&TaskTiming> {
        self.timings.get(task)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn contains(&self, task: &str) -> bool {
        self.results.contains_key(task)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskResult<T>)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Ids of tasks in the given terminal state.
    pub fn ids_in_state(&self, state: TaskState) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| r.state() == state)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// `true` when every recorded task completed.
    pub fn all_completed(&self) -> bool {
        self.results.values().all(TaskResult::is_completed)
    }

    pub fn into_inner(self) -> BTreeMap<TaskId, TaskResult<T>> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_record_wins() {
        let mut res: ExecutionResult<i32> = ExecutionResult::new();
        assert!(res.record("A", TaskResult::Completed(1)));
        assert!(!res.record("A", TaskResult::Cancelled));

        assert_eq!(res.value("A"), Some(&1));
        assert_eq!(res.len(), 1);
    }

    #[test]
    fn groups_ids_by_state() {
        let mut res: ExecutionResult<i32> = ExecutionResult::new();
        res.record("A", TaskResult::Completed(1));
        res.record("B", TaskResult::Failed(TaskError::msg("nope")));
        res.record(
            "C",
            TaskResult::Blocked {
                failed_dependencies: vec!["B".to_string()],
            },
        );

        assert_eq!(res.ids_in_state(TaskState::Completed), vec!["A"]);
        assert_eq!(res.ids_in_state(TaskState::Failed), vec!["B"]);
        assert_eq!(res.ids_in_state(TaskState::Blocked), vec!["C"]);
        assert!(!res.all_completed());
        assert_eq!(res.get("B").and_then(TaskResult::error), Some(&TaskError::msg("nope")));
    }
}
