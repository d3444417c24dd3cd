// src/dag/task_info.rs

//! Per-task run state.

use crate::types::TaskId;

/// State of a task within one executor run.
///
/// `Pending -> Running -> {Completed | Failed}` is the normal path.
/// `Pending -> Blocked` happens when a dependency did not complete and the
/// run blocks dependents of failures; `Pending | Running -> Cancelled` when
/// the run timed out before the task could start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting on dependencies, or ready and queued for a worker.
    Pending,
    /// Handed to a worker.
    Running,
    Completed,
    Failed,
    /// Never ran because a dependency did not complete.
    Blocked,
    /// Never ran (or never reported) because the run timed out.
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

/// Scheduler bookkeeping for a single task (internal).
#[derive(Debug, Clone)]
pub(crate) struct TaskInfo {
    pub id: TaskId,
    pub state: TaskState,
    /// Dependencies that have not reached a terminal state yet.
    pub remaining: usize,
    /// Dependencies that reached a terminal state other than `Completed`.
    pub failed_parents: Vec<TaskId>,
    /// Set once the task has been pushed onto the ready queue.
    pub queued: bool,
}

impl TaskInfo {
    pub fn new(id: TaskId, dependency_count: usize) -> Self {
        Self {
            id,
            state: TaskState::Pending,
            remaining: dependency_count,
            failed_parents: Vec::new(),
            queued: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_and_running_are_live() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        for state in [
            TaskState::Completed,
            TaskState::Failed,
            TaskState::Blocked,
            TaskState::Cancelled,
        ] {
            assert!(state.is_terminal(), "{state:?} should be terminal");
        }
    }
}
