use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::result::{ExecutionResult, TaskResult, TaskTiming};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task::TaskInputs;
use crate::dag::task_info::{TaskInfo, TaskState};
use crate::engine::TaskOutcome;
use crate::types::{FailurePolicy, TaskId};

/// A task taken off the ready queue, together with what its work gets to see.
#[derive(Debug)]
pub struct ReadyTask<T> {
    pub id: TaskId,
    pub inputs: TaskInputs<T>,
}

/// Scheduler holds a borrowed, immutable graph plus the mutable state of one
/// run.
///
/// It is a synchronous state machine with no channels or Tokio types; the
/// executor feeds it completion events one at a time, which makes it the
/// single serialization point for:
/// - remaining-dependency counters
/// - task states and the ready queue
/// - the result map
pub struct Scheduler<'g, T> {
    graph: &'g TaskGraph,
    policy: FailurePolicy,
    tasks: HashMap<TaskId, TaskInfo>,
    ready: VecDeque<TaskId>,
    results: ExecutionResult<T>,
    started: HashMap<TaskId, Instant>,
    cancelled: bool,
}

impl<T> fmt::Debug for Scheduler<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("policy", &self.policy)
            .field("ready", &self.ready)
            .field("finished", &self.results.len())
            .field("total", &self.tasks.len())
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

impl<'g, T: Clone> Scheduler<'g, T> {
    /// Initialise counters from `graph.reverse` and seed the ready queue with
    /// every task that has no dependencies.
    pub fn new(graph: &'g TaskGraph, policy: FailurePolicy) -> Self {
        let mut tasks = HashMap::with_capacity(graph.len());
        let mut ready = VecDeque::new();

        for (id, deps) in graph.reverse().iter() {
            let mut info = TaskInfo::new(id.clone(), deps.len());
            if deps.is_empty() {
                info.queued = true;
                ready.push_back(id.clone());
            }
            tasks.insert(id.clone(), info);
        }

        debug!(
            tasks = tasks.len(),
            roots = ready.len(),
            ?policy,
            "scheduler: seeded ready queue"
        );

        Self {
            graph,
            policy,
            tasks,
            ready,
            results: ExecutionResult::new(),
            started: HashMap::new(),
            cancelled: false,
        }
    }

    /// Number of tasks in this run.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `true` once every task has a terminal entry in the result map.
    pub fn is_finished(&self) -> bool {
        self.results.len() == self.tasks.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the ready queue has anything to hand out.
    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|info| info.state == TaskState::Running)
            .count()
    }

    /// Read-only view of a task's state.
    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.tasks.get(task).map(|info| info.state)
    }

    /// Dependencies of `task` that have not reached a terminal state yet.
    pub fn remaining_dependencies(&self, task: &str) -> Option<usize> {
        self.tasks.get(task).map(|info| info.remaining)
    }

    /// Pop the next ready task and mark it `Running`.
    ///
    /// The returned inputs carry the values of every completed dependency.
    pub fn next_ready(&mut self) -> Option<ReadyTask<T>> {
        while let Some(id) = self.ready.pop_front() {
            let Some(info) = self.tasks.get_mut(&id) else {
                warn!(task = %id, "ready task missing from tasks map; skipping");
                continue;
            };
            if info.state != TaskState::Pending {
                debug!(task = %id, state = ?info.state, "ready task no longer pending; skipping");
                continue;
            }

            info.state = TaskState::Running;
            let failed = info.failed_parents.clone();
            self.started.insert(id.clone(), Instant::now());

            let values: BTreeMap<TaskId, T> = self
                .graph
                .dependencies_of(&id)
                .iter()
                .filter_map(|dep| self.results.value(dep).map(|v| (dep.clone(), v.clone())))
                .collect();

            debug!(task = %id, deps = values.len(), "dependencies satisfied; marking Running");
            let inputs = TaskInputs::with_parts(id.clone(), values, failed);
            return Some(ReadyTask { id, inputs });
        }
        None
    }

    /// Apply the outcome of a running task and release its dependents.
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome<T>) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return step;
        };
        if info.state != TaskState::Running {
            warn!(task = %task, state = ?info.state, "completion for task that is not running; ignoring");
            return step;
        }

        let (state, result) = match outcome {
            TaskOutcome::Success(value) => (TaskState::Completed, TaskResult::Completed(value)),
            TaskOutcome::Failed(err) => {
                debug!(task = %task, error = %err, "recording task failure");
                step.newly_failed.push(task.to_string());
                (TaskState::Failed, TaskResult::Failed(err))
            }
            TaskOutcome::Cancelled => (TaskState::Cancelled, TaskResult::Cancelled),
        };
        info.state = state;

        let finished = Instant::now();
        if let Some(started) = self.started.remove(task) {
            self.results
                .record_timing(task, TaskTiming { started, finished });
        }
        self.results.record(task, result);
        debug!(task = %task, ?state, "task reached terminal state");

        self.release_dependents(task, state == TaskState::Completed, &mut step);
        step.run_just_finished = self.is_finished();
        if step.run_just_finished {
            info!(tasks = self.tasks.len(), "scheduler: all tasks terminal");
        }
        step
    }

    /// Stop the run: every `Pending` task (queued or not) becomes `Cancelled`.
    /// Running tasks keep running and report their real outcome.
    pub fn cancel_pending(&mut self) -> Vec<TaskId> {
        self.cancelled = true;
        self.ready.clear();

        let mut cancelled: Vec<TaskId> = self
            .tasks
            .values_mut()
            .filter(|info| info.state == TaskState::Pending)
            .map(|info| {
                info.state = TaskState::Cancelled;
                info.id.clone()
            })
            .collect();
        cancelled.sort();

        for id in cancelled.iter() {
            self.results.record(id, TaskResult::Cancelled);
        }

        warn!(
            cancelled = cancelled.len(),
            still_running = self.running_count(),
            "run cancelled; pending tasks will not start"
        );
        cancelled
    }

    /// Hand back the result map; consumes the scheduler.
    pub fn into_result(self) -> ExecutionResult<T> {
        self.results
    }

    /// Decrement the counter of every pending child of `root`.
    ///
    /// A child reaching zero is queued exactly once, or blocked when a
    /// dependency did not complete and the policy says so. Blocked tasks are
    /// terminal, so their own children are released in turn.
    fn release_dependents(&mut self, root: &str, root_completed: bool, step: &mut SchedulerStep) {
        let graph = self.graph;
        let mut stack: Vec<(TaskId, bool)> = vec![(root.to_string(), root_completed)];

        while let Some((parent, parent_completed)) = stack.pop() {
            for child in graph.dependents_of(&parent) {
                let Some(info) = self.tasks.get_mut(child) else {
                    warn!(task = %child, "node in graph not present in tasks map");
                    continue;
                };
                if info.state != TaskState::Pending || info.queued {
                    continue;
                }

                info.remaining = info.remaining.saturating_sub(1);
                if !parent_completed {
                    info.failed_parents.push(parent.clone());
                }
                if info.remaining > 0 {
                    continue;
                }

                if info.failed_parents.is_empty() || self.policy == FailurePolicy::Continue {
                    info.queued = true;
                    self.ready.push_back(child.clone());
                    step.newly_ready.push(child.clone());
                    debug!(task = %child, parent = %parent, "last dependency finished; queued");
                } else {
                    info.state = TaskState::Blocked;
                    info.failed_parents.sort();
                    let failed_dependencies = info.failed_parents.clone();
                    warn!(
                        task = %child,
                        ?failed_dependencies,
                        "dependency did not complete; blocking task"
                    );
                    self.results.record(
                        child,
                        TaskResult::Blocked {
                            failed_dependencies,
                        },
                    );
                    step.newly_blocked.push(child.clone());
                    stack.push((child.clone(), false));
                }
            }
        }
    }
}
