// src/engine/mod.rs

//! Execution engine.
//!
//! This module ties together:
//! - the pure scheduler state machine ([`crate::dag::Scheduler`])
//! - a fixed pool of worker tasks ([`worker`]) that run task work
//! - the coordinator loop ([`runtime`]) that owns the scheduler, hands ready
//!   tasks to idle workers and reacts to:
//!   - task outcome events from workers
//!   - the run deadline
//!   - an external shutdown signal
//!
//! Stopping a run has two phases, published to the workers through
//! `RunSignal`: first nothing new starts (`Draining`), then once the grace
//! period is over the work still in flight is aborted (`Abort`).

use std::time::Duration;

use crate::dag::task::TaskError;
use crate::types::{FailurePolicy, TaskId};

pub mod runtime;
pub mod worker;

pub use runtime::{execute, Executor};

/// Outcome of a task's work as reported by a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Success(T),
    Failed(TaskError),
    /// The worker saw the cancel flag and never started the work.
    Cancelled,
}

impl<T> From<Result<T, TaskError>> for TaskOutcome<T> {
    fn from(res: Result<T, TaskError>) -> Self {
        match res {
            Ok(value) => TaskOutcome::Success(value),
            Err(err) => TaskOutcome::Failed(err),
        }
    }
}

/// Run-wide state broadcast from the coordinator to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunSignal {
    Running,
    /// Deadline or shutdown reached: jobs not yet started are skipped.
    Draining,
    /// Grace period over: in-flight work is aborted.
    Abort,
}

/// Options recognised by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Number of workers; must be at least 1.
    pub worker_count: usize,
    /// Overall deadline for the run. `None` means unbounded.
    pub timeout: Option<Duration>,
    /// What to do with tasks whose dependencies did not all complete.
    pub failure_policy: FailurePolicy,
    /// How long tasks still running at the deadline may take to finish
    /// before they are aborted and reported `Cancelled`.
    pub grace_period: Duration,
}

impl ExecutorOptions {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            timeout: None,
            failure_policy: FailurePolicy::default(),
            grace_period: Duration::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(workers)
    }
}

/// Event flowing from a worker back to the coordinator.
#[derive(Debug)]
pub(crate) struct WorkerEvent<T> {
    pub worker: usize,
    pub task: TaskId,
    pub outcome: TaskOutcome<T>,
    /// The worker is gone and must not be handed more jobs.
    pub retired: bool,
}
