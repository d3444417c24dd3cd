// src/engine/runtime.rs

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::planner::{max_parallelism, plan};
use crate::dag::result::ExecutionResult;
use crate::dag::scheduler::Scheduler;
use crate::dag::task::{TaskSpec, TaskWork};
use crate::dag::task_info::TaskState;
use crate::errors::{DagError, Result};

use super::worker::{spawn_worker, Job};
use super::{ExecutorOptions, RunSignal, WorkerEvent};

/// Dependency-aware executor.
///
/// Each call to [`Executor::run`] owns its own scheduler, worker pool and
/// result map; nothing is shared between runs.
#[derive(Debug, Clone)]
pub struct Executor {
    options: ExecutorOptions,
}

struct WorkerSlot<T> {
    jobs: mpsc::Sender<Job<T>>,
    handle: JoinHandle<()>,
}

impl Executor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Run every task to a terminal state.
    ///
    /// Validation (worker count, specs matching the graph, acyclicity)
    /// happens before any work starts.
    pub async fn run<T>(&self, tasks: &[TaskSpec<T>], graph: &TaskGraph) -> Result<ExecutionResult<T>>
    where
        T: Clone + Send + 'static,
    {
        self.run_until(tasks, graph, std::future::pending::<()>())
            .await
    }

    /// Like [`Executor::run`], but `shutdown` resolving has the same effect as
    /// the timeout firing: pending tasks are cancelled, and running tasks get
    /// `grace_period` to finish before they are aborted and reported
    /// `Cancelled`.
    pub async fn run_until<T, S>(
        &self,
        tasks: &[TaskSpec<T>],
        graph: &TaskGraph,
        shutdown: S,
    ) -> Result<ExecutionResult<T>>
    where
        T: Clone + Send + 'static,
        S: Future<Output = ()>,
    {
        let worker_count = self.options.worker_count;
        if worker_count == 0 {
            return Err(DagError::InvalidWorkerCount(worker_count));
        }

        let works = index_work(tasks, graph)?;
        let layers = plan(graph)?;

        info!(
            tasks = graph.len(),
            layers = layers.len(),
            max_parallelism = max_parallelism(&layers),
            workers = worker_count,
            timeout_ms = self.options.timeout.map(|t| t.as_millis() as u64),
            "starting run"
        );

        let mut scheduler: Scheduler<'_, T> = Scheduler::new(graph, self.options.failure_policy);
        if scheduler.is_finished() {
            return Ok(scheduler.into_result());
        }

        let (event_tx, mut event_rx) = mpsc::channel::<WorkerEvent<T>>(worker_count);
        let (signal_tx, signal_rx) = watch::channel(RunSignal::Running);

        let pool: Vec<WorkerSlot<T>> = (0..worker_count)
            .map(|index| {
                let (jobs, job_rx) = mpsc::channel::<Job<T>>(1);
                let handle = spawn_worker(index, job_rx, event_tx.clone(), signal_rx.clone());
                WorkerSlot { jobs, handle }
            })
            .collect();
        drop(event_tx);

        let mut idle: VecDeque<usize> = (0..worker_count).collect();
        // A deadline too far out to represent is no deadline.
        let deadline = self
            .options
            .timeout
            .and_then(|t| Instant::now().checked_add(t));
        let mut abort_at: Option<Instant> = None;
        let mut aborted = false;
        let run_started = Instant::now();
        tokio::pin!(shutdown);

        dispatch(&mut scheduler, &works, &pool, &mut idle).await?;

        while !scheduler.is_finished() {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(WorkerEvent { worker, task, outcome, retired }) = event else {
                        return Err(anyhow!("worker pool exited before the run finished").into());
                    };
                    if retired {
                        warn!(worker, "worker retired from the pool");
                    } else {
                        idle.push_back(worker);
                    }

                    let step = scheduler.handle_completion(&task, outcome);
                    debug!(
                        task = %task,
                        newly_ready = ?step.newly_ready,
                        newly_blocked = ?step.newly_blocked,
                        "processed task outcome"
                    );

                    if !scheduler.is_cancelled() {
                        if idle.is_empty() && scheduler.running_count() == 0 && scheduler.has_ready() {
                            return Err(anyhow!("no workers left to run ready tasks").into());
                        }
                        dispatch(&mut scheduler, &works, &pool, &mut idle).await?;
                    }
                }

                _ = wait_for_deadline(deadline), if deadline.is_some() && !scheduler.is_cancelled() => {
                    warn!(
                        elapsed_ms = run_started.elapsed().as_millis() as u64,
                        "run timed out; cancelling tasks that have not started"
                    );
                    abort_at = begin_drain(&mut scheduler, &signal_tx, self.options.grace_period);
                }

                _ = &mut shutdown, if !scheduler.is_cancelled() => {
                    warn!("shutdown requested; cancelling tasks that have not started");
                    abort_at = begin_drain(&mut scheduler, &signal_tx, self.options.grace_period);
                }

                _ = wait_for_deadline(abort_at), if abort_at.is_some() && !aborted => {
                    warn!(
                        still_running = scheduler.running_count(),
                        "grace period over; aborting running tasks"
                    );
                    let _ = signal_tx.send(RunSignal::Abort);
                    aborted = true;
                }
            }
        }

        // Closing the job channels lets every worker leave its loop.
        let handles: Vec<JoinHandle<()>> = pool.into_iter().map(|slot| slot.handle).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }

        let result = scheduler.into_result();
        info!(
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            completed = result.ids_in_state(TaskState::Completed).len(),
            failed = result.ids_in_state(TaskState::Failed).len(),
            blocked = result.ids_in_state(TaskState::Blocked).len(),
            cancelled = result.ids_in_state(TaskState::Cancelled).len(),
            "run finished"
        );
        Ok(result)
    }
}

/// Build the graph from `tasks` and run them.
pub async fn execute<T>(tasks: &[TaskSpec<T>], options: ExecutorOptions) -> Result<ExecutionResult<T>>
where
    T: Clone + Send + 'static,
{
    let graph = TaskGraph::build(tasks)?;
    Executor::new(options).run(tasks, &graph).await
}

/// Hand ready tasks to idle workers until one of the two runs out.
async fn dispatch<T>(
    scheduler: &mut Scheduler<'_, T>,
    works: &HashMap<&str, Arc<dyn TaskWork<T>>>,
    pool: &[WorkerSlot<T>],
    idle: &mut VecDeque<usize>,
) -> Result<()>
where
    T: Clone + Send + 'static,
{
    while !idle.is_empty() && scheduler.has_ready() {
        let Some(ready) = scheduler.next_ready() else {
            break;
        };
        let Some(worker) = idle.pop_front() else {
            break;
        };
        let work = works
            .get(ready.id.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("no work registered for task '{}'", ready.id))?;

        debug!(task = %ready.id, worker, "dispatching task");
        let job = Job {
            task: ready.id,
            inputs: ready.inputs,
            work,
        };
        pool[worker]
            .jobs
            .send(job)
            .await
            .map_err(|_| anyhow!("worker {worker} stopped accepting jobs"))?;
    }
    Ok(())
}

/// Map task ids to their work, checking that specs and graph describe the
/// same tasks.
fn index_work<'a, T>(
    tasks: &'a [TaskSpec<T>],
    graph: &TaskGraph,
) -> Result<HashMap<&'a str, Arc<dyn TaskWork<T>>>> {
    let mut works = HashMap::with_capacity(tasks.len());

    for spec in tasks {
        if !graph.contains(spec.id()) {
            return Err(DagError::ConfigError(format!(
                "task '{}' is not part of the graph",
                spec.id()
            )));
        }
        if graph.dependencies_of(spec.id()) != spec.dependencies() {
            return Err(DagError::ConfigError(format!(
                "dependencies of task '{}' differ from the graph",
                spec.id()
            )));
        }
        if works.insert(spec.id(), spec.work()).is_some() {
            return Err(DagError::DuplicateTaskId(spec.id().to_string()));
        }
    }

    if let Some(missing) = graph.tasks().find(|id| !works.contains_key(id)) {
        return Err(DagError::ConfigError(format!(
            "graph task '{missing}' has no task spec"
        )));
    }

    Ok(works)
}

/// Stop dispatching and cancel everything still pending.
///
/// Returns when running tasks must be aborted; `None` means they may run to
/// completion.
fn begin_drain<T: Clone>(
    scheduler: &mut Scheduler<'_, T>,
    signal: &watch::Sender<RunSignal>,
    grace: Duration,
) -> Option<Instant> {
    let _ = signal.send(RunSignal::Draining);
    scheduler.cancel_pending();
    Instant::now().checked_add(grace)
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
