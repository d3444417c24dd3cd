// src/engine/worker.rs

//! Worker tasks of the executor pool.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::task::{TaskError, TaskInputs, TaskWork};
use crate::engine::{RunSignal, TaskOutcome, WorkerEvent};
use crate::types::TaskId;

/// A ready task handed to a worker by the coordinator.
pub(crate) struct Job<T> {
    pub task: TaskId,
    pub inputs: TaskInputs<T>,
    pub work: Arc<dyn TaskWork<T>>,
}

/// Reports the job a worker holds if the worker unwinds before reporting it,
/// so the coordinator never waits on a task that nobody runs.
struct InFlight<T> {
    worker: usize,
    task: Option<TaskId>,
    events: mpsc::Sender<WorkerEvent<T>>,
}

impl<T> Drop for InFlight<T> {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        error!(worker = self.worker, task = %task, "worker exited while holding a task");
        // The coordinator keeps one event slot per worker, so this cannot be full.
        let _ = self.events.try_send(WorkerEvent {
            worker: self.worker,
            task,
            outcome: TaskOutcome::Failed(TaskError::Panicked("worker exited unexpectedly".to_string())),
            retired: true,
        });
    }
}

/// Spawn one worker of the pool.
///
/// The worker runs one job at a time and reports every job back on
/// `events`, including jobs it declined to start because the run is
/// draining and jobs aborted when the grace period ran out. It exits when
/// its job channel closes.
pub(crate) fn spawn_worker<T: Send + 'static>(
    index: usize,
    mut jobs: mpsc::Receiver<Job<T>>,
    events: mpsc::Sender<WorkerEvent<T>>,
    mut signal: watch::Receiver<RunSignal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(worker = index, "worker started");

        while let Some(Job { task, inputs, work }) = jobs.recv().await {
            let mut in_flight = InFlight {
                worker: index,
                task: Some(task.clone()),
                events: events.clone(),
            };

            let state = *signal.borrow();
            let outcome = if state == RunSignal::Running {
                run_job(index, &task, work, inputs, &mut signal).await
            } else {
                debug!(worker = index, task = %task, "run stopping before start; skipping work");
                TaskOutcome::Cancelled
            };

            in_flight.task = None;
            let event = WorkerEvent {
                worker: index,
                task,
                outcome,
                retired: false,
            };
            if events.send(event).await.is_err() {
                debug!(worker = index, "coordinator gone; worker exiting");
                break;
            }
        }

        debug!(worker = index, "worker finished (channel closed)");
    })
}

async fn run_job<T: Send + 'static>(
    index: usize,
    task: &str,
    work: Arc<dyn TaskWork<T>>,
    inputs: TaskInputs<T>,
    signal: &mut watch::Receiver<RunSignal>,
) -> TaskOutcome<T> {
    info!(worker = index, task = %task, "starting task");
    let started = Instant::now();

    // Building the future happens inside the spawned task too, so a panic
    // anywhere in the work stays in that task.
    let mut handle = tokio::spawn(async move { work.start(inputs).await });

    let outcome = tokio::select! {
        joined = &mut handle => match joined {
            Ok(res) => TaskOutcome::from(res),
            Err(err) => TaskOutcome::Failed(TaskError::from_join_error(err)),
        },
        _ = wait_for_abort(signal) => {
            handle.abort();
            TaskOutcome::Cancelled
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        TaskOutcome::Success(_) => {
            info!(worker = index, task = %task, elapsed_ms, "task completed");
        }
        TaskOutcome::Failed(err) => {
            warn!(worker = index, task = %task, elapsed_ms, error = %err, "task failed");
        }
        TaskOutcome::Cancelled => {
            warn!(worker = index, task = %task, elapsed_ms, "grace period over; task aborted");
        }
    }
    outcome
}

async fn wait_for_abort(signal: &mut watch::Receiver<RunSignal>) {
    let aborted = signal.wait_for(|s| *s == RunSignal::Abort).await.is_ok();
    if !aborted {
        // Coordinator gone without aborting; let the work finish.
        std::future::pending::<()>().await;
    }
}
