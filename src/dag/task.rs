// src/dag/task.rs

//! Task specifications and the opaque unit of work they carry.
//!
//! The scheduler never looks inside a task's work: it only hands it a
//! [`TaskInputs`] value once the task is ready and waits for the returned
//! future to resolve.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::types::TaskId;

/// Failure captured from a task's work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The work returned an error.
    #[error("{0}")]
    Failed(String),

    /// The work panicked; the panic was contained to this task.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn msg(message: impl fmt::Display) -> Self {
        TaskError::Failed(message.to_string())
    }

    pub(crate) fn from_join_error(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "non-string panic payload".to_string()
            };
            TaskError::Panicked(message)
        } else {
            TaskError::Failed(format!("task aborted: {err}"))
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Failed(format!("{err:#}"))
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        TaskError::Failed(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        TaskError::Failed(message.to_string())
    }
}

/// What a task's work sees when it starts: its own id and the values produced
/// by its dependencies.
#[derive(Debug, Clone)]
pub struct TaskInputs<T> {
    task: TaskId,
    values: BTreeMap<TaskId, T>,
    failed: Vec<TaskId>,
}

impl<T> TaskInputs<T> {
    pub fn new(task: impl Into<TaskId>) -> Self {
        Self {
            task: task.into(),
            values: BTreeMap::new(),
            failed: Vec::new(),
        }
    }

    pub(crate) fn with_parts(task: TaskId, values: BTreeMap<TaskId, T>, failed: Vec<TaskId>) -> Self {
        Self { task, values, failed }
    }

    /// Id of the task these inputs belong to.
    pub fn task_id(&self) -> &str {
        &self.task
    }

    /// Value produced by the given dependency, if it completed.
    pub fn get(&self, dependency: &str) -> Option<&T> {
        self.values.get(dependency)
    }

    /// Values of all completed dependencies, ordered by dependency id.
    pub fn values(&self) -> impl Iterator<Item = (&str, &T)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Dependencies that reached a terminal state without completing.
    ///
    /// Only ever non-empty under `FailurePolicy::Continue`.
    pub fn failed_dependencies(&self) -> &[TaskId] {
        &self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.failed.is_empty()
    }
}

/// Boxed future returned by [`TaskWork::start`].
pub type WorkFuture<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send + 'static>>;

/// The opaque effect of a task.
///
/// Implemented for every `Fn(TaskInputs<T>) -> impl Future<Output =
/// Result<T, TaskError>>`, so most callers pass an async closure.
pub trait TaskWork<T>: Send + Sync {
    fn start(&self, inputs: TaskInputs<T>) -> WorkFuture<T>;
}

impl<T, F, Fut> TaskWork<T> for F
where
    F: Fn(TaskInputs<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    fn start(&self, inputs: TaskInputs<T>) -> WorkFuture<T> {
        Box::pin((self)(inputs))
    }
}

/// Adapter running a synchronous closure on tokio's blocking pool.
pub struct BlockingWork<F>(Arc<F>);

impl<T, F> TaskWork<T> for BlockingWork<F>
where
    T: Send + 'static,
    F: Fn(TaskInputs<T>) -> Result<T, TaskError> + Send + Sync + 'static,
{
    fn start(&self, inputs: TaskInputs<T>) -> WorkFuture<T> {
        let f = Arc::clone(&self.0);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(inputs)).await {
                Ok(res) => res,
                Err(err) => Err(TaskError::from_join_error(err)),
            }
        })
    }
}

/// Immutable description of one unit of work.
pub struct TaskSpec<T> {
    id: TaskId,
    dependencies: BTreeSet<TaskId>,
    work: Arc<dyn TaskWork<T>>,
}

impl<T: Send + 'static> TaskSpec<T> {
    /// Create a task from an async closure; add dependencies with
    /// [`TaskSpec::after`].
    pub fn new<F, Fut>(id: impl Into<TaskId>, f: F) -> Self
    where
        F: Fn(TaskInputs<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self::with_work(id, f)
    }

    /// Create a task from any [`TaskWork`] implementation.
    pub fn with_work<W>(id: impl Into<TaskId>, work: W) -> Self
    where
        W: TaskWork<T> + 'static,
    {
        Self {
            id: id.into(),
            dependencies: BTreeSet::new(),
            work: Arc::new(work),
        }
    }

    /// Create a task whose work is a synchronous (possibly blocking) closure.
    pub fn blocking<F>(id: impl Into<TaskId>, f: F) -> Self
    where
        F: Fn(TaskInputs<T>) -> Result<T, TaskError> + Send + Sync + 'static,
    {
        Self::with_work(id, BlockingWork(Arc::new(f)))
    }
}

impl<T> TaskSpec<T> {
    /// Add dependencies: this task waits for all of them.
    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependencies(&self) -> &BTreeSet<TaskId> {
        &self.dependencies
    }

    pub(crate) fn work(&self) -> Arc<dyn TaskWork<T>> {
        Arc::clone(&self.work)
    }
}

impl<T> Clone for TaskSpec<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            dependencies: self.dependencies.clone(),
            work: Arc::clone(&self.work),
        }
    }
}

impl<T> fmt::Debug for TaskSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_collapses_duplicate_dependencies() {
        let spec: TaskSpec<i32> = TaskSpec::new("C", |_inputs| async { Ok(0) })
            .after(["A", "B"])
            .after(["A"]);

        assert_eq!(spec.id(), "C");
        let deps: Vec<&str> = spec.dependencies().iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["A", "B"]);
    }

    #[test]
    fn inputs_expose_values_by_dependency() {
        let mut values = BTreeMap::new();
        values.insert("A".to_string(), 1);
        values.insert("B".to_string(), 2);
        let inputs = TaskInputs::with_parts("C".to_string(), values, vec!["D".to_string()]);

        assert_eq!(inputs.task_id(), "C");
        assert_eq!(inputs.get("A"), Some(&1));
        assert_eq!(inputs.get("D"), None);
        assert_eq!(inputs.values().map(|(_, v)| *v).sum::<i32>(), 3);
        assert_eq!(inputs.failed_dependencies(), &["D".to_string()]);
    }

    #[tokio::test]
    async fn blocking_work_runs_and_captures_panics() {
        let ok: TaskSpec<i32> = TaskSpec::blocking("ok", |_| Ok(7));
        assert_eq!(ok.work().start(TaskInputs::new("ok")).await, Ok(7));

        let boom: TaskSpec<i32> = TaskSpec::blocking("boom", |_| panic!("kaput"));
        match boom.work().start(TaskInputs::new("boom")).await {
            Err(TaskError::Panicked(msg)) => assert!(msg.contains("kaput")),
            other => panic!("expected panic capture, got {other:?}"),
        }
    }
}
