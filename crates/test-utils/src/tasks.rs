#![allow(dead_code)]

//! Ready-made task specs for executor tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dagrun::dag::{TaskError, TaskInputs, TaskSpec};

/// Task that completes immediately with `value`.
pub fn value_task<T>(id: &str, value: T) -> TaskSpec<T>
where
    T: Clone + Send + Sync + 'static,
{
    TaskSpec::new(id, move |_inputs: TaskInputs<T>| {
        let value = value.clone();
        async move { Ok::<T, TaskError>(value) }
    })
}

/// Task whose work returns an error carrying `message`.
pub fn failing_task<T>(id: &str, message: &str) -> TaskSpec<T>
where
    T: Send + 'static,
{
    let message = message.to_string();
    TaskSpec::new(id, move |_inputs: TaskInputs<T>| {
        let message = message.clone();
        async move { Err::<T, TaskError>(TaskError::Failed(message)) }
    })
}

/// Task that sleeps for `duration` and then completes with `value`.
pub fn sleeping_task<T>(id: &str, duration: Duration, value: T) -> TaskSpec<T>
where
    T: Clone + Send + Sync + 'static,
{
    TaskSpec::new(id, move |_inputs: TaskInputs<T>| {
        let value = value.clone();
        async move {
            tokio::time::sleep(duration).await;
            Ok::<T, TaskError>(value)
        }
    })
}

#[derive(Debug, Default)]
struct RecorderState {
    running: usize,
    max_running: usize,
    started: Vec<String>,
    spans: BTreeMap<String, (Instant, Option<Instant>)>,
}

/// Records when tasks start and finish and how many overlap.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<RecorderState>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task that sleeps for `duration` and completes with `()`, recording
    /// itself in this recorder.
    pub fn task(&self, id: &str, duration: Duration) -> TaskSpec<()> {
        let recorder = self.clone();
        TaskSpec::new(id, move |inputs: TaskInputs<()>| {
            let recorder = recorder.clone();
            let id = inputs.task_id().to_string();
            async move {
                recorder.enter(&id);
                tokio::time::sleep(duration).await;
                recorder.exit(&id);
                Ok::<(), TaskError>(())
            }
        })
    }

    fn enter(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.running += 1;
        state.max_running = state.max_running.max(state.running);
        state.started.push(id.to_string());
        state.spans.insert(id.to_string(), (Instant::now(), None));
    }

    fn exit(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.running -= 1;
        if let Some(span) = state.spans.get_mut(id) {
            span.1 = Some(Instant::now());
        }
    }

    /// Largest number of recorder tasks that ever ran at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.state.lock().unwrap().max_running
    }

    /// Task ids in the order their work started.
    pub fn start_order(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn started(&self, id: &str) -> bool {
        self.state.lock().unwrap().spans.contains_key(id)
    }

    /// `(started, finished)` of a task whose work ran to the end.
    pub fn span(&self, id: &str) -> Option<(Instant, Instant)> {
        let state = self.state.lock().unwrap();
        let (start, end) = state.spans.get(id)?;
        Some((*start, (*end)?))
    }
}
