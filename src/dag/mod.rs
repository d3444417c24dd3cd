// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`task`] defines task specifications and the work they carry.
//! - [`graph`] validates specs into forward/reverse adjacency sets.
//! - [`planner`] groups tasks into parallelism layers (and finds cycles).
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, and when dependents can be scheduled.
//! - [`task_info`] provides per-task run state.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`result`] holds the per-run result map.

pub mod graph;
pub mod planner;
pub mod result;
pub mod scheduler;
pub mod scheduler_step;
pub mod task;
pub mod task_info;

pub use graph::TaskGraph;
pub use planner::{max_parallelism, plan, Layer};
pub use result::{ExecutionResult, TaskResult, TaskTiming};
pub use scheduler::{ReadyTask, Scheduler};
pub use scheduler_step::SchedulerStep;
pub use task::{TaskError, TaskInputs, TaskSpec, TaskWork, WorkFuture};
pub use task_info::TaskState;
