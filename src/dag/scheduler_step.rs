// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use crate::types::TaskId;

/// Structured result of a single scheduler "step".
///
/// Useful for tests that drive the scheduler by hand and make assertions
/// about what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Tasks whose last dependency just finished and which were queued.
    pub newly_ready: Vec<TaskId>,
    /// Tasks that were newly recorded as failed in this step.
    pub newly_failed: Vec<TaskId>,
    /// Tasks that will never run because a dependency did not complete.
    pub newly_blocked: Vec<TaskId>,
    /// Whether this step gave the last task of the run its terminal entry.
    pub run_just_finished: bool,
}
