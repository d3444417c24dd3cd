// src/errors.rs

//! Crate-wide error type and result alias.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum DagError {
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(TaskId),

    #[error("Task '{task}' has unknown dependency '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("Cycle detected in DAG; tasks never ready: {}", join_ids(.tasks))]
    CyclicDependency {
        /// Every task that never reached in-degree zero.
        tasks: BTreeSet<TaskId>,
        /// Strongly connected components that form actual cycles.
        cycles: Vec<Vec<TaskId>>,
    },

    #[error("worker_count must be >= 1 (got {0})")]
    InvalidWorkerCount(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_ids(ids: &BTreeSet<TaskId>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

pub type Result<T> = std::result::Result<T, DagError>;
