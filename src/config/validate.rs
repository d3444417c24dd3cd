// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{parse_duration, ConfigFile, RawConfigFile};
use crate::dag::graph::TaskGraph;
use crate::dag::planner::plan;
use crate::errors::{DagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let (timeout, grace_period) = validate_global_config(&raw)?;
        let graph = validate_dag(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.task,
            timeout,
            grace_period,
            graph,
        ))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(DagError::ConfigError(
            "task file must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

/// Check `workers` and parse the `timeout` and `grace_period` durations.
fn validate_global_config(cfg: &RawConfigFile) -> Result<(Option<Duration>, Duration)> {
    if cfg.config.workers == 0 {
        return Err(DagError::InvalidWorkerCount(0));
    }

    let timeout = optional_duration("timeout", cfg.config.timeout.as_deref())?;
    let grace_period = optional_duration("grace_period", cfg.config.grace_period.as_deref())?
        .unwrap_or(Duration::ZERO);
    Ok((timeout, grace_period))
}

fn optional_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(s).map_err(|e| DagError::ConfigError(format!("[config].{field}: {e}")))
        })
        .transpose()
}

/// Build the graph (unknown dependencies) and plan it once (cycles).
fn validate_dag(cfg: &RawConfigFile) -> Result<TaskGraph> {
    let graph = TaskGraph::from_edges(
        cfg.task
            .iter()
            .map(|(id, task)| (id.as_str(), task.after.iter().map(String::as_str))),
    )?;
    plan(&graph)?;
    Ok(graph)
}
