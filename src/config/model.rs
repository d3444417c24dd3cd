// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::graph::TaskGraph;
use crate::dag::task::TaskSpec;
use crate::engine::ExecutorOptions;
use crate::exec::{CommandOutput, ShellCommand};
use crate::types::{FailurePolicy, TaskId};

/// Raw configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// workers = 4
/// timeout = "30s"
/// on_failure = "block"
///
/// [task.fetch]
/// cmd = "curl -sO https://example.com/data.json"
///
/// [task.build]
/// cmd = "make"
/// after = ["fetch"]
/// ```
///
/// Nothing here is checked beyond TOML syntax and field types; convert into
/// [`ConfigFile`] with `TryFrom` to validate.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Run settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<id>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<TaskId, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Number of workers running tasks concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Overall run deadline, e.g. `"500ms"`, `"30s"`, `"5m"`, `"1h"`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// `"block"` (default) or `"continue"`.
    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// How long running tasks may keep going once the run stops, e.g. `"5s"`.
    /// Unset means they are aborted right away.
    #[serde(default)]
    pub grace_period: Option<String>,
}

fn default_workers() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: None,
            on_failure: FailurePolicy::default(),
            grace_period: None,
        }
    }
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Command line, run through the platform shell.
    pub cmd: String,

    /// This task waits for every task listed here.
    #[serde(default)]
    pub after: Vec<TaskId>,
}

/// A validated task file.
///
/// Holding a `ConfigFile` means every dependency is known, the graph is
/// acyclic, `workers >= 1` and the timeout (if any) parsed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    task: BTreeMap<TaskId, TaskConfig>,
    timeout: Option<Duration>,
    grace_period: Duration,
    graph: TaskGraph,
}

impl ConfigFile {
    /// Assemble a config from already validated parts.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        task: BTreeMap<TaskId, TaskConfig>,
        timeout: Option<Duration>,
        grace_period: Duration,
        graph: TaskGraph,
    ) -> Self {
        Self {
            config,
            task,
            timeout,
            grace_period,
            graph,
        }
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.config
    }

    pub fn tasks(&self) -> &BTreeMap<TaskId, TaskConfig> {
        &self.task
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Executor options as configured in `[config]`.
    pub fn executor_options(&self) -> ExecutorOptions {
        let mut options = ExecutorOptions::new(self.config.workers)
            .with_failure_policy(self.config.on_failure)
            .with_grace_period(self.grace_period);
        options.timeout = self.timeout;
        options
    }

    /// One [`ShellCommand`] task per `[task.<id>]` section.
    pub fn task_specs(&self) -> Vec<TaskSpec<CommandOutput>> {
        self.task
            .iter()
            .map(|(id, task)| {
                TaskSpec::with_work(id.as_str(), ShellCommand::new(task.cmd.as_str()))
                    .after(task.after.iter().cloned())
            })
            .collect()
    }
}

/// Parse a duration like `"250ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    let secs_per_unit = match unit_part.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        unit => {
            return Err(format!(
                "unsupported duration unit '{unit}'; expected ms, s, m, or h"
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' out of range"))
}
