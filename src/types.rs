use std::str::FromStr;
use serde::Deserialize;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// What happens to a task once its last dependency reaches a terminal state
/// but at least one dependency did not complete successfully.
///
/// - `Block`: the task never runs and is reported as blocked; its own
///   dependents are released (and blocked) in turn (default behaviour).
/// - `Continue`: the task runs anyway and can inspect which dependencies did
///   not complete through `TaskInputs::failed_dependencies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Block,
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Block
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(FailurePolicy::Block),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "invalid failure policy: {other} (expected \"block\" or \"continue\")"
            )),
        }
    }
}
