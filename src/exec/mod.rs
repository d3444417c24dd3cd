// src/exec/mod.rs

//! Process execution layer.
//!
//! [`command`] provides [`ShellCommand`], a `TaskWork` implementation that
//! runs a command line with `tokio::process::Command` and reports its exit
//! status as the task outcome.

pub mod command;

pub use command::{CommandOutput, ShellCommand, TASK_ENV_VAR};
