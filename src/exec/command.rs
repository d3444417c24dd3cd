// src/exec/command.rs

//! Shell command work, used for tasks defined in a task file.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::task::{TaskError, TaskInputs, TaskWork, WorkFuture};

/// Environment variable carrying the id of the task being run.
pub const TASK_ENV_VAR: &str = "DAGRUN_TASK";

/// What a finished command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
}

/// Runs a command line through the platform shell (`sh -c` / `cmd /C`).
///
/// Exit status 0 completes the task with the captured stdout; any other
/// status fails it.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    cmd: String,
}

impl ShellCommand {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl TaskWork<CommandOutput> for ShellCommand {
    fn start(&self, inputs: TaskInputs<CommandOutput>) -> WorkFuture<CommandOutput> {
        let cmd = self.cmd.clone();
        let task = inputs.task_id().to_string();
        Box::pin(async move {
            let output = run_command(&task, &cmd).await?;
            if output.exit_code == 0 {
                Ok(output)
            } else {
                Err(TaskError::Failed(format!(
                    "command exited with status {}",
                    output.exit_code
                )))
            }
        })
    }
}

async fn run_command(task: &str, cmd_line: &str) -> Result<CommandOutput> {
    info!(task = %task, cmd = %cmd_line, "starting task process");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.env(TASK_ENV_VAR, task)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{task}'"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let task_name = task.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    let mut stdout = String::new();
    if let Some(out) = child.stdout.take() {
        let mut lines = BufReader::new(out).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("reading stdout of task '{task}'"))?
        {
            debug!(task = %task, "stdout: {}", line);
            stdout.push_str(&line);
            stdout.push('\n');
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{task}'"))?;
    let exit_code = status.code().unwrap_or(-1);

    info!(
        task = %task,
        exit_code,
        success = status.success(),
        "task process exited"
    );

    Ok(CommandOutput { exit_code, stdout })
}
