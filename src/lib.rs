// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::planner::plan;
use crate::engine::{Executor, ExecutorOptions};
use crate::exec::CommandOutput;

pub use crate::dag::{ExecutionResult, TaskGraph, TaskResult, TaskSpec, TaskState};
pub use crate::engine::execute;
pub use crate::errors::DagError;
pub use crate::types::{FailurePolicy, TaskId};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task file loading and validation
/// - CLI overrides of `[config]`
/// - the executor (or the dry-run / DOT printers)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dot {
        print!("{}", cfg.graph().to_dot());
        return Ok(());
    }

    let options = effective_options(&cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg, &options)?;
        return Ok(());
    }

    let specs = cfg.task_specs();
    let executor = Executor::new(options);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C");
    };

    let result = executor.run_until(&specs, cfg.graph(), shutdown).await?;
    print_report(&result);

    if !result.all_completed() {
        let failed = result.ids_in_state(TaskState::Failed).len();
        let blocked = result.ids_in_state(TaskState::Blocked).len();
        let cancelled = result.ids_in_state(TaskState::Cancelled).len();
        bail!("{failed} failed, {blocked} blocked, {cancelled} cancelled");
    }
    Ok(())
}

/// `[config]` values with command-line overrides applied.
fn effective_options(cfg: &ConfigFile, args: &CliArgs) -> ExecutorOptions {
    let mut options = cfg.executor_options();
    if let Some(workers) = args.workers {
        options.worker_count = workers;
    }
    if let Some(timeout) = args.timeout {
        options.timeout = Some(timeout);
    }
    if let Some(grace) = args.grace_period {
        options.grace_period = grace;
    }
    if let Some(policy) = args.on_failure {
        options.failure_policy = policy;
    }
    options
}

/// Print tasks grouped into the layers that may run in parallel.
fn print_dry_run(cfg: &ConfigFile, options: &ExecutorOptions) -> Result<()> {
    let layers = plan(cfg.graph())?;

    println!("dagrun dry-run");
    println!("  workers = {}", options.worker_count);
    match options.timeout {
        Some(t) => println!("  timeout = {t:?}"),
        None => println!("  timeout = none"),
    }
    println!("  grace_period = {:?}", options.grace_period);
    println!("  on_failure = {:?}", options.failure_policy);
    println!();

    for (index, layer) in layers.iter().enumerate() {
        println!("layer {index}:");
        for id in layer {
            let task = &cfg.tasks()[id];
            println!("  - {id}");
            println!("      cmd: {}", task.cmd);
            if !task.after.is_empty() {
                println!("      after: {:?}", task.after);
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

/// One line per task: state, duration and (for failures) the reason.
fn print_report(result: &ExecutionResult<CommandOutput>) {
    for (id, task_result) in result.iter() {
        let duration = result
            .timing(id)
            .map(|t| format!("{:.2?}", t.elapsed()))
            .unwrap_or_else(|| "-".to_string());

        let detail = match task_result {
            TaskResult::Completed(_) => String::new(),
            TaskResult::Failed(err) => format!("  ({err})"),
            TaskResult::Blocked {
                failed_dependencies,
            } => format!("  (after {})", failed_dependencies.join(", ")),
            TaskResult::Cancelled => String::new(),
        };

        println!(
            "{:<10} {:>10}  {id}{detail}",
            format!("{:?}", task_result.state()),
            duration
        );
    }
}
