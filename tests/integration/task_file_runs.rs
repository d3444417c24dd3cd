// tests/integration/task_file_runs.rs

#![cfg(unix)]

use std::io::Write;

use clap::Parser;
use tempfile::NamedTempFile;

use dagrun::cli::CliArgs;
use dagrun::config::load_and_validate;
use dagrun::dag::TaskState;
use dagrun::engine::Executor;
use dagrun::types::FailurePolicy;
use dagrun_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use dagrun_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn shell_tasks_run_in_dependency_order() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("order.log");
    let log = log.display();

    let cfg = ConfigFileBuilder::new()
        .workers(2)
        .with_task(
            "fetch",
            TaskConfigBuilder::new(&format!("echo fetch >> {log}")).build(),
        )
        .with_task(
            "build",
            TaskConfigBuilder::new(&format!("echo build >> {log}; echo built"))
                .after("fetch")
                .build(),
        )
        .with_task(
            "test",
            TaskConfigBuilder::new(&format!("echo test >> {log}"))
                .after("build")
                .build(),
        )
        .build();

    let specs = cfg.task_specs();
    let executor = Executor::new(cfg.executor_options());
    let result = with_timeout(executor.run(&specs, cfg.graph())).await.unwrap();

    assert!(result.all_completed());
    assert_eq!(result.value("build").unwrap().stdout, "built\n");

    let order = std::fs::read_to_string(dir.path().join("order.log")).unwrap();
    assert_eq!(order, "fetch\nbuild\ntest\n");
}

#[tokio::test]
async fn failing_command_blocks_dependents() {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .with_task("lint", TaskConfigBuilder::new("exit 2").build())
        .with_task("unit", TaskConfigBuilder::new("true").build())
        .with_task("deploy", TaskConfigBuilder::new("true").after("lint").after("unit").build())
        .build();

    let specs = cfg.task_specs();
    let result = with_timeout(Executor::new(cfg.executor_options()).run(&specs, cfg.graph()))
        .await
        .unwrap();

    assert_eq!(result.state_of("lint"), Some(TaskState::Failed));
    assert_eq!(result.state_of("unit"), Some(TaskState::Completed));
    assert_eq!(result.state_of("deploy"), Some(TaskState::Blocked));
}

#[tokio::test]
async fn continue_policy_from_task_file() {
    let cfg = ConfigFileBuilder::new()
        .on_failure(FailurePolicy::Continue)
        .timeout("10s")
        .with_task("lint", TaskConfigBuilder::new("exit 2").build())
        .with_task("report", TaskConfigBuilder::new("echo report").after("lint").build())
        .build();

    let specs = cfg.task_specs();
    let result = with_timeout(Executor::new(cfg.executor_options()).run(&specs, cfg.graph()))
        .await
        .unwrap();

    assert_eq!(result.state_of("lint"), Some(TaskState::Failed));
    assert_eq!(result.value("report").unwrap().stdout, "report\n");
}

#[tokio::test]
async fn run_entry_point_reports_failure_as_error() {
    let mut ok_file = NamedTempFile::new().unwrap();
    write!(ok_file, "[task.a]\ncmd = \"true\"\n[task.b]\ncmd = \"true\"\nafter = [\"a\"]\n").unwrap();

    let path = ok_file.path().to_str().unwrap();
    let args = CliArgs::try_parse_from(["dagrun", "--config", path, "--workers", "1"]).unwrap();
    with_timeout(dagrun::run(args)).await.unwrap();

    let mut bad_file = NamedTempFile::new().unwrap();
    write!(bad_file, "[task.a]\ncmd = \"false\"\n").unwrap();

    let path = bad_file.path().to_str().unwrap();
    let args = CliArgs::try_parse_from(["dagrun", "--config", path]).unwrap();
    let err = with_timeout(dagrun::run(args)).await.unwrap_err();
    assert!(err.to_string().contains("1 failed"));
}

#[tokio::test]
async fn dry_run_validates_without_executing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[task.a]\ncmd = \"touch {}\"\n", marker.display()).unwrap();

    let path = file.path().to_str().unwrap();
    let args = CliArgs::try_parse_from(["dagrun", "--config", path, "--dry-run"]).unwrap();
    dagrun::run(args).await.unwrap();

    assert!(!marker.exists());
    assert!(load_and_validate(file.path()).is_ok());
}
