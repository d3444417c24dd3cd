// tests/integration/error_handling.rs

use std::io::Write;

use tempfile::NamedTempFile;

use dagrun::config::load_and_validate;
use dagrun::errors::DagError;

fn task_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let file = task_file(
        r#"
[task.A]
cmd = "echo A"
after = ["B"]

[task.B]
cmd = "echo B"
after = ["A"]

[task.C]
cmd = "echo C"
after = ["B"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(DagError::CyclicDependency { tasks, cycles }) => {
            // C never becomes ready either, but only A and B form the cycle.
            assert_eq!(tasks.into_iter().collect::<Vec<_>>(), vec!["A", "B", "C"]);
            assert_eq!(cycles, vec![vec!["A".to_string(), "B".to_string()]]);
        }
        Err(e) => panic!("Expected CyclicDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let file = task_file(
        r#"
[task.A]
cmd = "echo A"
after = ["A"]
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(err.to_string().contains("Cycle detected"));
    assert!(matches!(err, DagError::CyclicDependency { .. }));
}

#[test]
fn test_unknown_dependency_returns_structured_error() {
    let file = task_file(
        r#"
[task.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(DagError::UnknownDependency { task, dependency }) => {
            assert_eq!(task, "A");
            assert_eq!(dependency, "NonExistent");
        }
        Err(e) => panic!("Expected UnknownDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_invalid_toml_returns_toml_error() {
    let file = task_file("[task.A\ncmd = ");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, DagError::TomlError(_)));
}

#[test]
fn test_missing_cmd_returns_toml_error() {
    let file = task_file("[task.A]\nafter = []\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, DagError::TomlError(_)));
}

#[test]
fn test_missing_file_returns_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("Dagrun.toml")).unwrap_err();
    assert!(matches!(err, DagError::IoError(_)));
}

#[test]
fn test_unknown_failure_policy_is_rejected() {
    let file = task_file(
        r#"
[config]
on_failure = "retry"

[task.A]
cmd = "echo A"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(DagError::TomlError(_))
    ));
}
