// tests/integration/main.rs

mod error_handling;
mod task_file_runs;
