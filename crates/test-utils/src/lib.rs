//! Shared helpers for the `dagrun` test suites.
//!
//! - [`builders`]: task-file builders that validate like `load_and_validate`.
//! - [`tasks`]: ready-made task specs and a [`tasks::Recorder`] that records
//!   when work ran.

pub mod builders;
pub mod tasks;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for a whole test run when the test does not pick its own.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Initialise tracing once per test binary.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `--nocapture`). Filter with `RUST_LOG`, default `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than [`DEFAULT_TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout_of(DEFAULT_TEST_TIMEOUT, f).await
}

/// Await `f`, failing the test if it takes longer than `limit`.
///
/// Executor tests use this to assert that a run returns at all, e.g. after
/// a deadline with work that never finishes.
pub async fn with_timeout_of<F, T>(limit: Duration, f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, f).await {
        Ok(value) => value,
        Err(_) => panic!("test future did not finish within {limit:?}"),
    }
}
