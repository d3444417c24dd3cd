use std::time::{Duration, Instant};

use proptest::prelude::*;

use dagrun::dag::TaskSpec;
use dagrun::engine::{execute, ExecutorOptions};
use dagrun_test_utils::tasks::Recorder;

const WORKERS: u32 = 2;
// Timer and dispatch overhead allowed on top of the ideal schedule.
const SLACK: Duration = Duration::from_millis(100);

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    /// Independent tasks on two workers take at least as long as the longest
    /// task and half the total work, and no longer than a greedy two-lane
    /// schedule, which stays well below running them one after another.
    #[test]
    fn independent_tasks_overlap_across_workers(
        millis in proptest::collection::vec(50_u64..150, 10),
    ) {
        let durations: Vec<Duration> = millis.iter().copied().map(Duration::from_millis).collect();
        let longest = durations.iter().copied().max().unwrap_or_default();
        let total: Duration = durations.iter().sum();

        let recorder = Recorder::new();
        let tasks: Vec<TaskSpec<()>> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| recorder.task(&format!("job_{i}"), *d))
            .collect();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let started = Instant::now();
        let result = rt
            .block_on(execute(&tasks, ExecutorOptions::new(WORKERS as usize)))
            .unwrap();
        let elapsed = started.elapsed();

        prop_assert!(result.all_completed());
        prop_assert!(recorder.max_concurrency() <= WORKERS as usize);
        prop_assert!(elapsed >= longest, "elapsed {:?} < longest {:?}", elapsed, longest);
        prop_assert!(elapsed >= total / WORKERS, "elapsed {:?} < total/2 {:?}", elapsed, total / WORKERS);

        let greedy_bound = total / WORKERS + longest / WORKERS + SLACK;
        prop_assert!(greedy_bound < total);
        prop_assert!(
            elapsed < greedy_bound,
            "elapsed {:?} exceeds {:?} (serial would be {:?})",
            elapsed,
            greedy_bound,
            total
        );
    }
}
