use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use proptest::prelude::*;

use dagrun::dag::{plan, Scheduler, TaskGraph, TaskState};
use dagrun::engine::{execute, ExecutorOptions, TaskOutcome};
use dagrun::types::FailurePolicy;
use dagrun_test_utils::tasks::Recorder;

/// `(task id, dependency ids)` for a random acyclic graph.
///
/// Acyclicity comes from only allowing task N to depend on tasks 0..N-1.
type Edges = Vec<(String, Vec<String>)>;

fn task_name(i: usize) -> String {
    format!("task_{i:02}")
}

fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Edges> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        )
        .prop_map(|raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let deps: HashSet<usize> = if i == 0 {
                        HashSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    (task_name(i), deps.into_iter().map(task_name).collect())
                })
                .collect()
        })
    })
}

fn build_graph(edges: &Edges) -> TaskGraph {
    TaskGraph::from_edges(
        edges
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.iter().map(String::as_str))),
    )
    .expect("generated graph is valid")
}

proptest! {
    #[test]
    fn layers_partition_tasks_in_dependency_order(edges in dag_strategy(12)) {
        let graph = build_graph(&edges);
        let layers = plan(&graph).unwrap();

        let mut layer_of: BTreeMap<&str, usize> = BTreeMap::new();
        for (index, layer) in layers.iter().enumerate() {
            prop_assert!(!layer.is_empty());
            for id in layer {
                prop_assert!(layer_of.insert(id.as_str(), index).is_none(), "{} in two layers", id);
            }
        }
        prop_assert_eq!(layer_of.len(), graph.len());

        // Each task sits exactly one layer below its deepest dependency.
        for id in graph.tasks() {
            let expected = graph
                .dependencies_of(id)
                .iter()
                .map(|dep| layer_of[dep.as_str()] + 1)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(layer_of[id], expected);
        }
    }

    #[test]
    fn every_task_reaches_exactly_one_terminal_state(
        edges in dag_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..4),
        picks in proptest::collection::vec(any::<usize>(), 1..32),
    ) {
        let graph = build_graph(&edges);
        let failing: HashSet<String> = failing.into_iter().map(task_name).collect();
        let mut scheduler: Scheduler<'_, ()> = Scheduler::new(&graph, FailurePolicy::Block);

        let mut started: HashSet<String> = HashSet::new();
        let mut running: Vec<String> = Vec::new();
        let mut step = 0usize;

        loop {
            while let Some(ready) = scheduler.next_ready() {
                for dep in graph.dependencies_of(&ready.id) {
                    let state = scheduler.state_of(dep).unwrap();
                    prop_assert_eq!(state, TaskState::Completed, "{} started before {}", ready.id, dep);
                }
                prop_assert!(started.insert(ready.id.clone()), "{} started twice", ready.id);
                running.push(ready.id);
            }
            if running.is_empty() {
                break;
            }

            let id = running.swap_remove(picks[step % picks.len()] % running.len());
            step += 1;
            let outcome = if failing.contains(&id) {
                TaskOutcome::Failed("injected".into())
            } else {
                TaskOutcome::Success(())
            };
            scheduler.handle_completion(&id, outcome);
        }

        prop_assert!(scheduler.is_finished());
        let result = scheduler.into_result();
        prop_assert_eq!(result.len(), graph.len());

        // Edges are generated in dependency order, so earlier expectations
        // are known by the time a task is checked.
        let mut expected: BTreeMap<&str, TaskState> = BTreeMap::new();
        for (id, deps) in &edges {
            let state = if deps.iter().any(|d| expected[d.as_str()] != TaskState::Completed) {
                TaskState::Blocked
            } else if failing.contains(id) {
                TaskState::Failed
            } else {
                TaskState::Completed
            };
            expected.insert(id.as_str(), state);
            prop_assert_eq!(result.state_of(id), Some(state), "unexpected state for {}", id);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn executor_finishes_dependencies_before_dependents_start(
        edges in dag_strategy(8),
        workers in 1..4usize,
    ) {
        let recorder = Recorder::new();
        let tasks: Vec<_> = edges
            .iter()
            .map(|(id, deps)| recorder.task(id, Duration::from_millis(2)).after(deps.iter().cloned()))
            .collect();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(execute(&tasks, ExecutorOptions::new(workers))).unwrap();

        prop_assert!(result.all_completed());
        prop_assert_eq!(result.len(), edges.len());
        prop_assert!(recorder.max_concurrency() <= workers);

        for (id, deps) in &edges {
            let timing = result.timing(id).unwrap();
            for dep in deps {
                let dep_timing = result.timing(dep).unwrap();
                prop_assert!(dep_timing.finished <= timing.started, "{} started before {} finished", id, dep);
            }
        }
    }
}
