// src/dag/planner.rs

//! Layer planning (Kahn's algorithm).
//!
//! A layer is a set of tasks with no dependency relationship among them:
//! every member of layer `k` depends only on members of layers `0..k`.
//! Layers are a planning and diagnostic aid (dry runs, pool sizing); the
//! executor releases tasks on completion events and never waits on a layer
//! boundary.
//!
//! This is the only place where cycles are detected.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use tracing::{debug, warn};

use crate::dag::graph::TaskGraph;
use crate::errors::{DagError, Result};
use crate::types::TaskId;

/// One parallelism group.
pub type Layer = BTreeSet<TaskId>;

/// Compute parallelism groups in dependency order.
///
/// Fails with [`DagError::CyclicDependency`] when some tasks never become
/// ready; in that case no partial layering is returned.
pub fn plan(graph: &TaskGraph) -> Result<Vec<Layer>> {
    let mut in_degree: BTreeMap<&str, usize> = graph
        .reverse()
        .iter()
        .map(|(id, deps)| (id.as_str(), deps.len()))
        .collect();

    let mut current: Layer = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.to_string())
        .collect();

    let mut layers: Vec<Layer> = Vec::new();
    let mut visited = 0usize;

    while !current.is_empty() {
        let mut next = Layer::new();

        // "Virtually complete" the current layer.
        for id in current.iter() {
            for child in graph.dependents_of(id) {
                if let Some(degree) = in_degree.get_mut(child.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.insert(child.clone());
                    }
                }
            }
        }

        visited += current.len();
        debug!(layer = layers.len(), size = current.len(), "planned layer");
        layers.push(current);
        current = next;
    }

    if visited != graph.len() {
        let stuck: BTreeSet<TaskId> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        let cycles = find_cycles(graph, &stuck);

        warn!(
            stuck = stuck.len(),
            ?cycles,
            "dependency cycle detected; refusing to plan"
        );
        return Err(DagError::CyclicDependency {
            tasks: stuck,
            cycles,
        });
    }

    debug!(layers = layers.len(), tasks = visited, "computed parallelism groups");
    Ok(layers)
}

/// Width of the widest layer: more workers than this never run concurrently.
pub fn max_parallelism(layers: &[Layer]) -> usize {
    layers.iter().map(BTreeSet::len).max().unwrap_or(0)
}

/// Strongly connected components among `stuck` that form real cycles
/// (more than one member, or a task depending on itself).
fn find_cycles(graph: &TaskGraph, stuck: &BTreeSet<TaskId>) -> Vec<Vec<TaskId>> {
    let (pg, _) = graph.to_petgraph();

    let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&pg)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || pg.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut ids: Vec<TaskId> = component.iter().map(|ix| pg[*ix].to_string()).collect();
            ids.sort();
            ids
        })
        .filter(|ids| ids.iter().all(|id| stuck.contains(id)))
        .collect();

    cycles.sort();
    cycles
}
