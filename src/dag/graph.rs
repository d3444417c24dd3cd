// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::dag::task::TaskSpec;
use crate::errors::{DagError, Result};
use crate::types::TaskId;

static NO_TASKS: BTreeSet<TaskId> = BTreeSet::new();

/// Forward/reverse adjacency sets for one set of tasks.
///
/// Every task id has an entry in both maps, even when it has no edges.
/// Construction checks that ids are unique and that every dependency names a
/// known task; acyclicity is checked by [`crate::dag::planner::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskGraph {
    /// `forward[id]`: tasks that depend on `id` (children).
    forward: BTreeMap<TaskId, BTreeSet<TaskId>>,
    /// `reverse[id]`: tasks `id` depends on (parents).
    reverse: BTreeMap<TaskId, BTreeSet<TaskId>>,
}

impl TaskGraph {
    /// Build a graph from task specifications.
    pub fn build<T>(tasks: &[TaskSpec<T>]) -> Result<Self> {
        Self::from_edges(
            tasks
                .iter()
                .map(|t| (t.id(), t.dependencies().iter().map(String::as_str))),
        )
    }

    /// Build a graph from `(task id, dependency ids)` pairs.
    pub fn from_edges<'a, I, D>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let mut reverse: BTreeMap<TaskId, BTreeSet<TaskId>> = BTreeMap::new();

        // First pass: register every node with its dependency set.
        for (id, deps) in nodes {
            if reverse.contains_key(id) {
                return Err(DagError::DuplicateTaskId(id.to_string()));
            }
            let deps = deps.into_iter().map(str::to_string).collect();
            reverse.insert(id.to_string(), deps);
        }

        // Second pass: check dependencies and populate dependents.
        let mut forward: BTreeMap<TaskId, BTreeSet<TaskId>> = reverse
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();

        for (id, deps) in reverse.iter() {
            for dep in deps {
                match forward.get_mut(dep) {
                    Some(children) => {
                        children.insert(id.clone());
                    }
                    None => {
                        return Err(DagError::UnknownDependency {
                            task: id.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        let graph = Self { forward, reverse };
        debug!(
            tasks = graph.len(),
            edges = graph.edge_count(),
            "built task graph"
        );
        Ok(graph)
    }

    /// All task ids, in sorted order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.reverse.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.reverse.contains_key(id)
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.reverse.values().map(BTreeSet::len).sum()
    }

    /// Immediate dependencies of a task (parents).
    pub fn dependencies_of(&self, id: &str) -> &BTreeSet<TaskId> {
        self.reverse.get(id).unwrap_or(&NO_TASKS)
    }

    /// Immediate dependents of a task (children).
    pub fn dependents_of(&self, id: &str) -> &BTreeSet<TaskId> {
        self.forward.get(id).unwrap_or(&NO_TASKS)
    }

    /// Tasks without dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.reverse
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(id, _)| id.as_str())
    }

    pub fn forward(&self) -> &BTreeMap<TaskId, BTreeSet<TaskId>> {
        &self.forward
    }

    pub fn reverse(&self) -> &BTreeMap<TaskId, BTreeSet<TaskId>> {
        &self.reverse
    }

    /// Petgraph view of the graph with edges pointing from dependency to
    /// dependent. Used for diagnostics only.
    pub(crate) fn to_petgraph(&self) -> (DiGraph<&str, &str>, HashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::with_capacity(self.len(), self.edge_count());
        let mut index = HashMap::with_capacity(self.len());

        for id in self.tasks() {
            index.insert(id, graph.add_node(id));
        }
        for (id, deps) in self.reverse.iter() {
            for dep in deps {
                graph.add_edge(index[dep.as_str()], index[id.as_str()], "");
            }
        }

        (graph, index)
    }

    /// Graphviz rendering (`dependency -> dependent`).
    pub fn to_dot(&self) -> String {
        let (graph, _) = self.to_petgraph();
        format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}
