//! Materialization of lazily linked task graphs.
//!
//! Tasks only know their inputs as suppliers, so the graph below a task is
//! not a data structure until something walks it. [`materialize`] performs
//! that walk once, depth-first and in declared input order, and produces a
//! finite tree of [`GraphNode`]s. Every id is expanded at its first
//! occurrence only; later occurrences become reference leaves. Shared
//! subgraphs are therefore expanded once, diamond-shaped graphs don't blow
//! up, and graphs that loop back on themselves still terminate.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::core::TaskId;
use crate::error::GraphError;
use crate::task::{ErasedTask, TaskRef};

/// A node of a materialized graph.
///
/// Serializes to `{"id": .., "isReference": .., "upstreams": [..]}`, which is
/// the shape external graph viewers consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub is_reference: bool,
    pub upstreams: Vec<GraphNode>,
}

impl GraphNode {
    fn expanded(id: &TaskId, upstreams: Vec<GraphNode>) -> Self {
        Self {
            id: id.to_string(),
            is_reference: false,
            upstreams,
        }
    }

    fn reference(id: &TaskId) -> Self {
        Self {
            id: id.to_string(),
            is_reference: true,
            upstreams: vec![],
        }
    }

    /// Number of fully expanded nodes in this tree, which equals the number
    /// of distinct ids reachable from the root.
    pub fn expanded_count(&self) -> usize {
        let own = usize::from(!self.is_reference);
        own + self.upstreams.iter().map(GraphNode::expanded_count).sum::<usize>()
    }

    /// Ids of the expanded nodes, in traversal order.
    pub fn ids(&self) -> Vec<&str> {
        let mut acc = Vec::new();
        self.collect_ids(&mut acc);
        acc
    }

    fn collect_ids<'a>(&'a self, acc: &mut Vec<&'a str>) {
        if !self.is_reference {
            acc.push(&self.id);
        }
        for upstream in &self.upstreams {
            upstream.collect_ids(acc);
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Folds the tree into a dependency DAG with one vertex per id, reference
    /// leaves becoming edges to the vertex of their first occurrence.
    pub fn to_dag(&self) -> DependencyGraph {
        let mut dag = DependencyGraph {
            graph: DiGraph::new(),
            indices: HashMap::new(),
        };
        dag.insert(self);
        dag
    }
}

/// Materializes the graph below `root` into a finite tree.
///
/// Inputs are forced in declared order. If forcing any input fails the
/// error is returned and no tree is produced.
pub fn materialize(root: impl Into<TaskRef>) -> Result<GraphNode, GraphError> {
    let root = root.into();
    let mut visited = HashSet::new();
    walk(root.erased(), &mut visited)
}

fn walk(task: &dyn ErasedTask, visited: &mut HashSet<TaskId>) -> Result<GraphNode, GraphError> {
    let id = task.id();

    if visited.contains(id) {
        tracing::trace!(%id, "reference");
        return Ok(GraphNode::reference(id));
    }

    visited.insert(id.clone());
    tracing::trace!(%id, "expanding");

    let mut upstreams = Vec::with_capacity(task.inputs().len());

    for supplier in task.inputs() {
        let input = supplier().map_err(|source| GraphError::Input {
            id: id.clone(),
            source,
        })?;
        upstreams.push(walk(input.erased(), visited)?);
    }

    Ok(GraphNode::expanded(id, upstreams))
}

/// A materialized graph as a DAG. Edges point from a dependency to the task
/// depending on it.
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    fn insert(&mut self, node: &GraphNode) -> NodeIndex {
        let index = self.index(&node.id);

        for upstream in &node.upstreams {
            let dependency = self.insert(upstream);
            self.graph.update_edge(dependency, index, ());
        }

        index
    }

    fn index(&mut self, id: &str) -> NodeIndex {
        if let Some(index) = self.indices.get(id) {
            return *index;
        }

        let index = self.graph.add_node(id.to_string());
        self.indices.insert(id.to_string(), index);
        index
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Ids of the direct dependencies of `id`.
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        let Some(&index) = self.indices.get(id) else {
            return vec![];
        };

        let mut deps: Vec<_> = self
            .graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .map(|dep| self.graph[dep].as_str())
            .collect();

        deps.sort_unstable();
        deps
    }

    /// A topological order in which every task comes after all of its
    /// dependencies.
    pub fn execution_order(&self) -> Result<Vec<&str>, GraphError> {
        petgraph::algo::toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|i| self.graph[i].as_str()).collect())
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].clone()))
    }
}
