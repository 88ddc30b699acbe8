//! Execution planning for a workflow graph.
//!
//! A group depends on another when it reads a context key that only the
//! other group writes. Groups are layered into waves: a wave only holds
//! groups whose dependencies ran in earlier waves.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dsl::WorkflowGraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Group indices (declaration order) per wave.
    pub waves: Vec<Vec<usize>>,
    /// Dependencies of each group, by index.
    pub dependencies: Vec<Vec<usize>>,
    /// True when a dependency cycle forced sequential declaration order.
    pub sequential_fallback: bool,
}

pub fn plan(graph: &WorkflowGraph) -> ExecutionPlan {
    let groups: Vec<_> = graph.groups().collect();
    let reads: Vec<_> = groups.iter().map(|(_, g)| g.external_reads()).collect();
    let writes: Vec<_> = groups.iter().map(|(_, g)| g.writes()).collect();

    let mut dag: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..groups.len()).map(|i| dag.add_node(i)).collect();
    let mut dependencies = vec![Vec::new(); groups.len()];

    for (reader, keys) in reads.iter().enumerate() {
        for (writer, written) in writes.iter().enumerate() {
            if writer == reader {
                continue;
            }
            if keys.iter().any(|k| written.contains(k)) {
                dag.add_edge(nodes[writer], nodes[reader], ());
                dependencies[reader].push(writer);
            }
        }
    }

    let order = match toposort(&dag, None) {
        Ok(order) => order,
        Err(cycle) => {
            let name = dag
                .node_weight(cycle.node_id())
                .and_then(|i| groups.get(*i))
                .map(|(n, _)| *n)
                .unwrap_or_default();
            tracing::warn!(group = %name, "dependency cycle between execution groups; running sequentially");
            // Only groups declared earlier have run by the time a group is reached.
            for (reader, deps) in dependencies.iter_mut().enumerate() {
                deps.retain(|writer| *writer < reader);
            }
            return ExecutionPlan {
                waves: (0..groups.len()).map(|i| vec![i]).collect(),
                dependencies,
                sequential_fallback: true,
            };
        }
    };

    let mut level = vec![0usize; groups.len()];
    for node in order {
        let i = dag[node];
        level[i] = dependencies[i]
            .iter()
            .map(|d| level[*d] + 1)
            .max()
            .unwrap_or(0);
    }

    let depth = level.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    let mut waves = vec![Vec::new(); depth];
    for (i, l) in level.iter().enumerate() {
        waves[*l].push(i);
    }

    ExecutionPlan {
        waves,
        dependencies,
        sequential_fallback: false,
    }
}
