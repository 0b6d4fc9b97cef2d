use std::collections::{BTreeMap, VecDeque};

use indexmap::IndexMap;
use tracing::debug;

use crate::core::node::NodeId;
use crate::graph::cycles::detect_cycles;
use crate::graph::ops::extract_subgraph;
use crate::graph::{DirectedGraph, NodeSet};

/// Dependency-first order of every node, or `None` when the graph has a cycle.
///
/// Each node appears after everything it depends on. Nodes that become ready
/// at the same time keep the graph's node order, so the result is identical
/// on every call against the same graph.
pub fn topological_sort(graph: &DirectedGraph) -> Option<Vec<NodeId>> {
    if !detect_cycles(graph).is_empty() {
        debug!("no valid order: graph is cyclic");
        return None;
    }

    let mut pending: IndexMap<&NodeId, usize> = graph
        .nodes
        .keys()
        .map(|id| (id, graph.adjacency.get(id).map_or(0, |deps| deps.len())))
        .collect();
    let mut queue: VecDeque<&NodeId> = pending
        .iter()
        .filter_map(|(id, &count)| if count == 0 { Some(*id) } else { None })
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        let Some(dependents) = graph.reverse_adjacency.get(node) else {
            continue;
        };
        for dependent in dependents {
            if let Some(count) = pending.get_mut(dependent) {
                if *count > 0 {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }

    if order.len() != graph.len() {
        debug!(
            ordered = order.len(),
            nodes = graph.len(),
            "no valid order: adjacency left nodes unresolved"
        );
        return None;
    }
    Some(order)
}

/// Orders only the nodes in `ids`, ignoring edges that leave the set.
pub fn topological_sort_subset(graph: &DirectedGraph, ids: &NodeSet) -> Option<Vec<NodeId>> {
    topological_sort(&extract_subgraph(graph, ids))
}

/// Groups nodes into waves that can be worked on together.
///
/// Phase 1 holds every node with no dependency inside the restriction; each
/// later phase holds the nodes whose dependencies were all placed earlier.
/// Nodes caught in a cycle are left out of every phase.
pub fn compute_phases(graph: &DirectedGraph, ids: Option<&NodeSet>) -> BTreeMap<usize, Vec<NodeId>> {
    let in_scope = |id: &NodeId| ids.map_or(true, |set| set.contains(id)) && graph.contains(id);

    let mut pending: IndexMap<&NodeId, usize> = graph
        .nodes
        .keys()
        .filter(|id| in_scope(*id))
        .map(|id| {
            let count = graph
                .adjacency
                .get(id)
                .map_or(0, |deps| deps.iter().filter(|dep| in_scope(*dep)).count());
            (id, count)
        })
        .collect();
    let total = pending.len();

    let mut phases = BTreeMap::new();
    let mut ready: Vec<&NodeId> = pending
        .iter()
        .filter_map(|(id, &count)| if count == 0 { Some(*id) } else { None })
        .collect();
    let mut placed = 0usize;

    while !ready.is_empty() {
        let mut next: Vec<&NodeId> = Vec::new();
        for node in &ready {
            let Some(dependents) = graph.reverse_adjacency.get(*node) else {
                continue;
            };
            for dependent in dependents {
                if let Some(count) = pending.get_mut(dependent) {
                    if *count > 0 {
                        *count -= 1;
                        if *count == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
        }
        next.sort_by_key(|id| graph.nodes.get_index_of(*id));

        placed += ready.len();
        let phase = phases.len() + 1;
        phases.insert(phase, ready.into_iter().cloned().collect::<Vec<_>>());
        ready = next;
    }

    if placed < total {
        debug!(unassigned = total - placed, "phase computation stopped at a cycle");
    }
    debug!(phases = phases.len(), nodes = placed, "computed phases");
    phases
}
