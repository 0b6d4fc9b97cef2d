use tracing::{debug, trace};

use crate::core::node::{Edge, Node, NodeId};
use crate::graph::{DirectedGraph, NodeSet};

/// Builds a graph from a caller snapshot. Edges naming an unknown node are dropped.
pub fn build_graph(nodes: &[Node], edges: &[Edge]) -> DirectedGraph {
    let mut graph = DirectedGraph::new();
    for node in nodes {
        add_node(&mut graph, node.clone());
    }

    let mut dropped = 0usize;
    for edge in edges {
        if !graph.contains(&edge.source) || !graph.contains(&edge.target) {
            trace!(source = %edge.source, target = %edge.target, "dropping dangling edge");
            dropped += 1;
            continue;
        }
        insert_edge(&mut graph, &edge.source, &edge.target, &edge.kind);
    }

    debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        dropped,
        "built dependency graph"
    );
    graph
}

/// Inserts or replaces a node record. Existing edges of the same id are kept.
pub fn add_node(graph: &mut DirectedGraph, node: Node) {
    let id = node.id.clone();
    graph.nodes.insert(id.clone(), node);
    graph.adjacency.entry(id.clone()).or_default();
    graph.reverse_adjacency.entry(id).or_default();
}

pub fn remove_node(graph: &mut DirectedGraph, id: &NodeId) {
    if graph.nodes.shift_remove(id).is_none() {
        return;
    }
    let dependencies = graph.adjacency.shift_remove(id).unwrap_or_default();
    let dependents = graph.reverse_adjacency.shift_remove(id).unwrap_or_default();

    for dep in &dependencies {
        if let Some(back) = graph.reverse_adjacency.get_mut(dep) {
            back.shift_remove(id);
        }
        graph.edge_kinds.shift_remove(&(id.clone(), dep.clone()));
    }
    for dependent in &dependents {
        if let Some(forward) = graph.adjacency.get_mut(dependent) {
            forward.shift_remove(id);
        }
        graph.edge_kinds.shift_remove(&(dependent.clone(), id.clone()));
    }

    debug!(
        node = %id,
        dependencies = dependencies.len(),
        dependents = dependents.len(),
        "removed node"
    );
}

pub fn remove_edge(graph: &mut DirectedGraph, source: &NodeId, target: &NodeId) {
    let removed = graph
        .adjacency
        .get_mut(source)
        .map(|deps| deps.shift_remove(target))
        .unwrap_or(false);
    if !removed {
        return;
    }
    if let Some(back) = graph.reverse_adjacency.get_mut(target) {
        back.shift_remove(source);
    }
    graph
        .edge_kinds
        .shift_remove(&(source.clone(), target.clone()));
    debug!(%source, %target, "removed edge");
}

/// Inserts `source -> target` into both adjacency maps without any cycle check.
/// Both endpoints must already be nodes. A repeated pair keeps its first kind.
pub(crate) fn insert_edge(graph: &mut DirectedGraph, source: &NodeId, target: &NodeId, kind: &str) {
    graph
        .adjacency
        .entry(source.clone())
        .or_insert_with(NodeSet::new)
        .insert(target.clone());
    graph
        .reverse_adjacency
        .entry(target.clone())
        .or_insert_with(NodeSet::new)
        .insert(source.clone());
    graph
        .edge_kinds
        .entry((source.clone(), target.clone()))
        .or_insert_with(|| kind.to_string());
}
