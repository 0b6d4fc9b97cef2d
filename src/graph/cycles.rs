use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::core::node::{Edge, NodeId, DEFAULT_EDGE_KIND};
use crate::graph::builder::insert_edge;
use crate::graph::DirectedGraph;

/// Whether adding `source -> target` would close a cycle.
///
/// A self-loop always would. Otherwise the edge closes a cycle exactly when
/// `source` is already reachable from `target` over existing dependencies.
pub fn would_create_cycle(graph: &DirectedGraph, source: &NodeId, target: &NodeId) -> bool {
    if source == target {
        return true;
    }

    let mut seen: HashSet<&NodeId> = HashSet::new();
    let mut stack: Vec<&NodeId> = vec![target];
    while let Some(current) = stack.pop() {
        if current == source {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(deps) = graph.adjacency.get(current) {
            stack.extend(deps.iter().filter(|dep| !seen.contains(dep)));
        }
    }
    false
}

/// Adds a `requires` edge unless it would create a cycle. Returns whether it was added.
pub fn add_edge(graph: &mut DirectedGraph, source: &NodeId, target: &NodeId) -> bool {
    add_typed_edge(
        graph,
        &Edge::with_kind(source.clone(), target.clone(), DEFAULT_EDGE_KIND),
    )
}

/// Cycle-safe insert. Rejected edges, including ones naming unknown nodes,
/// leave the graph untouched.
pub fn add_typed_edge(graph: &mut DirectedGraph, edge: &Edge) -> bool {
    if !graph.contains(&edge.source) || !graph.contains(&edge.target) {
        debug!(
            source = %edge.source,
            target = %edge.target,
            reason = "unknown node",
            "edge rejected"
        );
        return false;
    }
    if would_create_cycle(graph, &edge.source, &edge.target) {
        debug!(
            source = %edge.source,
            target = %edge.target,
            reason = "cycle",
            "edge rejected"
        );
        return false;
    }
    insert_edge(graph, &edge.source, &edge.target, &edge.kind);
    trace!(source = %edge.source, target = %edge.target, kind = %edge.kind, "edge added");
    true
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Reports cycles found by a white/gray/black depth-first walk.
///
/// Each entry is the active path from the node that was reached while still
/// on the path, up to the node that reached it. Every disconnected component
/// gets its own root, so each cyclic component yields at least one entry.
/// This is a diagnostic, not an exhaustive enumeration of every cycle.
pub fn detect_cycles(graph: &DirectedGraph) -> Vec<Vec<NodeId>> {
    let mut state: HashMap<&NodeId, VisitState> = HashMap::new();
    let mut path: Vec<&NodeId> = Vec::new();
    let mut cycles = Vec::new();

    for root in graph.nodes.keys() {
        if state.contains_key(root) {
            continue;
        }
        visit_from(root, graph, &mut state, &mut path, &mut cycles);
    }

    if !cycles.is_empty() {
        debug!(count = cycles.len(), "cycles detected");
    }
    cycles
}

fn visit_from<'a>(
    root: &'a NodeId,
    graph: &'a DirectedGraph,
    state: &mut HashMap<&'a NodeId, VisitState>,
    path: &mut Vec<&'a NodeId>,
    cycles: &mut Vec<Vec<NodeId>>,
) {
    // Explicit frames keep long dependency chains off the call stack.
    let mut frames: Vec<(&'a NodeId, usize)> = vec![(root, 0)];
    state.insert(root, VisitState::Visiting);
    path.push(root);

    while let Some((node, cursor)) = frames.last_mut() {
        let next = graph
            .adjacency
            .get(*node)
            .and_then(|deps| deps.get_index(*cursor));
        *cursor += 1;

        match next {
            Some(dep) => match state.get(dep) {
                Some(VisitState::Visiting) => {
                    if let Some(pos) = path.iter().position(|id| *id == dep) {
                        let cycle: Vec<NodeId> =
                            path[pos..].iter().map(|id| (*id).clone()).collect();
                        trace!(len = cycle.len(), "cycle found");
                        cycles.push(cycle);
                    }
                }
                Some(VisitState::Visited) => {}
                None => {
                    state.insert(dep, VisitState::Visiting);
                    path.push(dep);
                    frames.push((dep, 0));
                }
            },
            None => {
                let done = *node;
                state.insert(done, VisitState::Visited);
                path.pop();
                frames.pop();
            }
        }
    }
}
