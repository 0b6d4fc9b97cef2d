use serde::Serialize;

use crate::core::node::NodeId;
use crate::graph::{DirectedGraph, NodeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    pub node_id: NodeId,
    pub missing_dependency: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeReport {
    pub valid: bool,
    pub missing_dependencies: Vec<MissingDependency>,
}

/// Checks whether `ids` can be scheduled without anything outside it.
///
/// Each member's linked nodes are read from the reverse adjacency, and every
/// one not in `ids` is reported against that member. Members unknown to the
/// graph have nothing to report. The scope is never expanded.
pub fn validate_scope(graph: &DirectedGraph, ids: &NodeSet) -> ScopeReport {
    let mut missing_dependencies = Vec::new();
    for node_id in ids {
        let Some(linked) = graph.reverse_adjacency.get(node_id) else {
            continue;
        };
        for dep in linked.iter().filter(|dep| !ids.contains(*dep)) {
            missing_dependencies.push(MissingDependency {
                node_id: node_id.clone(),
                missing_dependency: dep.clone(),
            });
        }
    }

    ScopeReport {
        valid: missing_dependencies.is_empty(),
        missing_dependencies,
    }
}
