use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::node::NodeId;
use crate::graph::builder::{add_node, insert_edge};
use crate::graph::order::topological_sort_subset;
use crate::graph::{DirectedGraph, NodeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    pub node: NodeId,
    pub direct_upstream: NodeSet,
    pub direct_downstream: NodeSet,
    pub transitive_upstream: NodeSet,
    pub transitive_downstream: NodeSet,
    /// Dependency-first order over the node and everything depending on it.
    /// Empty when that part of the graph is cyclic.
    pub implementation_order: Vec<NodeId>,
}

/// What `id` depends on directly.
pub fn direct_upstream(graph: &DirectedGraph, id: &NodeId) -> NodeSet {
    graph.adjacency.get(id).cloned().unwrap_or_default()
}

/// What depends on `id` directly.
pub fn direct_downstream(graph: &DirectedGraph, id: &NodeId) -> NodeSet {
    graph.reverse_adjacency.get(id).cloned().unwrap_or_default()
}

pub fn transitive_upstream(graph: &DirectedGraph, id: &NodeId) -> NodeSet {
    reachable(&graph.adjacency, id)
}

pub fn transitive_downstream(graph: &DirectedGraph, id: &NodeId) -> NodeSet {
    reachable(&graph.reverse_adjacency, id)
}

fn reachable(edges: &IndexMap<NodeId, NodeSet>, start: &NodeId) -> NodeSet {
    let mut seen = NodeSet::new();
    let mut stack: Vec<&NodeId> = Vec::new();
    if let Some(next) = edges.get(start) {
        stack.extend(next.iter().rev());
    }
    while let Some(current) = stack.pop() {
        if current == start || !seen.insert(current.clone()) {
            continue;
        }
        if let Some(next) = edges.get(current) {
            stack.extend(next.iter().rev().filter(|id| !seen.contains(*id)));
        }
    }
    seen
}

pub fn analyze_impact(graph: &DirectedGraph, id: &NodeId) -> ImpactReport {
    let transitive_downstream = transitive_downstream(graph, id);

    let mut surface = NodeSet::with_capacity(transitive_downstream.len() + 1);
    surface.insert(id.clone());
    surface.extend(transitive_downstream.iter().cloned());
    let implementation_order = topological_sort_subset(graph, &surface).unwrap_or_default();

    ImpactReport {
        node: id.clone(),
        direct_upstream: direct_upstream(graph, id),
        direct_downstream: direct_downstream(graph, id),
        transitive_upstream: transitive_upstream(graph, id),
        transitive_downstream,
        implementation_order,
    }
}

/// Copy of the graph restricted to `ids`. Edges with an endpoint outside the set are dropped.
pub fn extract_subgraph(graph: &DirectedGraph, ids: &NodeSet) -> DirectedGraph {
    let mut sub = DirectedGraph::new();
    for node in graph.nodes.values().filter(|node| ids.contains(&node.id)) {
        add_node(&mut sub, node.clone());
    }
    for (source, deps) in &graph.adjacency {
        if !sub.contains(source) {
            continue;
        }
        for target in deps.iter().filter(|target| ids.contains(*target)) {
            let kind = graph
                .edge_kind(source, target)
                .unwrap_or(crate::core::node::DEFAULT_EDGE_KIND);
            insert_edge(&mut sub, source, target, kind);
        }
    }
    sub
}

/// Shortest chain of dependencies leading from `from` to `to`, both included.
pub fn dependency_path(graph: &DirectedGraph, from: &NodeId, to: &NodeId) -> Option<Vec<NodeId>> {
    if !graph.contains(from) || !graph.contains(to) {
        return None;
    }
    let mut parent: HashMap<&NodeId, &NodeId> = HashMap::new();
    let mut seen: HashSet<&NodeId> = HashSet::from([from]);
    let mut queue: VecDeque<&NodeId> = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        if current == to {
            let mut path = vec![current.clone()];
            let mut cursor = current;
            while let Some(prev) = parent.get(cursor) {
                path.push((*prev).clone());
                cursor = *prev;
            }
            path.reverse();
            return Some(path);
        }
        let Some(deps) = graph.adjacency.get(current) else {
            continue;
        };
        for dep in deps {
            if seen.insert(dep) {
                parent.insert(dep, current);
                queue.push_back(dep);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::{Edge, Node};
    use crate::graph::builder::build_graph;
    use crate::graph::order::topological_sort;

    fn id(value: &str) -> NodeId {
        NodeId::new(value)
    }

    fn set(values: &[&str]) -> NodeSet {
        values.iter().map(|v| id(v)).collect()
    }

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DirectedGraph {
        let nodes: Vec<Node> = nodes.iter().map(|id| Node::new(*id, "")).collect();
        let edges: Vec<Edge> = edges.iter().map(|(s, t)| Edge::new(*s, *t)).collect();
        build_graph(&nodes, &edges)
    }

    fn sorted(set: &NodeSet) -> Vec<&str> {
        let mut out: Vec<&str> = set.iter().map(NodeId::as_str).collect();
        out.sort();
        out
    }

    #[test]
    fn transitive_queries_follow_chain_both_ways() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert_eq!(sorted(&transitive_upstream(&g, &id("a"))), vec!["b", "c"]);
        assert_eq!(sorted(&transitive_downstream(&g, &id("c"))), vec!["a", "b"]);
        assert!(transitive_upstream(&g, &id("c")).is_empty());
    }

    #[test]
    fn transitive_queries_tolerate_cycles_and_exclude_start() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(sorted(&transitive_upstream(&g, &id("a"))), vec!["b", "c"]);
        assert_eq!(sorted(&transitive_downstream(&g, &id("a"))), vec!["b", "c"]);
    }

    #[test]
    fn unknown_node_has_no_neighbours() {
        let g = graph(&["a"], &[]);
        assert!(direct_upstream(&g, &id("ghost")).is_empty());
        assert!(direct_downstream(&g, &id("ghost")).is_empty());
        assert!(transitive_downstream(&g, &id("ghost")).is_empty());
    }

    #[test]
    fn direct_queries_return_immediate_neighbours_only() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert_eq!(sorted(&direct_upstream(&g, &id("a"))), vec!["b"]);
        assert_eq!(sorted(&direct_downstream(&g, &id("c"))), vec!["b"]);
    }

    #[test]
    fn impact_orders_node_and_its_dependents() {
        let g = graph(
            &["db", "api", "web", "cli", "auth"],
            &[("api", "db"), ("web", "api"), ("cli", "api"), ("api", "auth")],
        );
        let report = analyze_impact(&g, &id("api"));
        assert_eq!(sorted(&report.direct_upstream), vec!["auth", "db"]);
        assert_eq!(sorted(&report.direct_downstream), vec!["cli", "web"]);
        assert_eq!(sorted(&report.transitive_downstream), vec!["cli", "web"]);
        assert_eq!(
            report.implementation_order,
            vec![id("api"), id("web"), id("cli")]
        );
    }

    #[test]
    fn impact_order_is_empty_when_surface_is_cyclic() {
        let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let report = analyze_impact(&g, &id("a"));
        assert_eq!(sorted(&report.transitive_downstream), vec!["b"]);
        assert!(report.implementation_order.is_empty());
    }

    #[test]
    fn subgraph_keeps_only_internal_edges() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);
        let sub = extract_subgraph(&g, &set(&["a", "c", "ghost"]));
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.edges(), vec![Edge::new("a", "c")]);
    }

    #[test]
    fn subgraph_carries_edge_kinds_and_ignores_unknown_ids() {
        let mut g = graph(&["a", "b"], &[]);
        insert_edge(&mut g, &id("a"), &id("b"), "feeds");
        let sub = extract_subgraph(&g, &set(&["b", "a", "ghost"]));
        assert_eq!(sub.edges(), vec![Edge::with_kind("a", "b", "feeds")]);
        assert!(!sub.contains(&id("ghost")));
    }

    #[test]
    fn subgraph_order_matches_graph_built_from_restricted_snapshot() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        let scope = set(&["a", "b", "d"]);
        let direct = graph(&["a", "b", "d"], &[("a", "b"), ("b", "d")]);
        assert_eq!(
            topological_sort(&extract_subgraph(&g, &scope)),
            topological_sort(&direct)
        );
    }

    #[test]
    fn dependency_path_finds_shortest_chain() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")],
        );
        assert_eq!(dependency_path(&g, &id("a"), &id("d")), Some(vec![id("a"), id("d")]));
        assert_eq!(
            dependency_path(&g, &id("b"), &id("d")),
            Some(vec![id("b"), id("c"), id("d")])
        );
        assert_eq!(dependency_path(&g, &id("d"), &id("a")), None);
        assert_eq!(dependency_path(&g, &id("a"), &id("a")), Some(vec![id("a")]));
    }
}
