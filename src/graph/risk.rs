use serde::Serialize;

use crate::core::node::NodeId;
use crate::graph::DirectedGraph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDegree {
    pub node_id: NodeId,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskReport {
    /// Every node by number of direct dependents, highest first.
    pub high_fan_in: Vec<NodeDegree>,
    /// Every node by number of direct dependencies, highest first.
    pub high_fan_out: Vec<NodeDegree>,
    pub isolated_nodes: Vec<NodeId>,
}

/// Raw fan-in/fan-out counts. Ties keep node order; no threshold is applied.
pub fn identify_risk_nodes(graph: &DirectedGraph) -> RiskReport {
    let mut high_fan_in = Vec::with_capacity(graph.len());
    let mut high_fan_out = Vec::with_capacity(graph.len());
    let mut isolated_nodes = Vec::new();

    for id in graph.nodes.keys() {
        let fan_in = graph.reverse_adjacency.get(id).map_or(0, |set| set.len());
        let fan_out = graph.adjacency.get(id).map_or(0, |set| set.len());
        if fan_in == 0 && fan_out == 0 {
            isolated_nodes.push(id.clone());
        }
        high_fan_in.push(NodeDegree {
            node_id: id.clone(),
            count: fan_in,
        });
        high_fan_out.push(NodeDegree {
            node_id: id.clone(),
            count: fan_out,
        });
    }

    high_fan_in.sort_by(|a, b| b.count.cmp(&a.count));
    high_fan_out.sort_by(|a, b| b.count.cmp(&a.count));

    RiskReport {
        high_fan_in,
        high_fan_out,
        isolated_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::{Edge, Node};
    use crate::graph::builder::build_graph;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DirectedGraph {
        let nodes: Vec<Node> = nodes.iter().map(|id| Node::new(*id, "")).collect();
        let edges: Vec<Edge> = edges.iter().map(|(s, t)| Edge::new(*s, *t)).collect();
        build_graph(&nodes, &edges)
    }

    fn names(list: &[NodeDegree]) -> Vec<(&str, usize)> {
        list.iter().map(|d| (d.node_id.as_str(), d.count)).collect()
    }

    #[test]
    fn empty_graph_has_empty_report() {
        assert_eq!(identify_risk_nodes(&DirectedGraph::new()), RiskReport::default());
    }

    #[test]
    fn counts_are_sorted_descending_with_stable_ties() {
        let g = graph(
            &["db", "api", "web", "cli", "lonely"],
            &[("api", "db"), ("web", "db"), ("cli", "db"), ("web", "api")],
        );
        let report = identify_risk_nodes(&g);
        assert_eq!(
            names(&report.high_fan_in),
            vec![("db", 3), ("api", 1), ("web", 0), ("cli", 0), ("lonely", 0)]
        );
        assert_eq!(
            names(&report.high_fan_out),
            vec![("web", 2), ("api", 1), ("cli", 1), ("db", 0), ("lonely", 0)]
        );
        assert_eq!(report.isolated_nodes, vec![NodeId::new("lonely")]);
    }
}
