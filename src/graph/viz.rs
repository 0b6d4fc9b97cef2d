use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::node::NodeId;
use crate::graph::DirectedGraph;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Each node points at what it depends on.
    Down,
    /// Each node points at what depends on it.
    Up,
    Both,
}

impl Direction {
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "down" => Some(Self::Down),
            "up" => Some(Self::Up),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

pub type Children = IndexMap<NodeId, Vec<NodeId>>;

pub fn directional_edges(graph: &DirectedGraph, direction: Direction) -> Children {
    let mut out = Children::new();
    for id in graph.node_ids() {
        let mut children: Vec<NodeId> = Vec::new();
        if matches!(direction, Direction::Down | Direction::Both) {
            if let Some(deps) = graph.dependencies(id) {
                children.extend(deps.iter().cloned());
            }
        }
        if matches!(direction, Direction::Up | Direction::Both) {
            for dependent in graph.dependents(id).into_iter().flatten() {
                if !children.contains(dependent) {
                    children.push(dependent.clone());
                }
            }
        }
        children.sort();
        out.insert(id.clone(), children);
    }
    out
}

/// Nodes nothing points at. A fully cyclic graph falls back to every node.
pub fn graph_roots(edges: &Children) -> Vec<NodeId> {
    let pointed: HashSet<&NodeId> = edges.values().flatten().collect();
    let mut roots: Vec<NodeId> = edges
        .keys()
        .filter(|id| !pointed.contains(*id))
        .cloned()
        .collect();
    if roots.is_empty() {
        roots = edges.keys().cloned().collect();
    }
    roots.sort();
    roots
}

pub fn labels(graph: &DirectedGraph) -> IndexMap<NodeId, String> {
    graph
        .nodes()
        .map(|node| (node.id.clone(), node.display_name().to_string()))
        .collect()
}

fn label_for<'a>(labels: &'a IndexMap<NodeId, String>, id: &'a NodeId) -> &'a str {
    labels.get(id).map(String::as_str).unwrap_or_else(|| id.as_str())
}

pub fn render_tree(roots: &[NodeId], edges: &Children, labels: &IndexMap<NodeId, String>) -> String {
    let mut out = String::new();
    for (idx, root) in roots.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(label_for(labels, root));
        out.push('\n');
        render_tree_children(root, edges, labels, &mut out);
    }
    out
}

pub fn render_flat(roots: &[NodeId], edges: &Children, labels: &IndexMap<NodeId, String>) -> String {
    let mut out = String::new();
    for (idx, root) in roots.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(label_for(labels, root));
        out.push('\n');
        render_flat_children(root, edges, labels, &mut out);
    }
    out
}

/// Graphviz rendering. Edges point from dependent to dependency and carry their kind.
pub fn render_dot(graph: &DirectedGraph) -> String {
    let mut out = String::from("digraph sysgraph {\n");
    for node in graph.nodes() {
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\"];\n",
            escape_dot_label(node.id.as_str()),
            escape_dot_label(node.display_name())
        ));
    }
    for edge in graph.edges() {
        out.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
            escape_dot_label(edge.source.as_str()),
            escape_dot_label(edge.target.as_str()),
            escape_dot_label(&edge.kind)
        ));
    }
    out.push_str("}\n");
    out
}

#[derive(Debug, Serialize)]
pub struct GraphJson {
    pub nodes: Vec<GraphNodeJson>,
    pub edges: Vec<GraphEdgeJson>,
}

#[derive(Debug, Serialize)]
pub struct GraphNodeJson {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct GraphEdgeJson {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub fn graph_to_json(graph: &DirectedGraph) -> GraphJson {
    let nodes = graph
        .nodes()
        .map(|node| GraphNodeJson {
            id: node.id.as_str().to_string(),
            label: node.display_name().to_string(),
        })
        .collect();
    let edges = graph
        .edges()
        .into_iter()
        .map(|edge| GraphEdgeJson {
            from: edge.source.as_str().to_string(),
            to: edge.target.as_str().to_string(),
            kind: edge.kind,
        })
        .collect();
    GraphJson { nodes, edges }
}

struct Frame<'a> {
    node: &'a NodeId,
    children: &'a [NodeId],
    next: usize,
}

fn children_of<'a>(edges: &'a Children, id: &NodeId) -> &'a [NodeId] {
    edges.get(id).map(Vec::as_slice).unwrap_or(&[])
}

/// Depth-first walk below `root` on an explicit stack. For each child `visit`
/// gets the last-sibling flags of its ancestors under the root, whether the
/// child is the last sibling, the child, and whether it is already on the path.
fn walk_children<'a, F>(root: &'a NodeId, edges: &'a Children, mut visit: F)
where
    F: FnMut(&[bool], bool, &NodeId, bool),
{
    let mut on_path: HashSet<&NodeId> = HashSet::from([root]);
    let mut lasts: Vec<bool> = Vec::new();
    let mut stack = vec![Frame {
        node: root,
        children: children_of(edges, root),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        if frame.next == frame.children.len() {
            on_path.remove(frame.node);
            stack.pop();
            lasts.pop();
            continue;
        }
        let children = frame.children;
        let child = &children[frame.next];
        frame.next += 1;
        let is_last = frame.next == children.len();

        let cycle = on_path.contains(child);
        visit(&lasts, is_last, child, cycle);
        if cycle {
            continue;
        }
        on_path.insert(child);
        lasts.push(is_last);
        stack.push(Frame {
            node: child,
            children: children_of(edges, child),
            next: 0,
        });
    }
}

fn render_tree_children(
    root: &NodeId,
    edges: &Children,
    labels: &IndexMap<NodeId, String>,
    out: &mut String,
) {
    walk_children(root, edges, |lasts, is_last, child, cycle| {
        for &ancestor_last in lasts {
            out.push_str(if ancestor_last { "    " } else { "|   " });
        }
        out.push_str(if is_last { "`-- " } else { "|-- " });
        out.push_str(label_for(labels, child));
        out.push_str(if cycle { " (cycle)\n" } else { "\n" });
    });
}

fn render_flat_children(
    root: &NodeId,
    edges: &Children,
    labels: &IndexMap<NodeId, String>,
    out: &mut String,
) {
    walk_children(root, edges, |lasts, _, child, cycle| {
        out.push_str(&"  ".repeat(lasts.len() + 1));
        out.push_str(label_for(labels, child));
        out.push_str(if cycle { " (cycle)\n" } else { "\n" });
    });
}

fn escape_dot_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::{Edge, Node};
    use crate::graph::builder::build_graph;

    fn sample() -> DirectedGraph {
        build_graph(
            &[
                Node::new("app", "App"),
                Node::new("lib", ""),
                Node::new("core", "Core \"v2\""),
            ],
            &[Edge::new("app", "lib"), Edge::with_kind("lib", "core", "links")],
        )
    }

    #[test]
    fn tree_starts_at_nodes_without_dependents() {
        let graph = sample();
        let edges = directional_edges(&graph, Direction::Down);
        let roots = graph_roots(&edges);
        assert_eq!(roots, vec![NodeId::new("app")]);
        let rendered = render_tree(&roots, &edges, &labels(&graph));
        assert_eq!(rendered, "App\n`-- lib\n    `-- Core \"v2\"\n");
    }

    #[test]
    fn up_direction_roots_at_leaf_dependencies() {
        let graph = sample();
        let edges = directional_edges(&graph, Direction::Up);
        let roots = graph_roots(&edges);
        assert_eq!(roots, vec![NodeId::new("core")]);
        let rendered = render_flat(&roots, &edges, &labels(&graph));
        assert_eq!(rendered, "Core \"v2\"\n  lib\n    App\n");
    }

    #[test]
    fn cycles_are_marked_instead_of_followed() {
        let graph = build_graph(
            &[Node::new("a", ""), Node::new("b", "")],
            &[Edge::new("a", "b"), Edge::new("b", "a")],
        );
        let edges = directional_edges(&graph, Direction::Down);
        let roots = graph_roots(&edges);
        assert_eq!(roots.len(), 2);
        let rendered = render_tree(&roots[..1], &edges, &labels(&graph));
        assert_eq!(rendered, "a\n`-- b\n    `-- a (cycle)\n");
    }

    #[test]
    fn siblings_get_branch_prefixes() {
        let graph = build_graph(
            &[Node::new("a", ""), Node::new("b", ""), Node::new("c", ""), Node::new("d", "")],
            &[Edge::new("a", "b"), Edge::new("a", "c"), Edge::new("b", "d")],
        );
        let edges = directional_edges(&graph, Direction::Down);
        let roots = graph_roots(&edges);
        let labels = labels(&graph);
        assert_eq!(
            render_tree(&roots, &edges, &labels),
            "a\n|-- b\n|   `-- d\n`-- c\n"
        );
        assert_eq!(render_flat(&roots, &edges, &labels), "a\n  b\n    d\n  c\n");
    }

    #[test]
    fn long_chain_renders_on_a_small_stack() {
        let size = 2_000;
        let nodes: Vec<Node> = (0..size).map(|n| Node::new(format!("n{n}"), "")).collect();
        let chain: Vec<Edge> = (1..size)
            .map(|n| Edge::new(format!("n{}", n - 1), format!("n{n}")))
            .collect();
        let graph = build_graph(&nodes, &chain);

        let handle = std::thread::Builder::new()
            .stack_size(128 * 1024)
            .spawn(move || {
                let edges = directional_edges(&graph, Direction::Down);
                let roots = graph_roots(&edges);
                let labels = labels(&graph);
                let tree = render_tree(&roots, &edges, &labels);
                let flat = render_flat(&roots, &edges, &labels);
                (tree.lines().count(), flat.lines().count())
            })
            .expect("spawn render thread");
        assert_eq!(handle.join().expect("render thread"), (size, size));
    }

    #[test]
    fn dot_escapes_labels_and_carries_edge_kind() {
        let dot = render_dot(&sample());
        assert!(dot.starts_with("digraph sysgraph {\n"));
        assert!(dot.contains("\"core\" [label=\"Core \\\"v2\\\"\"];"));
        assert!(dot.contains("\"lib\" -> \"core\" [label=\"links\"];"));
    }

    #[test]
    fn json_model_lists_nodes_and_typed_edges() {
        let json = graph_to_json(&sample());
        assert_eq!(json.nodes.len(), 3);
        assert_eq!(json.edges[0].kind, "requires");
        assert_eq!(json.edges[1].from, "lib");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!(Direction::parse("UP"), Some(Direction::Up));
        assert_eq!(Direction::parse("sideways"), None);
    }
}
