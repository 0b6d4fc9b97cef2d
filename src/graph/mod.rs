//! In-memory dependency graph over systems.
//!
//! Edges point from a node to what it depends on. The forward adjacency
//! ("upstream") lists a node's dependencies; the reverse adjacency
//! ("downstream") lists its dependents. Both are kept as exact inverses of
//! each other by every mutation in [`builder`] and [`cycles`].
//!
//! All maps and sets are insertion-ordered, so every query on an unchanged
//! graph returns the same sequence on every call.

use indexmap::{IndexMap, IndexSet};

use crate::core::node::{Edge, Node, NodeId};

pub mod builder;
pub mod cycles;
pub mod ops;
pub mod order;
pub mod risk;
pub mod scope;
pub mod viz;

pub type NodeSet = IndexSet<NodeId>;

#[derive(Debug, Clone, Default)]
pub struct DirectedGraph {
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) adjacency: IndexMap<NodeId, NodeSet>,
    pub(crate) reverse_adjacency: IndexMap<NodeId, NodeSet>,
    pub(crate) edge_kinds: IndexMap<(NodeId, NodeId), String>,
}

impl DirectedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Nodes `id` depends on.
    pub fn dependencies(&self, id: &NodeId) -> Option<&NodeSet> {
        self.adjacency.get(id)
    }

    /// Nodes depending on `id`.
    pub fn dependents(&self, id: &NodeId) -> Option<&NodeSet> {
        self.reverse_adjacency.get(id)
    }

    pub fn has_edge(&self, source: &NodeId, target: &NodeId) -> bool {
        self.adjacency
            .get(source)
            .map(|deps| deps.contains(target))
            .unwrap_or(false)
    }

    pub fn edge_kind(&self, source: &NodeId, target: &NodeId) -> Option<&str> {
        self.edge_kinds
            .get(&(source.clone(), target.clone()))
            .map(String::as_str)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(IndexSet::len).sum()
    }

    /// Every edge, grouped by source in node order.
    pub fn edges(&self) -> Vec<Edge> {
        let mut out = Vec::with_capacity(self.edge_count());
        for (source, deps) in &self.adjacency {
            for target in deps {
                let kind = self
                    .edge_kind(source, target)
                    .unwrap_or(crate::core::node::DEFAULT_EDGE_KIND);
                out.push(Edge::with_kind(source.clone(), target.clone(), kind));
            }
        }
        out
    }
}
