use thiserror::Error;

use crate::config::ConfigError;
use crate::core::node::NodeId;
use crate::core::snapshot::SnapshotError;
use crate::graph::scope::MissingDependency;

#[derive(Debug, Error)]
pub enum SysgraphError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no snapshot given (use --snapshot, SYSGRAPH_SNAPSHOT or `snapshot` in .sysgraph/config.toml)")]
    NoSnapshot,
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    /// `path` is the existing chain from `to` back to `from`; empty for unknown nodes.
    #[error("{}", edge_rejected_message(.from, .to, .path))]
    EdgeRejected {
        from: NodeId,
        to: NodeId,
        path: Vec<NodeId>,
    },
    #[error("no valid order: cycle {}", closed_cycle(.cycle))]
    NoValidOrder { cycle: Vec<NodeId> },
    #[error("scope is not self-contained: {}", scope_message(.violations))]
    InvalidScope { violations: Vec<MissingDependency> },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SysgraphError>;

fn join_ids(ids: &[NodeId], separator: &str) -> String {
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(separator)
}

fn closed_cycle(cycle: &[NodeId]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", join_ids(cycle, " -> "), first),
        None => "(unknown)".to_string(),
    }
}

fn edge_rejected_message(from: &NodeId, to: &NodeId, path: &[NodeId]) -> String {
    if from == to {
        return format!("cannot add {from} -> {to}: a node cannot depend on itself");
    }
    if path.is_empty() {
        return format!("cannot add {from} -> {to}: unknown node");
    }
    format!(
        "cannot add {from} -> {to}: it would close the cycle {} -> {to}",
        join_ids(path, " -> ")
    )
}

fn scope_message(violations: &[MissingDependency]) -> String {
    violations
        .iter()
        .map(|item| format!("{} needs {}", item.node_id, item.missing_dependency))
        .collect::<Vec<_>>()
        .join(", ")
}
