use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::node::{Edge, Node, NodeId};
use crate::graph::builder::build_graph;
use crate::graph::DirectedGraph;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot not found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported snapshot format for {0} (expected .json, .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse snapshot at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse snapshot at {path}: {source}")]
    TomlRead {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write snapshot at {path}: {source}")]
    TomlWrite {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
    Toml,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Nodes and edges as loaded by a caller for one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        if !path.is_file() {
            return Err(SnapshotError::NotFound(path.to_path_buf()));
        }
        let format = SnapshotFormat::from_path(path)
            .ok_or_else(|| SnapshotError::UnsupportedFormat(path.to_path_buf()))?;
        let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, format, path)
    }

    pub fn parse(contents: &str, format: SnapshotFormat, path: &Path) -> Result<Self, SnapshotError> {
        let path = path.to_path_buf();
        match format {
            SnapshotFormat::Json => {
                serde_json::from_str(contents).map_err(|source| SnapshotError::Json { path, source })
            }
            SnapshotFormat::Yaml => {
                serde_yaml::from_str(contents).map_err(|source| SnapshotError::Yaml { path, source })
            }
            SnapshotFormat::Toml => {
                toml::from_str(contents).map_err(|source| SnapshotError::TomlRead { path, source })
            }
        }
    }

    /// Writes the snapshot back in the format its extension names.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let format = SnapshotFormat::from_path(path)
            .ok_or_else(|| SnapshotError::UnsupportedFormat(path.to_path_buf()))?;
        let owned = path.to_path_buf();
        let contents = match format {
            SnapshotFormat::Json => serde_json::to_string_pretty(self)
                .map(|mut text| {
                    text.push('\n');
                    text
                })
                .map_err(|source| SnapshotError::Json {
                    path: owned,
                    source,
                })?,
            SnapshotFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|source| SnapshotError::Yaml {
                    path: owned,
                    source,
                })?,
            SnapshotFormat::Toml => toml::to_string_pretty(self)
                .map_err(|source| SnapshotError::TomlWrite {
                    path: owned,
                    source,
                })?,
        };
        std::fs::write(path, contents).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_graph(&self) -> DirectedGraph {
        build_graph(&self.nodes, &self.edges)
    }

    pub fn from_graph(graph: &DirectedGraph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges(),
        }
    }

    /// Snapshot of `graph` that keeps this snapshot's dangling edges. Rows
    /// touching a node that was here before and is gone from `graph` are dropped.
    pub fn with_graph(&self, graph: &DirectedGraph) -> Self {
        let removed: HashSet<&NodeId> = self
            .nodes
            .iter()
            .map(|node| &node.id)
            .filter(|id| !graph.contains(id))
            .collect();
        let mut edges = graph.edges();
        edges.extend(
            self.dangling_edges()
                .into_iter()
                .filter(|edge| !removed.contains(&edge.source) && !removed.contains(&edge.target))
                .cloned(),
        );
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges,
        }
    }

    /// Edges that name a node missing from the snapshot. `build_graph` drops these.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let known: HashSet<&NodeId> = self.nodes.iter().map(|node| &node.id).collect();
        self.edges
            .iter()
            .filter(|edge| !known.contains(&edge.source) || !known.contains(&edge.target))
            .collect()
    }
}
