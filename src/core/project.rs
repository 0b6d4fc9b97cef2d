use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::resolve::{
    apply_env_overrides, load_settings, resolve_config_with_overrides, resolve_snapshot_path,
};
use crate::config::Settings;
use crate::core::snapshot::Snapshot;
use crate::error::{Result, SysgraphError};
use crate::graph::DirectedGraph;

/// Everything one command needs: settings, the snapshot it was loaded from, and the built graph.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub settings: Settings,
    pub snapshot_path: PathBuf,
    pub snapshot: Snapshot,
    pub graph: DirectedGraph,
}

impl Project {
    pub fn discover(
        start: impl AsRef<Path>,
        snapshot: Option<PathBuf>,
        config: Option<PathBuf>,
    ) -> Result<Self> {
        let resolved = resolve_config_with_overrides(start, config)?;
        let mut settings = load_settings(&resolved)?;
        apply_env_overrides(&mut settings);
        settings.validate()?;

        let snapshot_path = resolve_snapshot_path(snapshot, &settings, &resolved)
            .ok_or(SysgraphError::NoSnapshot)?;
        Self::load_from(resolved.root, settings, snapshot_path)
    }

    pub fn load_from(root: PathBuf, settings: Settings, snapshot_path: PathBuf) -> Result<Self> {
        let snapshot = Snapshot::load(&snapshot_path)?;
        for edge in snapshot.dangling_edges() {
            warn!(source = %edge.source, target = %edge.target, "edge references an unknown node");
        }
        let graph = snapshot.to_graph();
        debug!(
            path = %snapshot_path.display(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            "loaded snapshot"
        );

        Ok(Self {
            root,
            settings,
            snapshot_path,
            snapshot,
            graph,
        })
    }

    /// Writes the current graph back over the snapshot file. Dangling edges
    /// survive unless they touch a node removed since load.
    pub fn persist(&mut self) -> Result<()> {
        self.snapshot = self.snapshot.with_graph(&self.graph);
        self.snapshot.save(&self.snapshot_path)?;
        debug!(path = %self.snapshot_path.display(), "saved snapshot");
        Ok(())
    }
}
