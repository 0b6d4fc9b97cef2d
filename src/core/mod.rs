pub mod node;
pub mod project;
pub mod snapshot;

pub use node::{Edge, Node, NodeId};
pub use project::Project;
pub use snapshot::{Snapshot, SnapshotError, SnapshotFormat};
