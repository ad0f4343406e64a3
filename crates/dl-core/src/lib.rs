pub mod id;
pub mod model;
pub mod position;
pub mod scene;
pub mod template;

pub use id::NodeId;
pub use model::*;
pub use position::Position;
pub use scene::{SceneDocument, SceneError, parse_scene, serialize_layer};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
