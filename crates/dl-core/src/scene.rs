//! Persisted scene format: draw layer ⇄ serde document.
//!
//! The document mirrors the node tree below the layer root. Anchors are
//! interaction handles and are never written; label metadata lives outside
//! the document and is handed back separately when a scene is loaded.
//!
//! Two encodings are provided: JSON (`serde_json`) for storage next to the
//! image and MessagePack (`rmp-serde`) for compact transport.

use crate::id::NodeId;
use crate::model::*;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current document version.
pub const SCENE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("unsupported scene version {found} (expected {expected})", expected = SCENE_VERSION)]
    Version { found: u32 },
}

/// Serialized draw layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub version: u32,
    #[serde(default)]
    pub children: Vec<NodeDocument>,
}

/// Serialized node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDocument>,
}

// ─── Graph → document ────────────────────────────────────────────────────

/// Serialize everything below the layer root, attached nodes only.
#[must_use]
pub fn serialize_layer(graph: &SceneGraph) -> SceneDocument {
    SceneDocument {
        version: SCENE_VERSION,
        children: serialize_children(graph, graph.root),
    }
}

/// Serialize one subtree (the node itself included).
#[must_use]
pub fn serialize_node(graph: &SceneGraph, idx: NodeIndex) -> NodeDocument {
    let node = &graph.graph[idx];
    NodeDocument {
        id: node.id,
        name: node.name.clone(),
        visible: node.visible,
        kind: node.kind.clone(),
        children: serialize_children(graph, idx),
    }
}

fn serialize_children(graph: &SceneGraph, idx: NodeIndex) -> Vec<NodeDocument> {
    graph
        .children(idx)
        .into_iter()
        .filter(|&c| !is_anchor(&graph.graph[c]))
        .map(|c| serialize_node(graph, c))
        .collect()
}

fn is_anchor(node: &SceneNode) -> bool {
    node.name == role::ANCHOR || matches!(node.kind, NodeKind::Anchor { .. })
}

// ─── Document → graph ────────────────────────────────────────────────────

impl SceneDocument {
    /// Build a detached scene graph from the document. The root's
    /// children are the document's top-level nodes.
    pub fn into_graph(self) -> Result<SceneGraph, SceneError> {
        if self.version != SCENE_VERSION {
            return Err(SceneError::Version {
                found: self.version,
            });
        }
        let mut graph = SceneGraph::with_root(NodeId::intern("scene-root"));
        let root = graph.root;
        for child in self.children {
            insert_node_recursive(&mut graph, root, child);
        }
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, SceneError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, SceneError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

fn insert_node_recursive(graph: &mut SceneGraph, parent: NodeIndex, doc: NodeDocument) {
    let mut kind = doc.kind;
    if let NodeKind::Decoration { decoration, .. } = &mut kind
        && *decoration == DecorationKind::Plain
    {
        *decoration = DecorationKind::from_role_name(&doc.name);
    }

    let mut node = SceneNode::new(doc.id, doc.name, kind);
    node.visible = doc.visible;
    let idx = graph.add_node(parent, node);

    for child in doc.children {
        insert_node_recursive(graph, idx, child);
    }
}

/// Parse a JSON scene into a detached tree.
pub fn parse_scene(text: &str) -> Result<SceneGraph, SceneError> {
    SceneDocument::from_json(text)?.into_graph()
}
