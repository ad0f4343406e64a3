//! Node classifiers over role names.

use dl_core::id::NodeId;
use dl_core::model::{SceneNode, role};

pub fn is_shape(node: &SceneNode) -> bool {
    node.name == role::SHAPE
}

/// Arrowheads, angle arcs and other secondary shapes (`shape-*`).
pub fn is_auxiliary_decoration(node: &SceneNode) -> bool {
    node.name.starts_with(role::DECORATION_PREFIX)
}

pub fn is_annotation_group(node: &SceneNode) -> bool {
    node.name == role::ANNOTATION
}

pub fn is_label(node: &SceneNode) -> bool {
    node.name == role::LABEL
}

pub fn is_text(node: &SceneNode) -> bool {
    node.name == role::TEXT
}

pub fn is_anchor(node: &SceneNode) -> bool {
    node.name == role::ANCHOR
}

pub fn is_position_group(node: &SceneNode) -> bool {
    node.name == role::POSITION_GROUP
}

pub fn has_identifier(id: NodeId) -> impl Fn(&SceneNode) -> bool {
    move |node| node.id == id
}

/// Anchors are interaction handles and labels are recolored through their
/// children, so neither takes a color directly.
pub fn can_recolor(node: &SceneNode) -> bool {
    !is_anchor(node) && !is_label(node)
}
