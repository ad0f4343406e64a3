//! The draw layer owned by a controller: scene graph plus active key.

use crate::config::LayerConfig;
use crate::error::DrawError;
use crate::groups;
use crate::predicates::{is_anchor, is_label, is_shape, is_text};
use dl_core::NodeIndex;
use dl_core::id::NodeId;
use dl_core::model::{DrawMeta, NodeKind, SceneGraph, role};

pub struct DrawLayer {
    /// The layer's node tree.
    pub graph: SceneGraph,
    /// Identifier of the visible position group.
    active_key: Option<NodeId>,
    strict_groups: bool,
}

impl DrawLayer {
    /// A fresh, empty layer.
    pub fn new(config: &LayerConfig) -> Self {
        Self::from_graph(SceneGraph::new(), config)
    }

    /// Adopt `graph`. Its root is given a unique identifier so commands
    /// can tell layers apart.
    pub fn from_graph(mut graph: SceneGraph, config: &LayerConfig) -> Self {
        graph.set_root_id(NodeId::with_prefix(role::LAYER));
        Self {
            graph,
            active_key: None,
            strict_groups: config.strict_groups,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.graph.graph[self.graph.root].id
    }

    pub fn active_key(&self) -> Option<NodeId> {
        self.active_key
    }

    /// Store the active key and update group visibility.
    pub fn activate(&mut self, key: NodeId) {
        self.active_key = Some(key);
        groups::set_active_group(&mut self.graph, key);
    }

    pub fn get_or_create_group(&mut self, key: NodeId) -> Result<NodeIndex, DrawError> {
        groups::get_or_create_group(&mut self.graph, key, self.strict_groups)
    }

    /// Make a position group's visibility agree with the active key.
    /// Before any activation every group stays visible.
    pub fn sync_group_visibility(&mut self, group: NodeIndex) {
        let id = self.graph.graph[group].id;
        let visible = self.active_key.is_none_or(|key| key == id);
        self.graph.graph[group].visible = Some(visible);
    }

    pub fn position_groups(&self) -> Vec<NodeIndex> {
        groups::position_groups(&self.graph)
    }

    /// Annotation groups, position group by position group, in document order.
    pub fn annotation_groups(&self) -> Vec<(NodeIndex, NodeIndex)> {
        self.position_groups()
            .into_iter()
            .flat_map(|pg| {
                self.graph
                    .children(pg)
                    .into_iter()
                    .map(move |group| (pg, group))
            })
            .collect()
    }

    /// First annotation group still attached, if any.
    pub fn first_annotation_group(&self) -> Option<NodeIndex> {
        self.position_groups()
            .into_iter()
            .find_map(|pg| self.graph.children(pg).first().copied())
    }
}

// ─── Annotation structure ────────────────────────────────────────────────

pub fn find_shape(graph: &SceneGraph, group: NodeIndex) -> Option<NodeIndex> {
    graph.children_where(group, is_shape).first().copied()
}

pub fn find_label(graph: &SceneGraph, group: NodeIndex) -> Option<NodeIndex> {
    graph.children_where(group, is_label).first().copied()
}

/// Text nodes below an annotation group, anchors (and their subtrees)
/// excluded.
pub fn text_nodes(graph: &SceneGraph, group: NodeIndex) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    let mut stack = graph.children(group);
    stack.reverse();
    while let Some(idx) = stack.pop() {
        let node = &graph.graph[idx];
        if is_anchor(node) {
            continue;
        }
        if is_text(node) || matches!(node.kind, NodeKind::Text { .. }) {
            out.push(idx);
        }
        stack.extend(graph.children(idx).into_iter().rev());
    }
    out
}

/// The label's text node.
pub fn find_text(graph: &SceneGraph, group: NodeIndex) -> Option<NodeIndex> {
    let label = find_label(graph, group)?;
    graph
        .children_where(label, |n| matches!(n.kind, NodeKind::Text { .. }))
        .first()
        .copied()
}

/// Attach `meta` to the label text, re-expand the text, and hide the label
/// when the expansion is empty.
pub fn apply_label_meta(graph: &mut SceneGraph, group: NodeIndex, meta: DrawMeta) -> bool {
    let (Some(label), Some(text)) = (find_label(graph, group), find_text(graph, group)) else {
        log::warn!(
            "annotation {} has no label text; metadata not applied",
            graph.graph[group].id
        );
        return false;
    };

    let expanded = meta.expand();
    let visible = !expanded.is_empty();
    let node = &mut graph.graph[text];
    if let NodeKind::Text { content, .. } = &mut node.kind {
        *content = expanded;
    }
    node.meta = Some(meta);
    graph.graph[label].visible = Some(visible);
    true
}
