//! Metadata extraction: what the host shows in its annotation list and what
//! it stores next to the persisted scene.

use crate::groups::parse_group_key;
use crate::layer::{DrawLayer, find_shape, find_text, text_nodes};
use crate::predicates::is_auxiliary_decoration;
use dl_core::NodeIndex;
use dl_core::id::NodeId;
use dl_core::model::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Annotation type as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawKind {
    /// Open poly-line without decorations (free hand).
    Line,
    /// Closed poly-line: region of interest.
    Roi,
    Arrow,
    Protractor,
    Ruler,
    Rectangle,
    Ellipse,
    Circle,
    Arc,
    RegularPolygon,
}

impl DrawKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawKind::Line => "Line",
            DrawKind::Roi => "Roi",
            DrawKind::Arrow => "Arrow",
            DrawKind::Protractor => "Protractor",
            DrawKind::Ruler => "Ruler",
            DrawKind::Rectangle => "Rectangle",
            DrawKind::Ellipse => "Ellipse",
            DrawKind::Circle => "Circle",
            DrawKind::Arc => "Arc",
            DrawKind::RegularPolygon => "RegularPolygon",
        }
    }
}

impl fmt::Display for DrawKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the annotation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayDetails {
    pub id: NodeId,
    /// Decoded position, e.g. `(0,0,3,0)`.
    pub position: String,
    #[serde(rename = "type")]
    pub kind: DrawKind,
    /// Shape stroke as `#RRGGBB`.
    pub color: String,
    pub meta: Option<DrawMeta>,
}

/// Out-of-band data stored per annotation next to the persisted scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoredDetails {
    pub meta: Option<DrawMeta>,
}

// ─── Classification ──────────────────────────────────────────────────────

/// Classify an annotation group from its primary shape and decorations.
/// `None` when the group has no primary shape.
pub fn classify(graph: &SceneGraph, group: NodeIndex) -> Option<DrawKind> {
    let shape = find_shape(graph, group)?;
    let NodeKind::Shape { geometry, .. } = &graph.graph[shape].kind else {
        return None;
    };
    log::trace!(
        "classifying {} by its {} shape",
        graph.graph[group].id,
        geometry.kind_name()
    );

    let kind = match geometry {
        Geometry::Line { closed: true, .. } => DrawKind::Roi,
        Geometry::Line { closed: false, .. } => {
            let first_decoration = graph
                .children_where(group, is_auxiliary_decoration)
                .first()
                .map(|&d| decoration_kind(&graph.graph[d]));
            match first_decoration {
                Some(DecorationKind::Arrowhead) => DrawKind::Arrow,
                Some(DecorationKind::ArcMarker) => DrawKind::Protractor,
                Some(DecorationKind::Plain) => DrawKind::Ruler,
                None => DrawKind::Line,
            }
        }
        Geometry::Rect { .. } => DrawKind::Rectangle,
        Geometry::Ellipse { .. } => DrawKind::Ellipse,
        Geometry::Circle { .. } => DrawKind::Circle,
        Geometry::Arc { .. } => DrawKind::Arc,
        Geometry::Polygon { .. } => DrawKind::RegularPolygon,
    };
    Some(kind)
}

fn decoration_kind(node: &SceneNode) -> DecorationKind {
    match node.kind {
        NodeKind::Decoration { decoration, .. } => decoration,
        _ => DecorationKind::Plain,
    }
}

fn shape_color(graph: &SceneGraph, group: NodeIndex) -> Option<Color> {
    let shape = find_shape(graph, group)?;
    match graph.graph[shape].kind {
        NodeKind::Shape { stroke, .. } => Some(stroke),
        _ => None,
    }
}

fn text_meta(graph: &SceneGraph, group: NodeIndex) -> Option<DrawMeta> {
    find_text(graph, group).and_then(|t| graph.graph[t].meta.clone())
}

// ─── Listing ─────────────────────────────────────────────────────────────

/// Display rows for every annotation, position group by position group.
pub fn list_display_details(layer: &DrawLayer, scroll_index: usize) -> Vec<DisplayDetails> {
    let graph = &layer.graph;
    let mut rows = Vec::new();

    for pg in layer.position_groups() {
        let key = graph.graph[pg].id;
        let position = match parse_group_key(key.as_str()) {
            Ok(decoded) => decoded.to_position(scroll_index).to_string(),
            Err(e) => {
                log::warn!("{e}; listing its annotations under the raw key");
                key.to_string()
            }
        };

        for group in graph.children(pg) {
            let id = graph.graph[group].id;
            let Some(kind) = classify(graph, group) else {
                log::warn!("annotation {id} has no shape; left out of the list");
                continue;
            };
            rows.push(DisplayDetails {
                id,
                position: position.clone(),
                kind,
                color: shape_color(graph, group)
                    .map(|c| c.to_hex())
                    .unwrap_or_default(),
                meta: text_meta(graph, group),
            });
        }
    }
    rows
}

/// Stored details keyed by annotation id.
pub fn list_stored_details(layer: &DrawLayer) -> HashMap<NodeId, StoredDetails> {
    let graph = &layer.graph;
    let mut stored = HashMap::new();

    for (_, group) in layer.annotation_groups() {
        let id = graph.graph[group].id;
        let texts = text_nodes(graph, group);
        match texts.len() {
            0 => log::warn!("annotation {id} has no text node"),
            1 => {}
            n => log::warn!("annotation {id} has {n} text nodes; storing the first one's metadata"),
        }
        let meta = texts.first().and_then(|&t| graph.graph[t].meta.clone());
        stored.insert(id, StoredDetails { meta });
    }
    stored
}
