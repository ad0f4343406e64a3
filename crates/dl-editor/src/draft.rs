//! Annotation drafts: the description of a new annotation, turned into an
//! annotation group subtree by [`AnnotationDraft::build`].
//!
//! Built subtree:
//!
//! ```text
//! annotation
//! ├── shape
//! ├── shape-<kind>-<n>   (decorations)
//! ├── label
//! │   ├── tag
//! │   └── text           (carries the label metadata)
//! └── anchor × n
//! ```

use crate::layer::apply_label_meta;
use dl_core::NodeIndex;
use dl_core::id::NodeId;
use dl_core::model::*;

/// A decoration to add next to the primary shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DecorationDraft {
    pub kind: DecorationKind,
    pub geometry: Geometry,
}

impl DecorationDraft {
    pub fn new(kind: DecorationKind, geometry: Geometry) -> Self {
        Self { kind, geometry }
    }

    /// Arrowheads are filled; arcs and plain decorations are stroked.
    fn paint(&self, color: Color) -> DecorationPaint {
        match self.kind {
            DecorationKind::Arrowhead => DecorationPaint::Fill(color),
            DecorationKind::ArcMarker | DecorationKind::Plain => DecorationPaint::Stroke(color),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDraft {
    /// Group identifier; generated when `None`.
    pub id: Option<NodeId>,
    pub geometry: Geometry,
    pub color: Color,
    pub decorations: Vec<DecorationDraft>,
    pub meta: DrawMeta,
}

impl AnnotationDraft {
    pub fn new(geometry: Geometry, color: Color) -> Self {
        Self {
            id: None,
            geometry,
            color,
            decorations: Vec::new(),
            meta: DrawMeta::default(),
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_decoration(mut self, kind: DecorationKind, geometry: Geometry) -> Self {
        self.decorations.push(DecorationDraft::new(kind, geometry));
        self
    }

    pub fn with_meta(mut self, meta: DrawMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Build the annotation group, detached, in `graph`.
    pub fn build(self, graph: &mut SceneGraph) -> NodeIndex {
        let id = self.id.unwrap_or_else(|| NodeId::with_prefix("draw"));
        let group = graph.add_detached(SceneNode::group(id, role::ANNOTATION));

        let anchors = anchor_points(&self.geometry);
        graph.add_node(
            group,
            SceneNode::new(
                id.child(role::SHAPE),
                role::SHAPE,
                NodeKind::Shape {
                    geometry: self.geometry,
                    stroke: self.color,
                    fill: None,
                },
            ),
        );

        for (n, deco) in self.decorations.iter().enumerate() {
            let name = format!("{}{}-{n}", role::DECORATION_PREFIX, deco.kind.role_suffix());
            graph.add_node(
                group,
                SceneNode::new(
                    id.child(&name),
                    name,
                    NodeKind::Decoration {
                        decoration: deco.kind,
                        geometry: deco.geometry.clone(),
                        paint: deco.paint(self.color),
                    },
                ),
            );
        }

        let label = graph.add_node(
            group,
            SceneNode::group(id.child(role::LABEL), role::LABEL),
        );
        graph.add_node(
            label,
            SceneNode::new(
                id.child(role::TAG),
                role::TAG,
                NodeKind::Tag { fill: self.color },
            ),
        );
        graph.add_node(
            label,
            SceneNode::new(
                id.child(role::TEXT),
                role::TEXT,
                NodeKind::Text {
                    content: String::new(),
                    fill: self.color,
                    shadow: Some(self.color.shadow()),
                },
            ),
        );
        apply_label_meta(graph, group, self.meta);

        for (n, (x, y)) in anchors.into_iter().enumerate() {
            graph.add_node(
                group,
                SceneNode::new(
                    id.child(&format!("{}{n}", role::ANCHOR)),
                    role::ANCHOR,
                    NodeKind::Anchor { x, y },
                ),
            );
        }

        group
    }
}

/// Handle positions for a geometry: every vertex of a line, the corners of
/// a rectangle, the extreme points of an ellipse or circle.
fn anchor_points(geometry: &Geometry) -> Vec<(f32, f32)> {
    match geometry {
        Geometry::Line { points, .. } => points.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
        Geometry::Rect {
            x,
            y,
            width,
            height,
        } => vec![
            (*x, *y),
            (x + width, *y),
            (x + width, y + height),
            (*x, y + height),
        ],
        Geometry::Ellipse { x, y, rx, ry } => {
            vec![(x - rx, *y), (*x, y - ry), (x + rx, *y), (*x, y + ry)]
        }
        Geometry::Circle { x, y, radius } => vec![
            (x - radius, *y),
            (*x, y - radius),
            (x + radius, *y),
            (*x, y + radius),
        ],
        Geometry::Arc { .. } | Geometry::Polygon { .. } => Vec::new(),
    }
}
