//! Core scene-graph data model for the draw layer.
//!
//! The layer is a tree held in an arena (`StableDiGraph`): nodes are drawable
//! elements (shapes, decorations, labels, text) and edges go parent → child.
//! The child → parent relation is only ever read back through incoming
//! edges, so detaching a subtree just drops one edge and leaves the nodes in
//! the arena, ready to be re-attached by an undo or redo.

use crate::id::NodeId;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
pub fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a hex color string: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`.
    /// The string may optionally start with `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let digits: Vec<u8> = hex
            .bytes()
            .map(hex_val)
            .collect::<Option<Vec<_>>>()?;

        let channels: SmallVec<[u8; 4]> = match digits.len() {
            3 | 4 => digits.iter().map(|d| d * 17).collect(),
            6 | 8 => digits.chunks(2).map(|p| p[0] << 4 | p[1]).collect(),
            _ => return None,
        };
        let alpha = channels.get(3).copied().unwrap_or(255);
        Some(Self::rgba(
            f32::from(channels[0]) / 255.0,
            f32::from(channels[1]) / 255.0,
            f32::from(channels[2]) / 255.0,
            f32::from(alpha) / 255.0,
        ))
    }

    /// Parse either a hex string or one of the common CSS color names
    /// the annotation tools offer (`red`, `yellow`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        let named = match value.trim().to_ascii_lowercase().as_str() {
            "black" => "#000000",
            "white" => "#FFFFFF",
            "red" => "#FF0000",
            "lime" => "#00FF00",
            "green" => "#008000",
            "blue" => "#0000FF",
            "yellow" => "#FFFF00",
            "cyan" => "#00FFFF",
            "magenta" => "#FF00FF",
            "orange" => "#FFA500",
            "purple" => "#800080",
            "gray" | "grey" => "#808080",
            _ => return Self::from_hex(value.trim()),
        };
        Self::from_hex(named)
    }

    /// Emit as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = [self.r, self.g, self.b, self.a].map(|c| (c * 255.0).round() as u8);
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }

    /// Relative luminance (sRGB weights, no gamma correction).
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    /// Shadow color giving the label text contrast against the image:
    /// black behind light colors, white behind dark ones.
    pub fn shadow(&self) -> Self {
        if self.luminance() > 0.5 {
            Self::BLACK
        } else {
            Self::WHITE
        }
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

/// Shape geometry, in image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Poly-line through flat `[x0, y0, x1, y1, ...]` points.
    Line {
        points: SmallVec<[f32; 8]>,
        closed: bool,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Ellipse {
        x: f32,
        y: f32,
        rx: f32,
        ry: f32,
    },
    Circle {
        x: f32,
        y: f32,
        radius: f32,
    },
    Arc {
        x: f32,
        y: f32,
        inner_radius: f32,
        outer_radius: f32,
        angle: f32,
        rotation: f32,
    },
    /// Regular polygon (the arrowhead triangle is a 3-sided one).
    Polygon {
        x: f32,
        y: f32,
        sides: u32,
        radius: f32,
        rotation: f32,
    },
}

impl Geometry {
    /// Open poly-line through the given points.
    pub fn line(points: &[f32]) -> Self {
        Geometry::Line {
            points: SmallVec::from_slice(points),
            closed: false,
        }
    }

    /// Closed poly-line (polygon outline) through the given points.
    pub fn closed_line(points: &[f32]) -> Self {
        Geometry::Line {
            points: SmallVec::from_slice(points),
            closed: true,
        }
    }

    /// The rendering engine's class name for this geometry.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Line { .. } => "Line",
            Geometry::Rect { .. } => "Rect",
            Geometry::Ellipse { .. } => "Ellipse",
            Geometry::Circle { .. } => "Circle",
            Geometry::Arc { .. } => "Arc",
            Geometry::Polygon { .. } => "RegularPolygon",
        }
    }
}

// ─── Decorations ─────────────────────────────────────────────────────────

/// What an auxiliary decoration conveys, fixed when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DecorationKind {
    /// Arrow tip (triangle) at the end of a line.
    Arrowhead,
    /// Angle marker between two lines.
    ArcMarker,
    #[default]
    Plain,
}

impl DecorationKind {
    /// Derive the kind from a role name such as `shape-triangle-0`.
    /// Only used when reading nodes back from a persisted scene.
    pub fn from_role_name(name: &str) -> Self {
        if name.contains("triangle") {
            DecorationKind::Arrowhead
        } else if name.contains("arc") {
            DecorationKind::ArcMarker
        } else {
            DecorationKind::Plain
        }
    }

    /// Role-name suffix used when creating decorations of this kind.
    pub fn role_suffix(&self) -> &'static str {
        match self {
            DecorationKind::Arrowhead => "triangle",
            DecorationKind::ArcMarker => "arc",
            DecorationKind::Plain => "extra",
        }
    }
}

/// Decorations are painted either through their stroke or their fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DecorationPaint {
    Stroke(Color),
    Fill(Color),
}

impl DecorationPaint {
    pub fn color(&self) -> Color {
        match self {
            DecorationPaint::Stroke(c) | DecorationPaint::Fill(c) => *c,
        }
    }

    /// Same capability, new color.
    pub fn recolored(&self, color: Color) -> Self {
        match self {
            DecorationPaint::Stroke(_) => DecorationPaint::Stroke(color),
            DecorationPaint::Fill(_) => DecorationPaint::Fill(color),
        }
    }
}

// ─── Label metadata ──────────────────────────────────────────────────────

/// One quantification value (e.g. a length with its unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Quantity {
    pub fn new(value: f64, unit: Option<&str>) -> Self {
        Self {
            value,
            unit: unit.map(str::to_owned),
        }
    }
}

/// Out-of-band label metadata attached to an annotation's text node.
///
/// Not part of the persisted scene: hosts store it separately (see
/// stored details) and hand it back when the scene is loaded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawMeta {
    /// Label template, e.g. `"{length}"`.
    pub text_expr: String,
    /// Values substituted into `text_expr`.
    #[serde(default)]
    pub quantification: BTreeMap<String, Quantity>,
}

impl DrawMeta {
    pub fn new(text_expr: impl Into<String>) -> Self {
        Self {
            text_expr: text_expr.into(),
            quantification: BTreeMap::new(),
        }
    }

    pub fn with_quantity(mut self, name: &str, quantity: Quantity) -> Self {
        self.quantification.insert(name.to_owned(), quantity);
        self
    }

    /// Expanded label text.
    pub fn expand(&self) -> String {
        crate::template::expand(&self.text_expr, &self.quantification)
    }
}

// ─── Scene Nodes ─────────────────────────────────────────────────────────

/// Role names carried in `SceneNode::name`.
pub mod role {
    pub const LAYER: &str = "layer";
    pub const POSITION_GROUP: &str = "position-group";
    pub const ANNOTATION: &str = "annotation";
    pub const SHAPE: &str = "shape";
    /// Prefix of auxiliary decorations (`shape-triangle`, `shape-arc`, ...).
    pub const DECORATION_PREFIX: &str = "shape-";
    pub const LABEL: &str = "label";
    pub const TAG: &str = "tag";
    pub const TEXT: &str = "text";
    pub const ANCHOR: &str = "anchor";
}

/// Node kinds and their drawable attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Container: layer root, position group, annotation group, label.
    Group,

    /// Primary shape of an annotation.
    Shape {
        geometry: Geometry,
        stroke: Color,
        #[serde(default)]
        fill: Option<Color>,
    },

    /// Auxiliary decoration (arrowhead, angle arc, ...).
    Decoration {
        #[serde(default)]
        decoration: DecorationKind,
        geometry: Geometry,
        paint: DecorationPaint,
    },

    /// Label background.
    Tag { fill: Color },

    /// Label text.
    Text {
        content: String,
        fill: Color,
        #[serde(default)]
        shadow: Option<Color>,
    },

    /// Interaction handle. Never persisted.
    Anchor { x: f32, y: f32 },
}

/// A single node in the draw layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Identifier, unique within the tree.
    pub id: NodeId,

    /// Role tag (see [`role`]).
    pub name: String,

    /// Explicit visibility; `None` inherits from the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,

    pub kind: NodeKind,

    /// Label metadata side channel (text nodes only).
    #[serde(skip)]
    pub meta: Option<DrawMeta>,
}

impl SceneNode {
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            visible: None,
            kind,
            meta: None,
        }
    }

    /// A container node with the given role.
    pub fn group(id: NodeId, name: impl Into<String>) -> Self {
        Self::new(id, name, NodeKind::Group)
    }
}

// ─── Scene Graph ─────────────────────────────────────────────────────────

/// The draw layer: an arena-backed tree of `SceneNode` values.
///
/// Nodes are never freed while the graph lives. Detached subtrees keep
/// their indices, so a `NodeIndex` held by an undo command stays valid.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    /// The underlying directed graph.
    pub graph: StableDiGraph<SceneNode, ()>,

    /// The root (layer) node index.
    pub root: NodeIndex,

    /// Index from NodeId → NodeIndex for fast lookup. Includes detached
    /// nodes; use [`SceneGraph::find_attached`] for tree lookups.
    pub id_index: HashMap<NodeId, NodeIndex>,

    /// Set by `request_redraw`, cleared by `take_redraw`.
    redraw_pending: bool,

    /// Total redraw requests since creation.
    redraw_count: u64,
}

impl SceneGraph {
    /// Create a new scene graph holding only the layer root.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(NodeId::intern(role::LAYER))
    }

    /// Create a new scene graph whose root carries `root_id`.
    #[must_use]
    pub fn with_root(root_id: NodeId) -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(SceneNode::group(root_id, role::LAYER));

        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);

        Self {
            graph,
            root,
            id_index,
            redraw_pending: false,
            redraw_count: 0,
        }
    }

    /// Add a node as the last child of `parent`. Returns the new node's index.
    pub fn add_node(&mut self, parent: NodeIndex, node: SceneNode) -> NodeIndex {
        let idx = self.add_detached(node);
        self.graph.add_edge(parent, idx, ());
        idx
    }

    /// Add a node without a parent.
    ///
    /// An id already held by an attached node keeps pointing at that node;
    /// the new node is indexed once it is attached (see `reparent_node`).
    pub fn add_detached(&mut self, node: SceneNode) -> NodeIndex {
        let id = node.id;
        let idx = self.graph.add_node(node);
        if self.find_attached(id).is_none() {
            self.id_index.insert(id, idx);
        }
        idx
    }

    /// Give the root a new identifier.
    pub fn set_root_id(&mut self, id: NodeId) {
        let root = self.root;
        let old = std::mem::replace(&mut self.graph[root].id, id);
        if self.id_index.get(&old) == Some(&root) {
            self.id_index.remove(&old);
        }
        self.id_index.insert(id, root);
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&SceneNode> {
        self.graph.node_weight(idx)
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut SceneNode> {
        self.graph.node_weight_mut(idx)
    }

    /// Look up a node by id, attached or not.
    pub fn get_by_id(&self, id: NodeId) -> Option<&SceneNode> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Get the index for a NodeId, attached or not.
    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    /// Find a node reachable from the root.
    ///
    /// Falls back to a scan when the index points at a detached node, so
    /// a detached copy never hides the attached one.
    pub fn find_attached(&self, id: NodeId) -> Option<NodeIndex> {
        if let Some(idx) = self.index_of(id).filter(|&idx| self.is_attached(idx)) {
            return Some(idx);
        }
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].id == id && self.is_attached(idx))
    }

    /// Get the parent index of a node.
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Incoming).next()
    }

    /// Whether the node is the root or has the root as an ancestor.
    pub fn is_attached(&self, idx: NodeIndex) -> bool {
        let mut current = idx;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Move `child` under `new_parent`, detaching it from any previous parent.
    /// Attaching re-points `id_index` at the moved subtree.
    pub fn reparent_node(&mut self, child: NodeIndex, new_parent: NodeIndex) {
        self.detach(child);
        self.graph.add_edge(new_parent, child, ());
        if self.is_attached(new_parent) {
            for idx in std::iter::once(child).chain(self.descendants(child)) {
                self.id_index.insert(self.graph[idx].id, idx);
            }
        }
    }

    /// Remove the edge from the node's parent. Returns the former parent.
    pub fn detach(&mut self, child: NodeIndex) -> Option<NodeIndex> {
        let parent = self.parent(child)?;
        if let Some(edge) = self.graph.find_edge(parent, child) {
            self.graph.remove_edge(edge);
        }
        Some(parent)
    }

    /// Get children of a node in document (insertion) order.
    ///
    /// Sorts by `NodeIndex`: nodes are never freed, so arena order is
    /// creation order, and a re-attached node returns to its old slot.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    /// Children of `idx` whose node satisfies `pred`.
    pub fn children_where(
        &self,
        idx: NodeIndex,
        pred: impl Fn(&SceneNode) -> bool,
    ) -> Vec<NodeIndex> {
        self.children(idx)
            .into_iter()
            .filter(|&c| pred(&self.graph[c]))
            .collect()
    }

    /// All descendants of `idx` in pre-order, excluding `idx` itself.
    pub fn descendants(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIndex> = self.children(idx).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }
        out
    }

    /// Copy the subtree rooted at `src_idx` of `source` into this arena.
    /// The copied subtree root is left detached; its index is returned.
    pub fn graft(&mut self, source: &SceneGraph, src_idx: NodeIndex) -> NodeIndex {
        let idx = self.add_detached(source.graph[src_idx].clone());
        for child in source.children(src_idx) {
            let copied = self.graft(source, child);
            self.graph.add_edge(idx, copied, ());
        }
        idx
    }

    /// Visibility after inheritance: hidden if the node or any ancestor is
    /// explicitly hidden, or if the node is not attached.
    pub fn is_effectively_visible(&self, idx: NodeIndex) -> bool {
        let mut current = Some(idx);
        while let Some(c) = current {
            if self.graph[c].visible == Some(false) {
                return false;
            }
            if c == self.root {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    // ─── Redraw signal ───────────────────────────────────────────────────

    /// Ask the rendering layer to redraw. No acknowledgment.
    pub fn request_redraw(&mut self) {
        self.redraw_pending = true;
        self.redraw_count += 1;
    }

    /// Consume the pending redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraw_count
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
