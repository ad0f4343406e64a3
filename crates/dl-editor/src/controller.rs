//! Draw controller: owns one viewport's draw layer.
//!
//! The controller tracks which position group is visible, turns add and
//! delete requests into commands, reconciles persisted scenes with the live
//! tree, and answers list queries. Every command it issues is reported to
//! the caller's `CommandListener` so an undo history can record it.

use crate::commands::{
    CommandListener, CreateAnnotationCommand, DeleteAnnotationCommand, DrawCommand,
};
use crate::config::LayerConfig;
use crate::details::{self, DisplayDetails, StoredDetails, classify};
use crate::draft::AnnotationDraft;
use crate::error::DrawError;
use crate::groups::resolve_active_group_key;
use crate::layer::{DrawLayer, apply_label_meta, find_label, find_shape};
use crate::predicates::{
    can_recolor, is_annotation_group, is_auxiliary_decoration, is_label, is_position_group,
    is_shape,
};
use dl_core::NodeIndex;
use dl_core::id::NodeId;
use dl_core::model::*;
use dl_core::position::Position;
use dl_core::scene::{parse_scene, serialize_layer};
use std::collections::HashMap;

/// Requested change to an existing annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawUpdate {
    pub id: NodeId,
    pub color: Color,
    /// Replacement label metadata; `None` keeps the current one.
    pub meta: Option<DrawMeta>,
}

pub struct DrawController {
    /// `None` once released by `reset()`.
    layer: Option<DrawLayer>,
    config: LayerConfig,
}

impl DrawController {
    /// Controller over a fresh, empty layer.
    pub fn new(config: LayerConfig) -> Self {
        Self {
            layer: Some(DrawLayer::new(&config)),
            config,
        }
    }

    /// Controller adopting an existing layer graph.
    pub fn with_graph(graph: SceneGraph, config: LayerConfig) -> Self {
        Self {
            layer: Some(DrawLayer::from_graph(graph, &config)),
            config,
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn layer(&self) -> Result<&DrawLayer, DrawError> {
        self.layer.as_ref().ok_or(DrawError::Released)
    }

    pub fn layer_mut(&mut self) -> Result<&mut DrawLayer, DrawError> {
        self.layer.as_mut().ok_or(DrawError::Released)
    }

    pub fn is_released(&self) -> bool {
        self.layer.is_none()
    }

    /// Release the layer. Every later operation fails with `Released`.
    pub fn reset(&mut self) {
        self.layer = None;
    }

    // ─── Position ────────────────────────────────────────────────────────

    /// Show the position group for `position` and hide the others.
    /// Returns the active key.
    pub fn activate(&mut self, position: &Position, scroll_value: i64) -> Result<NodeId, DrawError> {
        let key = resolve_active_group_key(position, scroll_value);
        log::debug!("activating {key} for position {position}");
        self.layer_mut()?.activate(key);
        Ok(key)
    }

    pub fn active_key(&self) -> Option<NodeId> {
        self.layer.as_ref().and_then(DrawLayer::active_key)
    }

    /// The active position group, created if needed.
    pub fn get_active_group(&mut self) -> Result<NodeIndex, DrawError> {
        let layer = self.layer_mut()?;
        let key = layer.active_key().ok_or(DrawError::NotActivated)?;
        layer.get_or_create_group(key)
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    /// Find an attached node by id. Absence is logged, not an error.
    pub fn find_by_id(&self, id: NodeId) -> Option<NodeIndex> {
        let Some(layer) = self.layer.as_ref() else {
            log::warn!("lookup of {id} on a released draw layer");
            return None;
        };
        let found = layer.graph.find_attached(id);
        if found.is_none() {
            log::warn!("no draw with id {id}");
        }
        found
    }

    pub fn list_display_details(&self) -> Result<Vec<DisplayDetails>, DrawError> {
        Ok(details::list_display_details(
            self.layer()?,
            self.config.scroll_index,
        ))
    }

    pub fn list_stored_details(&self) -> Result<HashMap<NodeId, StoredDetails>, DrawError> {
        Ok(details::list_stored_details(self.layer()?))
    }

    /// Persisted scene as JSON. Label metadata is not included; pair it
    /// with [`DrawController::list_stored_details`].
    pub fn serialize_scene(&self) -> Result<String, DrawError> {
        Ok(serialize_layer(&self.layer()?.graph).to_json()?)
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Build an annotation from `draft` and attach it under `position`
    /// (the active group when `None`). Returns the new group's id.
    pub fn add_annotation(
        &mut self,
        draft: AnnotationDraft,
        position: Option<NodeId>,
        listener: &mut impl CommandListener,
    ) -> Result<NodeId, DrawError> {
        let layer = self.layer_mut()?;
        let key = position
            .or(layer.active_key())
            .ok_or(DrawError::NotActivated)?;
        if let Some(id) = draft.id
            && layer.graph.find_attached(id).is_some()
        {
            return Err(DrawError::InvalidOperation(format!(
                "an annotation with id {id} already exists"
            )));
        }

        let group = draft.build(&mut layer.graph);
        let kind = classify(&layer.graph, group).map_or("annotation", |k| k.as_str());
        let cmd = CreateAnnotationCommand::new(layer, group, kind, key)?;
        let id = cmd.group_id();
        run_command(layer, DrawCommand::Create(cmd), listener)?;
        Ok(id)
    }

    /// Reconcile a persisted scene with the live tree.
    ///
    /// Incoming position groups are matched by identifier; each incoming
    /// annotation group is grafted into the live arena, given its stored
    /// metadata, and attached through a `CreateAnnotationCommand`.
    /// Returns the number of annotations loaded.
    ///
    /// A malformed annotation aborts the load; annotations loaded before
    /// it stay in place and their commands have been reported.
    pub fn load_scene(
        &mut self,
        serialized: &str,
        details_by_id: &HashMap<NodeId, StoredDetails>,
        listener: &mut impl CommandListener,
    ) -> Result<usize, DrawError> {
        let incoming = parse_scene(serialized)?;
        let layer = self.layer_mut()?;
        let mut loaded = 0;

        for source_group in incoming.children(incoming.root) {
            let source_node = &incoming.graph[source_group];
            if !is_position_group(source_node) {
                log::warn!(
                    "skipping top-level {} ({}): not a position group",
                    source_node.id,
                    source_node.name
                );
                continue;
            }
            let key = source_node.id;
            let live_group = layer.get_or_create_group(key)?;
            layer.sync_group_visibility(live_group);

            // Work queue taken before any grafting, in persisted order.
            let queue = incoming.children(source_group);
            for source_annotation in queue {
                check_annotation(&incoming, source_annotation)?;
                let id = incoming.graph[source_annotation].id;
                if layer.graph.find_attached(id).is_some() {
                    log::warn!("annotation {id} is already loaded; skipping the incoming copy");
                    continue;
                }

                let group = layer.graph.graft(&incoming, source_annotation);
                match details_by_id.get(&id).and_then(|d| d.meta.clone()) {
                    Some(meta) => {
                        apply_label_meta(&mut layer.graph, group, meta);
                    }
                    None => log::debug!("no stored details for {id}"),
                }

                let kind = classify(&layer.graph, group).map_or("annotation", |k| k.as_str());
                let cmd = CreateAnnotationCommand::new(layer, group, kind, key)?;
                run_command(layer, DrawCommand::Create(cmd), listener)?;
                log::trace!("loaded {id} into {key}");
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Recolor an annotation and optionally replace its label metadata.
    /// Returns `false` (and logs) when no annotation has that id.
    pub fn update_annotation(&mut self, update: DrawUpdate) -> Result<bool, DrawError> {
        let Some(group) = self.find_by_id(update.id) else {
            return Ok(false);
        };
        let layer = self.layer_mut()?;
        let graph = &mut layer.graph;
        if !is_annotation_group(&graph.graph[group]) {
            log::warn!(
                "{} is a {} node, not an annotation; nothing updated",
                update.id,
                graph.graph[group].name
            );
            return Ok(false);
        }
        let color = update.color;

        for child in graph.children(group) {
            let node = &mut graph.graph[child];
            if !can_recolor(node) {
                continue;
            }
            if is_shape(node) {
                if let NodeKind::Shape { stroke, .. } = &mut node.kind {
                    *stroke = color;
                }
            } else if is_auxiliary_decoration(node)
                && let NodeKind::Decoration { paint, .. } = &mut node.kind
            {
                *paint = paint.recolored(color);
            }
        }

        if let Some(label) = find_label(graph, group) {
            for child in graph.children(label) {
                match &mut graph.graph[child].kind {
                    NodeKind::Text { fill, shadow, .. } => {
                        *fill = color;
                        *shadow = Some(color.shadow());
                    }
                    NodeKind::Tag { fill } => *fill = color,
                    _ => {}
                }
            }
        }

        if let Some(meta) = update.meta {
            apply_label_meta(graph, group, meta);
        }
        graph.request_redraw();
        Ok(true)
    }

    /// Delete one node (normally an annotation group) through a command.
    /// Returns `false` when the id is unknown.
    pub fn delete_by_id(
        &mut self,
        id: NodeId,
        listener: &mut impl CommandListener,
    ) -> Result<bool, DrawError> {
        let Some(group) = self.find_by_id(id) else {
            return Ok(false);
        };
        let layer = self.layer_mut()?;
        if group == layer.graph.root {
            return Err(DrawError::InvalidOperation(
                "the layer root cannot be deleted".into(),
            ));
        }
        delete_group(layer, group, listener)?;
        Ok(true)
    }

    /// Delete every annotation group, one command each. Returns how many
    /// were deleted.
    pub fn delete_all(&mut self, listener: &mut impl CommandListener) -> Result<usize, DrawError> {
        let layer = self.layer_mut()?;
        let mut deleted = 0;
        // Re-query after every deletion: each one changes the tree.
        while let Some(group) = layer.first_annotation_group() {
            delete_group(layer, group, listener)?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

fn delete_group(
    layer: &mut DrawLayer,
    group: NodeIndex,
    listener: &mut impl CommandListener,
) -> Result<(), DrawError> {
    let name = classify(&layer.graph, group)
        .map(|k| k.to_string())
        .unwrap_or_else(|| layer.graph.graph[group].name.clone());
    let cmd = DeleteAnnotationCommand::new(layer, group, name)?;
    run_command(layer, DrawCommand::Delete(cmd), listener)
}

/// Execute, then report to the listener.
fn run_command(
    layer: &mut DrawLayer,
    cmd: DrawCommand,
    listener: &mut impl CommandListener,
) -> Result<(), DrawError> {
    let event = cmd.execute(layer)?;
    listener.on_command(&cmd);
    listener.on_executed(&event);
    Ok(())
}

/// An incoming annotation group needs a primary shape and a label.
fn check_annotation(graph: &SceneGraph, group: NodeIndex) -> Result<(), DrawError> {
    let id = graph.graph[group].id;
    if find_shape(graph, group).is_none() {
        return Err(DrawError::MalformedScene(format!(
            "annotation {id} has no shape"
        )));
    }
    if graph.children_where(group, is_label).is_empty() {
        return Err(DrawError::MalformedScene(format!(
            "annotation {id} has no label"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandEvent;
    use pretty_assertions::assert_eq;

    fn controller() -> DrawController {
        DrawController::new(LayerConfig::default())
    }

    fn ruler(id: &str) -> AnnotationDraft {
        AnnotationDraft::new(Geometry::line(&[0.0, 0.0, 10.0, 0.0]), Color::BLACK)
            .with_id(NodeId::intern(id))
            .with_decoration(DecorationKind::Plain, Geometry::line(&[0.0, -1.0, 0.0, 1.0]))
            .with_meta(DrawMeta::new("{length}").with_quantity("length", Quantity::new(10.0, Some("mm"))))
    }

    #[test]
    fn active_group_requires_activation() {
        let mut ctl = controller();
        assert!(matches!(ctl.get_active_group(), Err(DrawError::NotActivated)));
        assert!(matches!(
            ctl.add_annotation(ruler("ctl_unactivated"), None, &mut ()),
            Err(DrawError::NotActivated)
        ));

        ctl.activate(&Position::new(&[0, 0, 4]), 4).unwrap();
        let a = ctl.get_active_group().unwrap();
        let b = ctl.get_active_group().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn add_reports_to_listener() {
        let mut ctl = controller();
        ctl.activate(&Position::new(&[0, 0, 1]), 1).unwrap();
        let mut events: Vec<CommandEvent> = Vec::new();
        let id = ctl
            .add_annotation(ruler("ctl_add"), None, &mut events)
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].group, id);
        assert_eq!(events[0].position.as_str(), "slice-1_frame-0");
        assert!(ctl.find_by_id(id).is_some());
    }

    #[test]
    fn groups_at_other_positions_are_hidden() {
        let mut ctl = controller();
        ctl.activate(&Position::new(&[0, 0, 1]), 1).unwrap();
        let elsewhere = NodeId::intern("slice-2_frame-0");
        let id = ctl
            .add_annotation(ruler("ctl_hidden"), Some(elsewhere), &mut ())
            .unwrap();

        let layer = ctl.layer().unwrap();
        let idx = layer.graph.find_attached(id).unwrap();
        assert!(!layer.graph.is_effectively_visible(idx));

        ctl.activate(&Position::new(&[0, 0, 2]), 2).unwrap();
        let layer = ctl.layer().unwrap();
        assert!(layer.graph.is_effectively_visible(idx));
    }

    #[test]
    fn update_recolors_shape_decorations_and_label() {
        let mut ctl = controller();
        ctl.activate(&Position::new(&[0, 0, 0]), 0).unwrap();
        let id = ctl
            .add_annotation(ruler("ctl_update"), None, &mut ())
            .unwrap();
        let yellow = Color::parse("yellow").unwrap();

        let updated = ctl
            .update_annotation(DrawUpdate {
                id,
                color: yellow,
                meta: None,
            })
            .unwrap();
        assert!(updated);

        let layer = ctl.layer().unwrap();
        let group = layer.graph.find_attached(id).unwrap();
        for child in layer.graph.descendants(group) {
            match &layer.graph.graph[child].kind {
                NodeKind::Shape { stroke, .. } => assert_eq!(*stroke, yellow),
                NodeKind::Decoration { paint, .. } => assert_eq!(paint.color(), yellow),
                NodeKind::Tag { fill } => assert_eq!(*fill, yellow),
                NodeKind::Text { fill, shadow, .. } => {
                    assert_eq!(*fill, yellow);
                    assert_eq!(*shadow, Some(Color::BLACK));
                }
                NodeKind::Anchor { .. } | NodeKind::Group => {}
            }
        }
        let graph = &mut ctl.layer_mut().unwrap().graph;
        let before = graph.redraw_count();
        assert!(graph.take_redraw());
        assert!(!graph.take_redraw());
        assert_eq!(graph.redraw_count(), before);
    }

    #[test]
    fn update_of_unknown_id_is_a_no_op() {
        let mut ctl = controller();
        let updated = ctl
            .update_annotation(DrawUpdate {
                id: NodeId::intern("ctl_nobody"),
                color: Color::BLACK,
                meta: None,
            })
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn update_ignores_nodes_that_are_not_annotations() {
        let mut ctl = controller();
        ctl.activate(&Position::new(&[0, 0, 6]), 6).unwrap();
        let id = ctl
            .add_annotation(ruler("ctl_update_role"), None, &mut ())
            .unwrap();
        let red = Color::parse("red").unwrap();

        for target in [id.child(role::SHAPE), NodeId::intern("slice-6_frame-0")] {
            let updated = ctl
                .update_annotation(DrawUpdate {
                    id: target,
                    color: red,
                    meta: None,
                })
                .unwrap();
            assert!(!updated, "{target} should not be updatable");
        }
        assert_eq!(ctl.list_display_details().unwrap()[0].color, "#000000");
    }

    #[test]
    fn duplicate_draft_id_is_rejected() {
        let mut ctl = controller();
        ctl.activate(&Position::new(&[0, 0, 1]), 1).unwrap();
        let id = ctl.add_annotation(ruler("ctl_dup"), None, &mut ()).unwrap();

        let mut events: Vec<CommandEvent> = Vec::new();
        assert!(matches!(
            ctl.add_annotation(
                ruler("ctl_dup"),
                Some(NodeId::intern("slice-2_frame-0")),
                &mut events
            ),
            Err(DrawError::InvalidOperation(_))
        ));
        assert!(events.is_empty());
        assert_eq!(ctl.list_display_details().unwrap().len(), 1);

        // The original stays reachable by id.
        assert!(ctl.delete_by_id(id, &mut ()).unwrap());
        assert!(ctl.list_display_details().unwrap().is_empty());
        assert!(ctl.find_by_id(id).is_none());
    }

    #[test]
    fn adopted_graphs_get_distinct_layer_ids() {
        let a = DrawController::with_graph(SceneGraph::new(), LayerConfig::default());
        let b = DrawController::with_graph(SceneGraph::new(), LayerConfig::default());
        let a_root = a.layer().unwrap().root_id();
        let b_root = b.layer().unwrap().root_id();
        assert_ne!(a_root, b_root);
        assert!(a.find_by_id(a_root).is_some());
    }

    #[test]
    fn commands_from_an_adopted_graph_stay_bound_to_it() {
        let mut source = DrawController::with_graph(SceneGraph::new(), LayerConfig::default());
        let mut other = DrawController::with_graph(SceneGraph::new(), LayerConfig::default());
        source.activate(&Position::new(&[0, 0, 0]), 0).unwrap();

        let mut stack = crate::commands::CommandStack::new(10);
        source
            .add_annotation(ruler("ctl_bound"), None, &mut stack)
            .unwrap();
        assert!(matches!(
            stack.undo(other.layer_mut().unwrap()),
            Err(DrawError::InvalidOperation(_))
        ));
        assert!(stack.undo(source.layer_mut().unwrap()).unwrap().is_some());
    }

    #[test]
    fn released_controller_refuses_work() {
        let mut ctl = controller();
        ctl.reset();
        assert!(ctl.is_released());
        assert!(matches!(
            ctl.activate(&Position::new(&[0, 0, 0]), 0),
            Err(DrawError::Released)
        ));
        assert!(matches!(ctl.list_display_details(), Err(DrawError::Released)));
        assert!(ctl.find_by_id(NodeId::intern("anything")).is_none());
    }

    #[test]
    fn root_cannot_be_deleted() {
        let mut ctl = controller();
        let root_id = ctl.layer().unwrap().root_id();
        assert!(matches!(
            ctl.delete_by_id(root_id, &mut ()),
            Err(DrawError::InvalidOperation(_))
        ));
    }
}
