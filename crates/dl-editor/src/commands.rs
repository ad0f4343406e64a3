//! Undo/Redo commands for annotation groups.
//!
//! Every structural edit of the layer is wrapped in a reversible command.
//! A command holds node indices into the layer arena and the identifier of
//! the layer root it was built against; it never owns nodes. Detached
//! groups stay in the arena, so `undo()` then `execute()` replays the same
//! subtree.
//!
//! Instead of callback slots, `execute()` and `undo()` return a
//! `CommandEvent`, and controller operations report to a `CommandListener`.

use crate::config::LayerConfig;
use crate::error::DrawError;
use crate::layer::DrawLayer;
use dl_core::NodeIndex;
use dl_core::id::NodeId;

// ─── Events ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Executed,
    Undone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Create,
    Delete,
}

/// What a command did to the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEvent {
    pub action: CommandAction,
    pub kind: CommandKind,
    /// The annotation group that moved.
    pub group: NodeId,
    /// The position group it moved into or out of.
    pub position: NodeId,
}

/// Receives commands issued by the controller.
pub trait CommandListener {
    /// A command has been executed and can be recorded for undo.
    fn on_command(&mut self, _command: &DrawCommand) {}

    /// A command has been applied.
    fn on_executed(&mut self, _event: &CommandEvent) {}
}

impl CommandListener for () {}

impl CommandListener for Vec<CommandEvent> {
    fn on_executed(&mut self, event: &CommandEvent) {
        self.push(*event);
    }
}

// ─── Create ──────────────────────────────────────────────────────────────

/// Attach an annotation group under its position group.
#[derive(Debug, Clone)]
pub struct CreateAnnotationCommand {
    group: NodeIndex,
    group_id: NodeId,
    shape_kind: String,
    position: NodeId,
    layer_root: NodeId,
}

impl CreateAnnotationCommand {
    /// `group` must be a detached node of `layer`; `position` is the key
    /// of the position group it belongs in.
    pub fn new(
        layer: &DrawLayer,
        group: NodeIndex,
        shape_kind: impl Into<String>,
        position: NodeId,
    ) -> Result<Self, DrawError> {
        let node = layer
            .graph
            .node(group)
            .ok_or_else(|| DrawError::NotFound(format!("node index {}", group.index())))?;
        Ok(Self {
            group,
            group_id: node.id,
            shape_kind: shape_kind.into(),
            position,
            layer_root: layer.root_id(),
        })
    }

    pub fn group_id(&self) -> NodeId {
        self.group_id
    }

    pub fn position(&self) -> NodeId {
        self.position
    }

    pub fn description(&self) -> String {
        format!("Draw {}", self.shape_kind)
    }

    pub fn execute(&self, layer: &mut DrawLayer) -> Result<CommandEvent, DrawError> {
        check_layer(layer, self.layer_root)?;
        if layer.graph.parent(self.group).is_some() {
            return Err(DrawError::InvalidOperation(format!(
                "create {} executed twice",
                self.group_id
            )));
        }
        check_id_free(layer, self.group_id)?;
        let position_group = layer.get_or_create_group(self.position)?;
        layer.graph.reparent_node(self.group, position_group);
        layer.sync_group_visibility(position_group);
        layer.graph.request_redraw();
        log::trace!("attached {} under {}", self.group_id, self.position);
        Ok(self.event(CommandAction::Executed))
    }

    pub fn undo(&self, layer: &mut DrawLayer) -> Result<CommandEvent, DrawError> {
        check_layer(layer, self.layer_root)?;
        if layer.graph.detach(self.group).is_none() {
            return Err(DrawError::InvalidOperation(format!(
                "create {} undone twice",
                self.group_id
            )));
        }
        layer.graph.request_redraw();
        log::trace!("detached {} from {}", self.group_id, self.position);
        Ok(self.event(CommandAction::Undone))
    }

    fn event(&self, action: CommandAction) -> CommandEvent {
        CommandEvent {
            action,
            kind: CommandKind::Create,
            group: self.group_id,
            position: self.position,
        }
    }
}

// ─── Delete ──────────────────────────────────────────────────────────────

/// Detach an annotation group from its position group.
#[derive(Debug, Clone)]
pub struct DeleteAnnotationCommand {
    group: NodeIndex,
    group_id: NodeId,
    /// Used only to label the undo history.
    display_name: String,
    parent: NodeIndex,
    position: NodeId,
    layer_root: NodeId,
}

impl DeleteAnnotationCommand {
    /// `group` must be attached; its current parent is where `undo()`
    /// puts it back.
    pub fn new(
        layer: &DrawLayer,
        group: NodeIndex,
        display_name: impl Into<String>,
    ) -> Result<Self, DrawError> {
        let node = layer
            .graph
            .node(group)
            .ok_or_else(|| DrawError::NotFound(format!("node index {}", group.index())))?;
        let parent = layer.graph.parent(group).ok_or_else(|| {
            DrawError::InvalidOperation(format!("cannot delete detached node {}", node.id))
        })?;
        Ok(Self {
            group,
            group_id: node.id,
            display_name: display_name.into(),
            parent,
            position: layer.graph.graph[parent].id,
            layer_root: layer.root_id(),
        })
    }

    pub fn group_id(&self) -> NodeId {
        self.group_id
    }

    pub fn description(&self) -> String {
        format!("Delete {}", self.display_name)
    }

    pub fn execute(&self, layer: &mut DrawLayer) -> Result<CommandEvent, DrawError> {
        check_layer(layer, self.layer_root)?;
        if layer.graph.parent(self.group) != Some(self.parent) {
            return Err(DrawError::InvalidOperation(format!(
                "delete {} executed twice",
                self.group_id
            )));
        }
        layer.graph.detach(self.group);
        layer.graph.request_redraw();
        log::trace!("deleted {} from {}", self.group_id, self.position);
        Ok(self.event(CommandAction::Executed))
    }

    pub fn undo(&self, layer: &mut DrawLayer) -> Result<CommandEvent, DrawError> {
        check_layer(layer, self.layer_root)?;
        if layer.graph.parent(self.group).is_some() {
            return Err(DrawError::InvalidOperation(format!(
                "delete {} undone twice",
                self.group_id
            )));
        }
        check_id_free(layer, self.group_id)?;
        layer.graph.reparent_node(self.group, self.parent);
        layer.graph.request_redraw();
        log::trace!("restored {} under {}", self.group_id, self.position);
        Ok(self.event(CommandAction::Undone))
    }

    fn event(&self, action: CommandAction) -> CommandEvent {
        CommandEvent {
            action,
            kind: CommandKind::Delete,
            group: self.group_id,
            position: self.position,
        }
    }
}

fn check_layer(layer: &DrawLayer, expected_root: NodeId) -> Result<(), DrawError> {
    if layer.root_id() == expected_root {
        Ok(())
    } else {
        Err(DrawError::InvalidOperation(format!(
            "command built for layer {expected_root} applied to {}",
            layer.root_id()
        )))
    }
}

/// Identifiers are unique within the attached tree.
fn check_id_free(layer: &DrawLayer, id: NodeId) -> Result<(), DrawError> {
    match layer.graph.find_attached(id) {
        Some(_) => Err(DrawError::InvalidOperation(format!(
            "another node with id {id} is already in the layer"
        ))),
        None => Ok(()),
    }
}

// ─── Command ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum DrawCommand {
    Create(CreateAnnotationCommand),
    Delete(DeleteAnnotationCommand),
}

impl DrawCommand {
    pub fn execute(&self, layer: &mut DrawLayer) -> Result<CommandEvent, DrawError> {
        match self {
            DrawCommand::Create(c) => c.execute(layer),
            DrawCommand::Delete(c) => c.execute(layer),
        }
    }

    pub fn undo(&self, layer: &mut DrawLayer) -> Result<CommandEvent, DrawError> {
        match self {
            DrawCommand::Create(c) => c.undo(layer),
            DrawCommand::Delete(c) => c.undo(layer),
        }
    }

    pub fn description(&self) -> String {
        match self {
            DrawCommand::Create(c) => c.description(),
            DrawCommand::Delete(c) => c.description(),
        }
    }

    pub fn group_id(&self) -> NodeId {
        match self {
            DrawCommand::Create(c) => c.group_id(),
            DrawCommand::Delete(c) => c.group_id(),
        }
    }
}

// ─── History ─────────────────────────────────────────────────────────────

/// Bounded undo/redo stacks of executed commands.
pub struct CommandStack {
    undo_stack: Vec<DrawCommand>,
    redo_stack: Vec<DrawCommand>,
    /// Maximum undo depth.
    max_depth: usize,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// History sized by `config.history_depth`.
    pub fn with_config(config: &LayerConfig) -> Self {
        Self::new(config.history_depth)
    }

    /// Record an already executed command.
    pub fn push(&mut self, command: DrawCommand) {
        self.undo_stack.push(command);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }

        // Clear redo stack on new action
        self.redo_stack.clear();
    }

    /// Undo the last command. Returns its description.
    ///
    /// A command that fails to undo stays on the undo stack.
    pub fn undo(&mut self, layer: &mut DrawLayer) -> Result<Option<String>, DrawError> {
        let Some(cmd) = self.undo_stack.pop() else {
            return Ok(None);
        };
        if let Err(e) = cmd.undo(layer) {
            self.undo_stack.push(cmd);
            return Err(e);
        }
        let desc = cmd.description();
        self.redo_stack.push(cmd);
        Ok(Some(desc))
    }

    /// Redo the last undone command by executing it again.
    pub fn redo(&mut self, layer: &mut DrawLayer) -> Result<Option<String>, DrawError> {
        let Some(cmd) = self.redo_stack.pop() else {
            return Ok(None);
        };
        if let Err(e) = cmd.execute(layer) {
            self.redo_stack.push(cmd);
            return Err(e);
        }
        let desc = cmd.description();
        self.undo_stack.push(cmd);
        Ok(Some(desc))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl CommandListener for CommandStack {
    fn on_command(&mut self, command: &DrawCommand) {
        self.push(command.clone());
    }
}
