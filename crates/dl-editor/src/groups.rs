//! Position groups: one container per viewed position.
//!
//! A position group's identifier is a key derived from the scroll value and
//! every dimension from index 3 upward:
//!
//! ```text
//! slice-<scroll>_frame-<dim3 or 0>[_dim4-<v4>[_dim5-<v5>...]]
//! ```
//!
//! Only the group whose key matches the active key is visible.

use crate::error::DrawError;
use crate::predicates::{has_identifier, is_position_group};
use dl_core::NodeIndex;
use dl_core::id::NodeId;
use dl_core::model::{SceneGraph, SceneNode, role};
use dl_core::position::Position;
use std::fmt;
use winnow::ascii::{dec_int, dec_uint};
use winnow::combinator::{preceded, repeat};
use winnow::prelude::*;

/// First dimension carried in the key after the scroll value.
const FIRST_EXTRA_DIM: usize = 3;

// ─── Keys ────────────────────────────────────────────────────────────────

/// Decoded position group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub scroll: i64,
    /// Values of dimensions 3, 4, ...; never empty (dimension 3 is the frame).
    pub extra: Vec<i64>,
}

impl GroupKey {
    pub fn from_position(position: &Position, scroll_value: i64) -> Self {
        let extra = match position.values().get(FIRST_EXTRA_DIM..) {
            Some(rest) if !rest.is_empty() => rest.to_vec(),
            _ => vec![0],
        };
        Self {
            scroll: scroll_value,
            extra,
        }
    }

    pub fn to_id(&self) -> NodeId {
        NodeId::intern(&self.to_string())
    }

    /// Rebuild a position: zeros everywhere except the scroll dimension and
    /// the extra dimensions.
    pub fn to_position(&self, scroll_index: usize) -> Position {
        let mut position = Position::zeros(FIRST_EXTRA_DIM);
        for (offset, value) in self.extra.iter().enumerate() {
            position.set(FIRST_EXTRA_DIM + offset, *value);
        }
        position.set(scroll_index, self.scroll);
        position
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.extra.first().copied().unwrap_or(0);
        write!(f, "slice-{}_frame-{frame}", self.scroll)?;
        for (offset, value) in self.extra.iter().enumerate().skip(1) {
            write!(f, "_dim{}-{value}", FIRST_EXTRA_DIM + offset)?;
        }
        Ok(())
    }
}

/// Key of the position group shown for `position`.
pub fn resolve_active_group_key(position: &Position, scroll_value: i64) -> NodeId {
    GroupKey::from_position(position, scroll_value).to_id()
}

/// Invert [`resolve_active_group_key`].
pub fn parse_group_key(key: &str) -> Result<GroupKey, DrawError> {
    let (scroll, frame, dims) = parse_key
        .parse(key)
        .map_err(|_| DrawError::InvalidKey(key.to_owned()))?;

    let mut extra = vec![frame];
    for (dim, value) in dims {
        if dim as usize != FIRST_EXTRA_DIM + extra.len() {
            return Err(DrawError::InvalidKey(key.to_owned()));
        }
        extra.push(value);
    }
    Ok(GroupKey { scroll, extra })
}

fn parse_key(input: &mut &str) -> ModalResult<(i64, i64, Vec<(u32, i64)>)> {
    let scroll: i64 = preceded("slice-", dec_int).parse_next(input)?;
    let frame: i64 = preceded("_frame-", dec_int).parse_next(input)?;
    let dims: Vec<(u32, i64)> =
        repeat(0.., preceded("_dim", (dec_uint, preceded('-', dec_int)))).parse_next(input)?;
    Ok((scroll, frame, dims))
}

// ─── Group lookup ────────────────────────────────────────────────────────

/// Position groups directly under the root.
pub fn position_groups(graph: &SceneGraph) -> Vec<NodeIndex> {
    graph.children_where(graph.root, is_position_group)
}

/// Return the position group for `key`, creating it (visible) if absent.
///
/// Duplicate groups for one key are an invariant violation. They are
/// logged and the first match is returned, unless `strict` is set.
pub fn get_or_create_group(
    graph: &mut SceneGraph,
    key: NodeId,
    strict: bool,
) -> Result<NodeIndex, DrawError> {
    let same_key = has_identifier(key);
    let matches = graph.children_where(graph.root, |n| is_position_group(n) && same_key(n));

    match matches.as_slice() {
        [] => {
            let mut group = SceneNode::group(key, role::POSITION_GROUP);
            group.visible = Some(true);
            let idx = graph.add_node(graph.root, group);
            log::debug!("created position group {key}");
            Ok(idx)
        }
        [single] => Ok(*single),
        [first, ..] => {
            let message = format!("{} position groups share key {key}", matches.len());
            if strict {
                return Err(DrawError::InconsistentState(message));
            }
            log::warn!("{message}; using the first one");
            Ok(*first)
        }
    }
}

/// Show the group whose identifier is `key` and hide every other one.
pub fn set_active_group(graph: &mut SceneGraph, key: NodeId) {
    for idx in position_groups(graph) {
        let node = &mut graph.graph[idx];
        node.visible = Some(node.id == key);
    }
    graph.request_redraw();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_for_three_dimensional_position() {
        let key = resolve_active_group_key(&Position::new(&[0, 0, 3]), 3);
        assert_eq!(key.as_str(), "slice-3_frame-0");
    }

    #[test]
    fn key_carries_every_extra_dimension() {
        let key = resolve_active_group_key(&Position::new(&[1, 2, 3, 4, 5, 6]), 3);
        assert_eq!(key.as_str(), "slice-3_frame-4_dim4-5_dim5-6");
    }

    #[test]
    fn distinct_positions_give_distinct_keys() {
        let positions = [
            (vec![0, 0, 1], 1),
            (vec![0, 0, 2], 2),
            (vec![0, 0, 1, 1], 1),
            (vec![0, 0, 1, 0, 1], 1),
            (vec![0, 0, 1, 1, 0], 1),
            (vec![0, 0, -1, 0], -1),
        ];
        let keys: std::collections::HashSet<NodeId> = positions
            .iter()
            .map(|(p, s)| resolve_active_group_key(&Position::new(p), *s))
            .collect();
        assert_eq!(keys.len(), positions.len());
    }

    #[test]
    fn key_roundtrip_through_parse() {
        let position = Position::new(&[0, 0, 7, 2, 9]);
        let key = resolve_active_group_key(&position, 7);
        let decoded = parse_group_key(key.as_str()).unwrap();
        assert_eq!(decoded.scroll, 7);
        assert_eq!(decoded.extra, vec![2, 9]);
        assert_eq!(decoded.to_position(2), position);

        let negative = parse_group_key("slice--2_frame-0").unwrap();
        assert_eq!(negative.scroll, -2);
    }

    #[test]
    fn invalid_keys_are_rejected() {
        assert!(parse_group_key("frame-1").is_err());
        assert!(parse_group_key("slice-1_frame-0_dim5-1").is_err());
        assert!(parse_group_key("slice-1_frame-0 trailing").is_err());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut graph = SceneGraph::new();
        let key = NodeId::intern("slice-0_frame-0");
        let a = get_or_create_group(&mut graph, key, false).unwrap();
        let b = get_or_create_group(&mut graph, key, false).unwrap();
        assert_eq!(a, b);
        assert_eq!(position_groups(&graph).len(), 1);
        assert_eq!(graph.graph[a].visible, Some(true));
    }

    #[test]
    fn duplicate_groups_fall_back_or_fail() {
        let mut graph = SceneGraph::new();
        let key = NodeId::intern("slice-9_frame-0");
        let root = graph.root;
        let first = graph.add_node(root, SceneNode::group(key, role::POSITION_GROUP));
        graph.add_node(root, SceneNode::group(key, role::POSITION_GROUP));

        assert_eq!(get_or_create_group(&mut graph, key, false).unwrap(), first);
        assert!(matches!(
            get_or_create_group(&mut graph, key, true),
            Err(DrawError::InconsistentState(_))
        ));
    }

    #[test]
    fn set_active_group_shows_exactly_one() {
        let mut graph = SceneGraph::new();
        let keys: Vec<NodeId> = (0..3)
            .map(|i| NodeId::intern(&format!("slice-{i}_frame-0")))
            .collect();
        for key in &keys {
            get_or_create_group(&mut graph, *key, false).unwrap();
        }

        set_active_group(&mut graph, keys[1]);
        let visible: Vec<NodeId> = position_groups(&graph)
            .into_iter()
            .filter(|&idx| graph.is_effectively_visible(idx))
            .map(|idx| graph.graph[idx].id)
            .collect();
        assert_eq!(visible, vec![keys[1]]);
        assert!(graph.take_redraw());

        set_active_group(&mut graph, NodeId::intern("slice-99_frame-0"));
        assert!(
            position_groups(&graph)
                .into_iter()
                .all(|idx| !graph.is_effectively_visible(idx))
        );
    }
}
