//! Integration tests: live layer → persisted scene + stored details → load.
//!
//! Verifies that loading a serialized layer reproduces ids, types, colors
//! and label text, with metadata restored from the stored details.

use dl_core::id::NodeId;
use dl_core::model::*;
use dl_core::position::Position;
use dl_editor::layer::find_text;
use dl_editor::{
    AnnotationDraft, CommandEvent, DrawController, DrawError, DrawKind, LayerConfig, StoredDetails,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn label_text(ctl: &DrawController, id: NodeId) -> String {
    let layer = ctl.layer().unwrap();
    let group = layer.graph.find_attached(id).unwrap();
    let text = find_text(&layer.graph, group).unwrap();
    match &layer.graph.graph[text].kind {
        NodeKind::Text { content, .. } => content.clone(),
        other => panic!("expected text, got {other:?}"),
    }
}

fn populated() -> DrawController {
    init_logs();
    let mut ctl = DrawController::new(LayerConfig::default());
    ctl.activate(&Position::new(&[0, 0, 2, 1]), 2).unwrap();

    let length = DrawMeta::new("{length}").with_quantity("length", Quantity::new(21.456, Some("mm")));
    ctl.add_annotation(
        AnnotationDraft::new(Geometry::line(&[0.0, 0.0, 20.0, 5.0]), Color::parse("lime").unwrap())
            .with_id(NodeId::intern("rt_ruler"))
            .with_decoration(DecorationKind::Plain, Geometry::line(&[0.0, -2.0, 0.0, 2.0]))
            .with_decoration(DecorationKind::Plain, Geometry::line(&[20.0, 3.0, 20.0, 7.0]))
            .with_meta(length),
        None,
        &mut (),
    )
    .unwrap();

    let angle = DrawMeta::new("{angle.value}°").with_quantity("angle", Quantity::new(45.0, None));
    ctl.add_annotation(
        AnnotationDraft::new(
            Geometry::line(&[10.0, 0.0, 0.0, 0.0, 10.0, 10.0]),
            Color::parse("orange").unwrap(),
        )
        .with_id(NodeId::intern("rt_protractor"))
        .with_decoration(
            DecorationKind::ArcMarker,
            Geometry::Arc {
                x: 0.0,
                y: 0.0,
                inner_radius: 2.0,
                outer_radius: 2.0,
                angle: 45.0,
                rotation: 0.0,
            },
        )
        .with_meta(angle),
        Some(NodeId::intern("slice-7_frame-1")),
        &mut (),
    )
    .unwrap();

    ctl.add_annotation(
        AnnotationDraft::new(
            Geometry::Ellipse {
                x: 5.0,
                y: 5.0,
                rx: 3.0,
                ry: 2.0,
            },
            Color::parse("cyan").unwrap(),
        )
        .with_id(NodeId::intern("rt_ellipse"))
        .with_meta(DrawMeta::new("")),
        None,
        &mut (),
    )
    .unwrap();

    ctl
}

#[test]
fn load_reproduces_display_details_and_text() {
    let original = populated();
    let serialized = original.serialize_scene().unwrap();
    let stored = original.list_stored_details().unwrap();

    let mut restored = DrawController::new(LayerConfig::default());
    restored.activate(&Position::new(&[0, 0, 2, 1]), 2).unwrap();
    let mut events: Vec<CommandEvent> = Vec::new();
    let loaded = restored.load_scene(&serialized, &stored, &mut events).unwrap();
    assert_eq!(loaded, 3);
    assert_eq!(events.len(), 3);

    let summarize = |ctl: &DrawController| {
        ctl.list_display_details()
            .unwrap()
            .into_iter()
            .map(|d| (d.id, d.kind, d.color, d.position, d.meta))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize(&restored), summarize(&original));

    for id in ["rt_ruler", "rt_protractor", "rt_ellipse"] {
        let id = NodeId::intern(id);
        assert_eq!(label_text(&restored, id), label_text(&original, id));
    }
    assert_eq!(label_text(&restored, NodeId::intern("rt_ruler")), "21.46 mm");
    assert_eq!(label_text(&restored, NodeId::intern("rt_protractor")), "45.00°");
}

#[test]
fn anchors_are_dropped_from_persisted_scene() {
    let original = populated();
    let serialized = original.serialize_scene().unwrap();
    assert!(!serialized.contains("\"anchor\""));
    assert!(!serialized.contains("text_expr"));
}

#[test]
fn loading_without_details_keeps_persisted_text_and_no_meta() {
    let original = populated();
    let serialized = original.serialize_scene().unwrap();

    let mut restored = DrawController::new(LayerConfig::default());
    restored
        .load_scene(&serialized, &HashMap::new(), &mut ())
        .unwrap();
    let details = restored.list_display_details().unwrap();
    assert_eq!(details.len(), 3);
    assert!(details.iter().all(|d| d.meta.is_none()));
    assert_eq!(label_text(&restored, NodeId::intern("rt_ruler")), "21.46 mm");
}

#[test]
fn loading_fixture_classifies_and_places_annotations() {
    init_logs();
    let mut ctl = DrawController::new(LayerConfig::default());
    ctl.activate(&Position::new(&[0, 0, 3]), 3).unwrap();

    let mut stored = HashMap::new();
    stored.insert(
        NodeId::intern("fx_roi"),
        StoredDetails {
            meta: Some(
                DrawMeta::new("{area}").with_quantity("area", Quantity::new(50.0, Some("mm²"))),
            ),
        },
    );
    let input = include_str!("fixtures/two_positions.json");
    assert_eq!(ctl.load_scene(input, &stored, &mut ()).unwrap(), 3);

    let details = ctl.list_display_details().unwrap();
    let rows: Vec<(&str, DrawKind, &str, &str)> = details
        .iter()
        .map(|d| (d.id.as_str(), d.kind, d.color.as_str(), d.position.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("fx_roi", DrawKind::Roi, "#FFFF00", "(0,0,3,0)"),
            ("fx_arrow", DrawKind::Arrow, "#FF0000", "(0,0,3,0)"),
            ("fx_rect", DrawKind::Rectangle, "#0000FF", "(0,0,4,1)"),
        ]
    );
    assert_eq!(label_text(&ctl, NodeId::intern("fx_roi")), "50.00 mm²");

    // Only the active position group is shown.
    let layer = ctl.layer().unwrap();
    let roi = layer.graph.find_attached(NodeId::intern("fx_roi")).unwrap();
    let rect = layer.graph.find_attached(NodeId::intern("fx_rect")).unwrap();
    assert!(layer.graph.is_effectively_visible(roi));
    assert!(!layer.graph.is_effectively_visible(rect));
}

#[test]
fn loading_twice_does_not_duplicate() {
    init_logs();
    let mut ctl = DrawController::new(LayerConfig::default());
    let input = include_str!("fixtures/two_positions.json");
    assert_eq!(ctl.load_scene(input, &HashMap::new(), &mut ()).unwrap(), 3);
    assert_eq!(ctl.load_scene(input, &HashMap::new(), &mut ()).unwrap(), 0);
    assert_eq!(ctl.list_display_details().unwrap().len(), 3);
    assert_eq!(ctl.layer().unwrap().position_groups().len(), 2);
}

#[test]
fn malformed_annotation_aborts_but_keeps_loaded_part() {
    init_logs();
    let mut ctl = DrawController::new(LayerConfig::default());
    let mut events: Vec<CommandEvent> = Vec::new();
    let input = include_str!("fixtures/missing_label.json");

    let err = ctl
        .load_scene(input, &HashMap::new(), &mut events)
        .unwrap_err();
    assert!(matches!(err, DrawError::MalformedScene(_)));

    assert_eq!(events.len(), 1);
    let ids: Vec<NodeId> = ctl
        .list_display_details()
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec![NodeId::intern("fx_ok")]);
    assert!(ctl.find_by_id(NodeId::intern("fx_broken")).is_none());
}

#[test]
fn unparsable_scene_is_a_scene_error() {
    let mut ctl = DrawController::new(LayerConfig::default());
    let err = ctl
        .load_scene("{not json", &HashMap::new(), &mut ())
        .unwrap_err();
    assert!(matches!(err, DrawError::Scene(_)));
}
