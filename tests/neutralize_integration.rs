//! Integration tests for pivot offset neutralization.
//!
//! Each test builds a small scene, neutralizes an object, moves its pivot and
//! checks that constrained objects stay where they were.

use pretty_assertions::assert_eq;

use pivot_rig::rig::{neutralize, reaches, CompensationRegistry, ConstraintOutcome};
use pivot_rig::scene::{
    Attr, ConstraintKind, MemoryScene, NodeId, NodeKind, Pivot, Plug, SceneGraph, Vec3,
};

const TOLERANCE: f64 = 1e-9;

fn assert_close(actual: Vec3, expected: Vec3) {
    assert!(
        (actual - expected).length() < TOLERANCE,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

fn transform(scene: &mut MemoryScene, name: &str, translate: Vec3) -> NodeId {
    let node = scene.create_node(NodeKind::Transform, name).unwrap();
    scene
        .set(Plug::new(node, Attr::Translate), translate.into())
        .unwrap();
    node
}

/// Move both pivots the way an artist would, without keying
fn move_pivot(scene: &mut MemoryScene, object: NodeId, position: Vec3) {
    scene
        .set_world_pivot(object, Pivot::Rotate, position)
        .unwrap();
    scene
        .set_world_pivot(object, Pivot::Scale, position)
        .unwrap();
}

#[test]
fn test_point_constraint_scenario() {
    let mut scene = MemoryScene::new();
    let a = transform(&mut scene, "A", Vec3::ZERO);
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    let constraint = scene
        .create_constraint(ConstraintKind::Point, &[a], follower, false)
        .unwrap();
    let offset = Plug::new(constraint, Attr::Offset);
    scene.set(offset, Vec3::new(1.0, 0.0, 0.0).into()).unwrap();

    let before = scene.world_position(follower).unwrap();
    let mut registry = CompensationRegistry::new();
    neutralize(&mut scene, &mut registry, a).unwrap();
    move_pivot(&mut scene, a, Vec3::new(2.0, 0.0, 0.0));

    assert_close(scene.get_vec3(offset).unwrap(), Vec3::new(-1.0, 0.0, 0.0));
    assert_close(scene.world_position(follower).unwrap(), before);
}

#[test]
fn test_uncompensated_constraint_drifts() {
    let mut scene = MemoryScene::new();
    let a = transform(&mut scene, "A", Vec3::ZERO);
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    scene
        .create_constraint(ConstraintKind::Point, &[a], follower, false)
        .unwrap();

    let before = scene.world_position(follower).unwrap();
    move_pivot(&mut scene, a, Vec3::new(2.0, 0.0, 0.0));
    assert_close(
        scene.world_position(follower).unwrap(),
        before + Vec3::new(2.0, 0.0, 0.0),
    );
}

#[test]
fn test_parent_constraint_uses_object_slot() {
    let mut scene = MemoryScene::new();
    let anchor = transform(&mut scene, "anchor", Vec3::ZERO);
    let object = transform(&mut scene, "object", Vec3::new(4.0, 0.0, 0.0));
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    let constraint = scene
        .create_constraint(ConstraintKind::Parent, &[anchor, object], follower, false)
        .unwrap();

    let before = scene.world_position(follower).unwrap();
    assert_close(before, Vec3::new(2.0, 0.0, 0.0));

    let mut registry = CompensationRegistry::new();
    let report = neutralize(&mut scene, &mut registry, object).unwrap();
    assert_eq!(report.constraints[0].0.offset_attr(), Attr::TargetOffset(1));
    assert!(scene
        .source_of(Plug::new(constraint, Attr::TargetOffset(0)))
        .is_none());

    move_pivot(&mut scene, object, Vec3::new(5.0, 1.0, 0.0));
    assert_close(scene.world_position(follower).unwrap(), before);
}

#[test]
fn test_one_reverse_node_and_one_sum_per_constraint() {
    let mut scene = MemoryScene::new();
    let object = transform(&mut scene, "object", Vec3::ZERO);
    let other = transform(&mut scene, "other", Vec3::ZERO);
    let f1 = transform(&mut scene, "f1", Vec3::ZERO);
    let f2 = transform(&mut scene, "f2", Vec3::ZERO);
    let f3 = transform(&mut scene, "f3", Vec3::ZERO);
    scene
        .create_constraint(ConstraintKind::Point, &[object], f1, false)
        .unwrap();
    scene
        .create_constraint(ConstraintKind::Parent, &[object, other], f2, false)
        .unwrap();
    scene
        .create_constraint(ConstraintKind::Parent, &[object], f3, false)
        .unwrap();

    let mut registry = CompensationRegistry::new();
    let first = neutralize(&mut scene, &mut registry, object).unwrap();
    assert!(first.reverse_created);
    assert_eq!(first.compensated(), 3);

    for _ in 0..3 {
        let again = neutralize(&mut scene, &mut registry, object).unwrap();
        assert!(!again.reverse_created);
        assert_eq!(again.reverse_node, first.reverse_node);
        assert!(again
            .constraints
            .iter()
            .all(|(_, outcome)| matches!(outcome, ConstraintOutcome::AlreadyCompensated { .. })));
    }

    assert_eq!(scene.nodes_of_kind(NodeKind::Multiply).len(), 1);
    assert_eq!(scene.nodes_of_kind(NodeKind::Sum).len(), 3);

    let followers = [f1, f2, f3];
    let before: Vec<Vec3> = followers
        .iter()
        .map(|&f| scene.world_position(f).unwrap())
        .collect();
    move_pivot(&mut scene, object, Vec3::new(0.5, -3.0, 2.0));
    for (&follower, expected) in followers.iter().zip(before) {
        assert_close(scene.world_position(follower).unwrap(), expected);
    }
}

#[test]
fn test_multi_target_point_constraint_is_left_alone() {
    let mut scene = MemoryScene::new();
    let a = transform(&mut scene, "a", Vec3::ZERO);
    let b = transform(&mut scene, "b", Vec3::new(4.0, 0.0, 0.0));
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    let constraint = scene
        .create_constraint(ConstraintKind::Point, &[a, b], follower, false)
        .unwrap();

    let mut registry = CompensationRegistry::new();
    let report = neutralize(&mut scene, &mut registry, a).unwrap();
    assert_eq!(report.compensated(), 0);
    assert_eq!(report.skipped(), 1);
    assert!(scene
        .source_of(Plug::new(constraint, Attr::Offset))
        .is_none());

    // Uncompensated, the follower moves by the shift of the mean pivot.
    let before = scene.world_position(follower).unwrap();
    assert_close(before, Vec3::new(2.0, 0.0, 0.0));
    move_pivot(&mut scene, a, Vec3::new(2.0, 0.0, 0.0));
    assert_close(scene.world_position(follower).unwrap(), Vec3::new(3.0, 0.0, 0.0));
}

#[test]
fn test_scaled_target_drifts_by_scale_difference() {
    let mut scene = MemoryScene::new();
    let object = transform(&mut scene, "object", Vec3::ZERO);
    scene
        .set(Plug::new(object, Attr::Scale), Vec3::splat(2.0).into())
        .unwrap();
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    scene
        .create_constraint(ConstraintKind::Point, &[object], follower, false)
        .unwrap();

    let mut registry = CompensationRegistry::new();
    neutralize(&mut scene, &mut registry, object).unwrap();
    move_pivot(&mut scene, object, Vec3::new(2.0, 0.0, 0.0));

    // The world pivot moved by 2, the object-space scale pivot by 1.
    assert_close(
        scene.get_vec3(Plug::new(object, Attr::ScalePivot)).unwrap(),
        Vec3::new(1.0, 0.0, 0.0),
    );
    assert_close(scene.world_position(follower).unwrap(), Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_lost_registry_does_not_duplicate_nodes() {
    let mut scene = MemoryScene::new();
    let object = transform(&mut scene, "object", Vec3::ZERO);
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    scene
        .create_constraint(ConstraintKind::Point, &[object], follower, true)
        .unwrap();

    neutralize(&mut scene, &mut CompensationRegistry::new(), object).unwrap();
    let count = scene.len();

    let report = neutralize(&mut scene, &mut CompensationRegistry::new(), object).unwrap();
    assert!(!report.reverse_created);
    assert_eq!(scene.len(), count);
}

#[test]
fn test_renamed_object_keeps_its_reverse_node() {
    let mut scene = MemoryScene::new();
    let object = transform(&mut scene, "object", Vec3::ZERO);
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    scene
        .create_constraint(ConstraintKind::Point, &[object], follower, false)
        .unwrap();
    let mut registry = CompensationRegistry::new();
    let first = neutralize(&mut scene, &mut registry, object).unwrap();

    // A decoy with the conventional name must not be mistaken for it.
    scene
        .create_node(NodeKind::Multiply, "object_multReversePivot")
        .unwrap();
    let second = neutralize(&mut scene, &mut registry, object).unwrap();
    assert_eq!(second.reverse_node, first.reverse_node);
}

#[test]
fn test_shared_constraint_gets_one_sum_per_object() {
    let mut scene = MemoryScene::new();
    let a = transform(&mut scene, "a", Vec3::new(-2.0, 0.0, 0.0));
    let b = transform(&mut scene, "b", Vec3::new(2.0, 0.0, 0.0));
    let follower = transform(&mut scene, "follower", Vec3::ZERO);
    let constraint = scene
        .create_constraint(ConstraintKind::Parent, &[a, b], follower, false)
        .unwrap();

    let mut registry = CompensationRegistry::new();
    neutralize(&mut scene, &mut registry, a).unwrap();
    neutralize(&mut scene, &mut registry, b).unwrap();

    assert_eq!(registry.reverse_count(), 2);
    assert_eq!(registry.offset_sum_count(), 2);
    assert_ne!(
        registry.offset_sum(&scene, a, constraint),
        registry.offset_sum(&scene, b, constraint)
    );

    let before = scene.world_position(follower).unwrap();
    move_pivot(&mut scene, a, Vec3::new(-1.0, 3.0, 0.0));
    move_pivot(&mut scene, b, Vec3::new(0.0, 0.0, 7.0));
    assert_close(scene.world_position(follower).unwrap(), before);
}

#[test]
fn test_compensation_graph_is_acyclic() {
    let mut scene = MemoryScene::new();
    let object = transform(&mut scene, "object", Vec3::ZERO);
    let f1 = transform(&mut scene, "f1", Vec3::ZERO);
    let f2 = transform(&mut scene, "f2", Vec3::ZERO);
    scene
        .create_constraint(ConstraintKind::Point, &[object], f1, false)
        .unwrap();
    scene
        .create_constraint(ConstraintKind::Parent, &[object], f2, false)
        .unwrap();

    let mut registry = CompensationRegistry::new();
    let report = neutralize(&mut scene, &mut registry, object).unwrap();
    let reverse = report.reverse_node.unwrap();

    assert_eq!(
        scene.source_of(Plug::new(reverse, Attr::Input1)),
        Some(Plug::new(object, Attr::ScalePivot))
    );
    for (constraint, sum) in registry.offset_sums_for(object) {
        assert!(!reaches(&scene, sum, reverse));
        assert!(!reaches(&scene, constraint, reverse));
        assert!(reaches(&scene, reverse, constraint));
    }
}

#[test]
fn test_offset_captured_before_rewiring() {
    let mut scene = MemoryScene::new();
    let object = transform(&mut scene, "object", Vec3::ZERO);
    let follower = transform(&mut scene, "follower", Vec3::new(0.0, 3.0, 0.0));
    let constraint = scene
        .create_constraint(ConstraintKind::Point, &[object], follower, true)
        .unwrap();

    let mut registry = CompensationRegistry::new();
    let report = neutralize(&mut scene, &mut registry, object).unwrap();
    match &report.constraints[0].1 {
        ConstraintOutcome::Compensated { offset_sum, static_offset } => {
            assert_eq!(*static_offset, Vec3::new(0.0, 3.0, 0.0));
            assert_eq!(
                scene.get_vec3(Plug::new(*offset_sum, Attr::Input2)).unwrap(),
                Vec3::new(0.0, 3.0, 0.0)
            );
        }
        other => panic!("expected compensation, got {:?}", other),
    }
    assert_eq!(
        scene.get_vec3(Plug::new(constraint, Attr::Offset)).unwrap(),
        Vec3::new(0.0, 3.0, 0.0)
    );
}
