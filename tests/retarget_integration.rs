//! Integration tests for pivot retargeting through a rig session.

use pretty_assertions::assert_eq;

use pivot_rig::rig::KEYED_ATTRIBUTES;
use pivot_rig::scene::{
    Attr, ConstraintKind, MemoryScene, NodeId, NodeKind, Pivot, Plug, SceneGraph, Vec3,
};
use pivot_rig::{AnchorRole, RigConfig, RigError, RigSession};

const TOLERANCE: f64 = 1e-9;

struct Rig {
    scene: MemoryScene,
    session: RigSession,
    object: NodeId,
    follower: NodeId,
}

/// Object with a point-constrained follower, prepared and selected
fn prepared_rig(config: RigConfig) -> Rig {
    let mut scene = MemoryScene::new();
    let object = scene.create_node(NodeKind::Transform, "object").unwrap();
    scene
        .set(Plug::new(object, Attr::Translate), Vec3::new(3.0, 0.0, 0.0).into())
        .unwrap();
    let follower = scene.create_node(NodeKind::Transform, "follower").unwrap();
    scene
        .set(Plug::new(follower, Attr::Translate), Vec3::new(3.0, 1.0, 0.0).into())
        .unwrap();
    scene
        .create_constraint(ConstraintKind::Point, &[object], follower, true)
        .unwrap();

    let mut session = RigSession::new(config);
    session.prepare(&mut scene, object).unwrap();
    scene.select(&[object]);
    Rig {
        scene,
        session,
        object,
        follower,
    }
}

fn marker(rig: &mut Rig, role: AnchorRole) -> NodeId {
    rig.session
        .get_or_create_markers(&mut rig.scene, rig.object)
        .unwrap()
        .anchors
        .get(role)
}

#[test]
fn test_retarget_keeps_object_and_follower_in_place() {
    let mut rig = prepared_rig(RigConfig::default());
    let pos1 = marker(&mut rig, AnchorRole::PosPivot1);
    rig.scene
        .set(Plug::new(pos1, Attr::Translate), Vec3::new(0.0, 2.0, 0.0).into())
        .unwrap();
    rig.scene.set_current_time(24.0);

    let object_before = rig.scene.world_matrix(rig.object).unwrap();
    let follower_before = rig.scene.world_position(rig.follower).unwrap();

    let report = rig
        .session
        .retarget(&mut rig.scene, rig.object, AnchorRole::PosPivot1)
        .unwrap();

    assert_eq!(report.marker, pos1);
    assert!((report.position - Vec3::new(3.0, 2.0, 0.0)).length() < TOLERANCE);
    let pivot = rig.scene.world_pivot(rig.object, Pivot::Rotate).unwrap();
    assert!((pivot - Vec3::new(3.0, 2.0, 0.0)).length() < TOLERANCE);
    assert!(rig
        .scene
        .world_matrix(rig.object)
        .unwrap()
        .abs_diff_eq(object_before, TOLERANCE));
    assert!((rig.scene.world_position(rig.follower).unwrap() - follower_before).length() < TOLERANCE);
}

#[test]
fn test_all_seven_attributes_keyed_at_current_time() {
    let mut rig = prepared_rig(RigConfig::default());
    rig.scene.set_current_time(7.0);

    let report = rig
        .session
        .retarget(&mut rig.scene, rig.object, AnchorRole::PosPivot2)
        .unwrap();
    assert!(report.keyframes.is_complete());
    assert_eq!(report.keyframes.keyed.len(), 7);

    for attr in KEYED_ATTRIBUTES {
        let plug = Plug::new(rig.object, attr);
        assert_eq!(rig.scene.keyframes(plug).len(), 1, "{} keyed once", attr);
        assert!(rig.scene.keyframe_at(plug, 7.0).is_some());
    }
}

#[test]
fn test_rekeying_same_frame_replaces_keys() {
    let mut rig = prepared_rig(RigConfig::default());
    rig.session
        .retarget(&mut rig.scene, rig.object, AnchorRole::PosPivot1)
        .unwrap();
    rig.session
        .retarget(&mut rig.scene, rig.object, AnchorRole::Origin)
        .unwrap();

    let plug = Plug::new(rig.object, Attr::RotatePivot);
    assert_eq!(rig.scene.keyframes(plug).len(), 1);
}

#[test]
fn test_unselected_object_is_not_touched() {
    let mut rig = prepared_rig(RigConfig::default());
    rig.scene.select(&[]);
    let pos1 = marker(&mut rig, AnchorRole::PosPivot1);
    rig.scene
        .set(Plug::new(pos1, Attr::Translate), Vec3::new(1.0, 0.0, 0.0).into())
        .unwrap();

    let result = rig
        .session
        .retarget(&mut rig.scene, rig.object, AnchorRole::PosPivot1);
    let err = result.unwrap_err();
    assert!(err.is_warning());
    assert!(matches!(err, RigError::PreconditionFailed { .. }));
    assert_eq!(
        rig.scene
            .get_vec3(Plug::new(rig.object, Attr::RotatePivot))
            .unwrap(),
        Vec3::ZERO
    );
    assert!(rig
        .scene
        .keyframes(Plug::new(rig.object, Attr::Translate))
        .is_empty());
}

#[test]
fn test_selection_check_can_be_disabled() {
    let mut rig = prepared_rig(RigConfig::new().with_require_selection(false));
    rig.scene.select(&[]);
    assert!(rig
        .session
        .retarget(&mut rig.scene, rig.object, AnchorRole::PosPivot1)
        .is_ok());
}

#[test]
fn test_locked_pivot_needs_unlock() {
    let mut rig = prepared_rig(RigConfig::default());
    rig.scene
        .set_locked(Plug::new(rig.object, Attr::RotatePivot), true)
        .unwrap();

    let result = rig
        .session
        .retarget(&mut rig.scene, rig.object, AnchorRole::PosPivot1);
    assert!(matches!(result, Err(RigError::PreconditionFailed { .. })));

    rig.session.unlock(&mut rig.scene, rig.object).unwrap();
    assert!(rig
        .session
        .retarget(&mut rig.scene, rig.object, AnchorRole::PosPivot1)
        .is_ok());
}

#[test]
fn test_rotated_and_scaled_object() {
    let mut scene = MemoryScene::new();
    let object = scene.create_node(NodeKind::Transform, "object").unwrap();
    scene
        .set(Plug::new(object, Attr::Rotate), Vec3::new(10.0, 40.0, -25.0).into())
        .unwrap();
    scene
        .set(Plug::new(object, Attr::Scale), Vec3::new(2.0, 0.5, 1.5).into())
        .unwrap();
    let mut session = RigSession::new(RigConfig::new().with_require_selection(false));
    let anchors = session
        .get_or_create_markers(&mut scene, object)
        .unwrap()
        .anchors;
    scene
        .set(
            Plug::new(anchors.pos_pivot2, Attr::Translate),
            Vec3::new(1.0, -1.0, 2.0).into(),
        )
        .unwrap();

    let before = scene.world_matrix(object).unwrap();
    let target = scene.world_position(anchors.pos_pivot2).unwrap();
    session
        .retarget_to_marker(&mut scene, object, anchors.pos_pivot2)
        .unwrap();

    assert!(scene.world_matrix(object).unwrap().abs_diff_eq(before, TOLERANCE));
    for pivot in [Pivot::Rotate, Pivot::Scale] {
        let world = scene.world_pivot(object, pivot).unwrap();
        assert!((world - target).length() < TOLERANCE);
    }
}

#[test]
fn test_unknown_marker() {
    let mut scene = MemoryScene::new();
    let object = scene.create_node(NodeKind::Transform, "object").unwrap();
    let mut session = RigSession::new(RigConfig::default());
    scene.select(&[object]);

    let result = session.retarget(&mut scene, object, AnchorRole::PosPivot1);
    assert!(matches!(result, Err(RigError::NotFound { .. })));
}
