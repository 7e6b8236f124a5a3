//! Integration tests for the prepare pipeline.

use glam::DMat4;
use pretty_assertions::assert_eq;

use pivot_rig::rig::gizmo_name;
use pivot_rig::scene::{
    Attr, AttrState, ConstraintKind, MemoryScene, NodeId, NodeKind, Pivot, Plug, SceneError,
    SceneGraph, Value, Vec3,
};
use pivot_rig::{RigConfig, RigSession};

const TOLERANCE: f64 = 1e-9;

fn target_with_follower() -> (MemoryScene, NodeId, NodeId) {
    let mut scene = MemoryScene::new();
    let target = scene.create_node(NodeKind::Transform, "target").unwrap();
    scene
        .set(Plug::new(target, Attr::Translate), Vec3::new(2.0, 0.0, 0.0).into())
        .unwrap();
    let follower = scene.create_node(NodeKind::Transform, "follower").unwrap();
    scene
        .create_constraint(ConstraintKind::Point, &[target], follower, true)
        .unwrap();
    (scene, target, follower)
}

/// Offset-sum nodes whose output drives nothing
fn orphaned_sums(scene: &MemoryScene) -> usize {
    scene
        .nodes_of_kind(NodeKind::Sum)
        .into_iter()
        .filter(|&sum| scene.destinations_of(Plug::new(sum, Attr::Output)).is_empty())
        .count()
}

#[test]
fn test_repeated_prepare_keeps_node_count() {
    let (mut scene, target, follower) = target_with_follower();
    let mut session = RigSession::new(RigConfig::default());

    session.prepare(&mut scene, target).unwrap();
    let count = scene.len();
    for _ in 0..3 {
        let report = session.prepare(&mut scene, target).unwrap();
        let neutralize = report.neutralize.unwrap();
        assert_eq!(neutralize.constraints.len(), 1);
        assert_eq!(neutralize.compensated(), 0);
        assert!(report.gizmo.is_some());
    }

    assert_eq!(scene.len(), count);
    assert_eq!(scene.nodes_of_kind(NodeKind::Sum).len(), 1);
    assert_eq!(orphaned_sums(&scene), 0);
    assert_eq!(session.compensation().offset_sum_count(), 1);

    let before = scene.world_position(follower).unwrap();
    for pivot in [Pivot::Rotate, Pivot::Scale] {
        scene
            .set_world_pivot(target, pivot, Vec3::new(2.0, 3.0, 0.0))
            .unwrap();
    }
    assert!((scene.world_position(follower).unwrap() - before).length() < TOLERANCE);
}

#[test]
fn test_gizmo_is_not_compensated() {
    let (mut scene, target, _) = target_with_follower();
    let mut session = RigSession::new(RigConfig::default());
    let gizmo = session.prepare(&mut scene, target).unwrap().gizmo.unwrap();

    let report = session.neutralize(&mut scene, target).unwrap();
    assert!(report
        .constraints
        .iter()
        .all(|(slot, _)| !gizmo.constraints.contains(&slot.constraint)));
}

/// Scene that refuses to constrain gizmo groups
struct NoGizmoConstraints {
    inner: MemoryScene,
}

impl SceneGraph for NoGizmoConstraints {
    fn exists(&self, node: NodeId) -> bool {
        self.inner.exists(node)
    }

    fn name(&self, node: NodeId) -> Result<&str, SceneError> {
        self.inner.name(node)
    }

    fn find(&self, name: &str) -> Option<NodeId> {
        self.inner.find(name)
    }

    fn kind(&self, node: NodeId) -> Result<NodeKind, SceneError> {
        self.inner.kind(node)
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.inner.nodes()
    }

    fn constraint_targets(&self, constraint: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.inner.constraint_targets(constraint)
    }

    fn constrained_node(&self, constraint: NodeId) -> Result<NodeId, SceneError> {
        self.inner.constrained_node(constraint)
    }

    fn attr_state(&self, plug: Plug) -> AttrState {
        self.inner.attr_state(plug)
    }

    fn get(&self, plug: Plug) -> Result<Value, SceneError> {
        self.inner.get(plug)
    }

    fn set(&mut self, plug: Plug, value: Value) -> Result<(), SceneError> {
        self.inner.set(plug, value)
    }

    fn set_locked(&mut self, plug: Plug, locked: bool) -> Result<(), SceneError> {
        self.inner.set_locked(plug, locked)
    }

    fn connect(&mut self, source: Plug, destination: Plug) -> Result<Option<Plug>, SceneError> {
        self.inner.connect(source, destination)
    }

    fn source_of(&self, destination: Plug) -> Option<Plug> {
        self.inner.source_of(destination)
    }

    fn destinations_of(&self, source: Plug) -> Vec<Plug> {
        self.inner.destinations_of(source)
    }

    fn create_node(&mut self, kind: NodeKind, name: &str) -> Result<NodeId, SceneError> {
        self.inner.create_node(kind, name)
    }

    fn delete_node(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.inner.delete_node(node)
    }

    fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        self.inner.set_parent(child, parent)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.parent(node)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.children(node)
    }

    fn world_matrix(&self, node: NodeId) -> Result<DMat4, SceneError> {
        self.inner.world_matrix(node)
    }

    fn set_world_position(&mut self, node: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.inner.set_world_position(node, position)
    }

    fn set_world_matrix(&mut self, node: NodeId, matrix: DMat4) -> Result<(), SceneError> {
        self.inner.set_world_matrix(node, matrix)
    }

    fn world_pivot(&self, node: NodeId, pivot: Pivot) -> Result<Vec3, SceneError> {
        self.inner.world_pivot(node, pivot)
    }

    fn set_world_pivot(
        &mut self,
        node: NodeId,
        pivot: Pivot,
        position: Vec3,
    ) -> Result<(), SceneError> {
        self.inner.set_world_pivot(node, pivot, position)
    }

    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        targets: &[NodeId],
        constrained: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError> {
        let name = self.inner.name(constrained)?.to_string();
        if name.starts_with("gizmoCurve_") {
            return Err(SceneError::UnsupportedKind(NodeKind::Constraint(kind)));
        }
        self.inner
            .create_constraint(kind, targets, constrained, maintain_offset)
    }

    fn current_time(&self) -> f64 {
        self.inner.current_time()
    }

    fn set_current_time(&mut self, time: f64) {
        self.inner.set_current_time(time)
    }

    fn set_keyframe(&mut self, plug: Plug, time: f64) -> Result<(), SceneError> {
        self.inner.set_keyframe(plug, time)
    }

    fn keyframe_at(&self, plug: Plug, time: f64) -> Option<Value> {
        self.inner.keyframe_at(plug, time)
    }

    fn selection(&self) -> Vec<NodeId> {
        self.inner.selection()
    }

    fn dependents(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.dependents(node)
    }
}

#[test]
fn test_gizmo_failure_does_not_block_prepare() {
    let (inner, target, _) = target_with_follower();
    let mut scene = NoGizmoConstraints { inner };
    let mut session = RigSession::new(RigConfig::default());

    let report = session.prepare(&mut scene, target).unwrap();
    assert!(report.gizmo.is_none());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("gizmo:"));

    assert_eq!(report.markers.created, 3);
    assert_eq!(report.neutralize.unwrap().compensated(), 1);
    assert!(scene.find("PosPivot1_target").is_some());
    assert!(scene.find(&gizmo_name("target")).is_some());
}
