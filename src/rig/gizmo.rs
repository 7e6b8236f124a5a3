//! Gizmo generation
//!
//! A gizmo is a small group of reference-mode curves (three axes, three
//! rings) that sits on the object's rotate pivot and follows the object.
//! It is purely visual.

use tracing::{debug, info};

use crate::config::GizmoConfig;
use crate::error::RigError;
use crate::scene::{
    Attr, ConstraintKind, NodeId, NodeKind, Pivot, Plug, SceneGraph, Value, Vec3,
    DISPLAY_REFERENCE,
};

const CURVE_SUFFIXES: [&str; 6] = ["axisX", "axisY", "axisZ", "ringX", "ringY", "ringZ"];

/// Nodes making up a gizmo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gizmo {
    pub group: NodeId,
    pub curves: Vec<NodeId>,
    /// Orient and point constraints holding the group on the object
    pub constraints: Vec<NodeId>,
}

/// Scene name of the gizmo group for an object
pub fn gizmo_name(object: &str) -> String {
    format!("gizmoCurve_{}", object)
}

/// Whether `node` is the gizmo group built for `object`
pub fn is_gizmo_of(scene: &dyn SceneGraph, node: NodeId, object: NodeId) -> bool {
    match (scene.name(node), scene.name(object)) {
        (Ok(node), Ok(object)) => node == gizmo_name(object),
        _ => false,
    }
}

/// Build a gizmo on `object`, replacing any previous one
pub fn create_gizmo(
    scene: &mut dyn SceneGraph,
    object: NodeId,
    config: &GizmoConfig,
) -> Result<Gizmo, RigError> {
    let name = scene
        .name(object)
        .map_err(|_| RigError::object_not_found(object.to_string()))?
        .to_string();
    let group_name = gizmo_name(&name);

    if let Some(previous) = scene.find(&group_name) {
        debug!(object = %name, "replacing gizmo");
        scene.delete_node(previous)?;
    }

    let group = scene.create_node(NodeKind::Transform, &group_name)?;
    let mut curves = Vec::with_capacity(CURVE_SUFFIXES.len());
    for suffix in CURVE_SUFFIXES {
        let curve = scene.create_node(NodeKind::Curve, &format!("{}_{}", group_name, suffix))?;
        scene.set(Plug::new(curve, Attr::OverrideEnabled), true.into())?;
        scene.set(
            Plug::new(curve, Attr::OverrideDisplayType),
            Value::Int(DISPLAY_REFERENCE),
        )?;
        scene.set_parent(curve, Some(group))?;
        curves.push(curve);
    }

    scene.set_parent(group, Some(object))?;
    let pivot = scene.world_pivot(object, Pivot::Rotate)?;
    scene.set_world_position(group, pivot)?;
    scene.set(Plug::new(group, Attr::Translate), Vec3::ZERO.into())?;
    scene.set(Plug::new(group, Attr::Rotate), Vec3::ZERO.into())?;
    scene.set(Plug::new(group, Attr::Scale), Vec3::splat(config.scale).into())?;

    let constraints = vec![
        scene.create_constraint(ConstraintKind::Orient, &[object], group, true)?,
        scene.create_constraint(ConstraintKind::Point, &[object], group, true)?,
    ];

    info!(object = %name, "created gizmo");
    Ok(Gizmo {
        group,
        curves,
        constraints,
    })
}
