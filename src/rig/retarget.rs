//! Pivot retargeting and keyframing
//!
//! Moves both pivots of an object onto one of its anchor markers without
//! moving the object, then keys the pivot and transform channels at the
//! current time so the change is part of the animation.

use tracing::{debug, info, warn};

use crate::error::RigError;
use crate::scene::{display_name, Attr, AttrState, NodeId, Pivot, Plug, SceneGraph, Vec3};

use super::anchors::{AnchorCache, AnchorRole};

/// Attributes keyed after a retarget
pub const KEYED_ATTRIBUTES: [Attr; 7] = [
    Attr::RotatePivot,
    Attr::ScalePivot,
    Attr::RotatePivotTranslate,
    Attr::ScalePivotTranslate,
    Attr::Translate,
    Attr::Rotate,
    Attr::Scale,
];

/// Per-attribute result of a keyframe batch
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeReport {
    pub time: f64,
    pub keyed: Vec<Attr>,
    pub failed: Vec<(Attr, String)>,
}

impl KeyframeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn an incomplete batch into [`RigError::PartialWrite`]
    pub fn check(&self, object: &str) -> Result<(), RigError> {
        if self.is_complete() {
            return Ok(());
        }
        Err(RigError::PartialWrite {
            object: object.to_string(),
            succeeded: self.keyed.len(),
            attempted: self.keyed.len() + self.failed.len(),
            failures: self.failed.clone(),
        })
    }
}

/// Result of a retarget
#[derive(Debug, Clone, PartialEq)]
pub struct RetargetReport {
    pub object: NodeId,
    pub marker: NodeId,
    /// World position both pivots were moved to
    pub position: Vec3,
    pub keyframes: KeyframeReport,
}

/// Key every attribute of `attrs` on `object` at `time`, collecting failures
pub fn key_attributes(
    scene: &mut dyn SceneGraph,
    object: NodeId,
    attrs: &[Attr],
    time: f64,
) -> KeyframeReport {
    let mut report = KeyframeReport {
        time,
        keyed: Vec::with_capacity(attrs.len()),
        failed: Vec::new(),
    };
    for &attr in attrs {
        match scene.set_keyframe(Plug::new(object, attr), time) {
            Ok(()) => report.keyed.push(attr),
            Err(err) => {
                warn!(object = %display_name(scene, object), %attr, error = %err, "keyframe failed");
                report.failed.push((attr, err.to_string()));
            }
        }
    }
    report
}

/// Move the pivots of `object` onto `marker` and key the result.
///
/// `marker` must be one of the object's anchors. When `require_selection` is
/// set the object must be selected. Locked or missing pivot attributes are
/// refused before anything is written. Keyframe failures do not undo the
/// pivot move; they are listed in the report and [`KeyframeReport::check`]
/// turns them into a `PartialWrite`.
pub fn retarget_pivot(
    scene: &mut dyn SceneGraph,
    anchors: &mut AnchorCache,
    object: NodeId,
    marker: NodeId,
    require_selection: bool,
) -> Result<RetargetReport, RigError> {
    let name = scene
        .name(object)
        .map_err(|_| RigError::object_not_found(object.to_string()))?
        .to_string();
    let set = anchors
        .lookup(scene, object)
        .ok_or_else(|| RigError::marker_not_found(format!("anchors of {}", name)))?;
    if !scene.exists(marker) || set.role_of(marker).is_none() {
        return Err(RigError::marker_not_found(display_name(scene, marker)));
    }

    if require_selection && !scene.selection().contains(&object) {
        warn!(object = %name, "retarget refused: object is not selected");
        return Err(RigError::precondition(&name, "object is not selected"));
    }
    for attr in Attr::PIVOTS {
        match scene.attr_state(Plug::new(object, attr)) {
            AttrState::Writable => {}
            AttrState::Locked => {
                warn!(object = %name, %attr, "retarget refused: pivot attribute locked");
                return Err(RigError::precondition(&name, format!("'{}' is locked", attr)));
            }
            AttrState::Absent => {
                return Err(RigError::precondition(&name, format!("'{}' is missing", attr)));
            }
        }
    }

    let position = scene.world_position(marker)?;
    scene.set_world_pivot(object, Pivot::Rotate, position)?;
    scene.set_world_pivot(object, Pivot::Scale, position)?;
    debug!(object = %name, ?position, "moved pivots");

    let time = scene.current_time();
    let keyframes = key_attributes(scene, object, &KEYED_ATTRIBUTES, time);
    info!(
        object = %name,
        marker = %display_name(scene, marker),
        time,
        keyed = keyframes.keyed.len(),
        "retargeted pivot"
    );
    Ok(RetargetReport {
        object,
        marker,
        position,
        keyframes,
    })
}

/// Retarget onto the marker playing `role` for `object`
pub fn retarget_to_role(
    scene: &mut dyn SceneGraph,
    anchors: &mut AnchorCache,
    object: NodeId,
    role: AnchorRole,
    require_selection: bool,
) -> Result<RetargetReport, RigError> {
    let name = display_name(scene, object);
    let marker = anchors
        .lookup(scene, object)
        .map(|set| set.get(role))
        .ok_or_else(|| RigError::marker_not_found(role.marker_name(&name)))?;
    retarget_pivot(scene, anchors, object, marker, require_selection)
}
