//! Constraint discovery
//!
//! Finds the parent and point constraints that read from an object. These
//! are the constraints whose result drifts when the object's pivot moves.
//! The constraints holding the object's own gizmo are not reported: the gizmo
//! is rebuilt on every prepare and must not collect compensation nodes.

use tracing::debug;

use crate::error::RigError;
use crate::scene::{display_name, Attr, ConstraintKind, NodeId, NodeKind, Plug, SceneGraph};

use super::gizmo::is_gizmo_of;

/// A constraint targeting an object, with the slot the object occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintSlot {
    pub constraint: NodeId,
    pub kind: ConstraintKind,
    /// Position of the object in the constraint's target list
    pub target_index: usize,
}

impl ConstraintSlot {
    /// Offset attribute compensated for this slot
    pub fn offset_attr(&self) -> Attr {
        // Discovery only yields kinds that carry a translation offset.
        self.kind
            .offset_attr(self.target_index)
            .unwrap_or(Attr::Offset)
    }

    pub fn offset_plug(&self) -> Plug {
        Plug::new(self.constraint, self.offset_attr())
    }
}

/// Constraint kinds whose offsets are affected by a pivot move
const QUALIFYING: [ConstraintKind; 2] = [ConstraintKind::Parent, ConstraintKind::Point];

/// Find every parent or point constraint whose targets include `object`.
///
/// Parent constraints come first, then point constraints, each group in
/// scene order. Constraints driving the object's gizmo are left out.
/// Read-only.
pub fn find_constraints(
    scene: &dyn SceneGraph,
    object: NodeId,
) -> Result<Vec<ConstraintSlot>, RigError> {
    if !scene.exists(object) {
        return Err(RigError::object_not_found(object.to_string()));
    }

    let mut found = Vec::new();
    for kind in QUALIFYING {
        for constraint in scene.nodes_of_kind(NodeKind::Constraint(kind)) {
            let targets = scene.constraint_targets(constraint)?;
            let Some(target_index) = targets.iter().position(|&t| t == object) else {
                continue;
            };
            if is_gizmo_of(scene, scene.constrained_node(constraint)?, object) {
                debug!(
                    constraint = %display_name(scene, constraint),
                    "ignoring gizmo constraint"
                );
                continue;
            }
            debug!(
                object = %display_name(scene, object),
                constraint = %display_name(scene, constraint),
                target_index,
                "found constraint"
            );
            found.push(ConstraintSlot {
                constraint,
                kind,
                target_index,
            });
        }
    }
    Ok(found)
}
