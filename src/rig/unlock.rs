//! Pivot attribute unlocking

use tracing::{debug, info};

use crate::error::RigError;
use crate::scene::{Attr, AttrState, NodeId, Plug, SceneGraph};

/// What unlocking found on each pivot attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    pub unlocked: Vec<Attr>,
    pub already_unlocked: Vec<Attr>,
    pub absent: Vec<Attr>,
}

/// Unlock every locked pivot attribute of `object`
pub fn unlock_pivot_attributes(
    scene: &mut dyn SceneGraph,
    object: NodeId,
) -> Result<UnlockReport, RigError> {
    let name = scene
        .name(object)
        .map_err(|_| RigError::object_not_found(object.to_string()))?
        .to_string();

    let mut report = UnlockReport::default();
    for attr in Attr::PIVOTS {
        let plug = Plug::new(object, attr);
        match scene.attr_state(plug) {
            AttrState::Locked => {
                scene.set_locked(plug, false)?;
                debug!(object = %name, %attr, "unlocked");
                report.unlocked.push(attr);
            }
            AttrState::Writable => report.already_unlocked.push(attr),
            AttrState::Absent => report.absent.push(attr),
        }
    }
    info!(object = %name, unlocked = report.unlocked.len(), "pivot attributes unlocked");
    Ok(report)
}
