//! Follow baking
//!
//! Keys one object so that it keeps the placement it had relative to another
//! object at the start frame. The relative matrix is measured once; every
//! frame of the range then places the follower at `leader(t) · relative` and
//! keys its translate, rotate and scale. A hold key one frame before the
//! range records the follower's pose before it starts following. The
//! timeline is left on the end frame.

use glam::DMat4;
use tracing::{debug, info};

use crate::error::RigError;
use crate::scene::{display_name, Attr, AttrState, NodeId, NodeKind, Plug, SceneGraph};

use super::retarget::key_attributes;

/// Attributes keyed on the follower for every frame
pub const FOLLOW_ATTRIBUTES: [Attr; 3] = [Attr::Translate, Attr::Rotate, Attr::Scale];

/// Result of a follow bake
#[derive(Debug, Clone, PartialEq)]
pub struct FollowReport {
    pub leader: NodeId,
    pub follower: NodeId,
    pub start: i64,
    pub end: i64,
    /// Frames keyed, the hold key included
    pub frames: usize,
}

fn check_follower(scene: &dyn SceneGraph, follower: NodeId, name: &str) -> Result<(), RigError> {
    for attr in FOLLOW_ATTRIBUTES {
        let plug = Plug::new(follower, attr);
        match scene.attr_state(plug) {
            AttrState::Writable => {}
            AttrState::Locked => {
                return Err(RigError::precondition(name, format!("'{}' is locked", attr)))
            }
            AttrState::Absent => {
                return Err(RigError::precondition(
                    name,
                    format!("has no '{}' attribute", attr),
                ))
            }
        }
        if let Some(source) = scene.source_of(plug) {
            let driver = format!("{}.{}", display_name(scene, source.node), source.attr);
            return Err(RigError::precondition(
                name,
                format!("'{}' is driven by '{}'", attr, driver),
            ));
        }
    }

    let constrained_by = scene.nodes().into_iter().find(|&node| {
        matches!(scene.kind(node), Ok(NodeKind::Constraint(_)))
            && scene.constrained_node(node).ok() == Some(follower)
    });
    if let Some(constraint) = constrained_by {
        return Err(RigError::precondition(
            name,
            format!("is driven by constraint '{}'", display_name(scene, constraint)),
        ));
    }
    Ok(())
}

/// Key `follower` over `start..=end` so it moves rigidly with `leader`.
///
/// Fails with [`RigError::PreconditionFailed`] before touching the scene when
/// the range is empty, the two objects are the same, or the follower's
/// transform channels are locked, connected or constrained. A frame whose
/// keys cannot all be written stops the bake with
/// [`RigError::PartialWrite`]; frames keyed before it stay.
pub fn bake_follow(
    scene: &mut dyn SceneGraph,
    leader: NodeId,
    follower: NodeId,
    start: i64,
    end: i64,
) -> Result<FollowReport, RigError> {
    let leader_name = scene
        .name(leader)
        .map_err(|_| RigError::object_not_found(leader.to_string()))?
        .to_string();
    let follower_name = scene
        .name(follower)
        .map_err(|_| RigError::object_not_found(follower.to_string()))?
        .to_string();

    if leader == follower {
        return Err(RigError::precondition(&follower_name, "cannot follow itself"));
    }
    if end < start {
        return Err(RigError::precondition(
            &follower_name,
            format!("end frame {} is before start frame {}", end, start),
        ));
    }
    check_follower(scene, follower, &follower_name)?;

    scene.set_current_time(start as f64);
    let leader_start = scene.world_matrix(leader)?;
    if leader_start.determinant().abs() < f64::EPSILON {
        return Err(RigError::precondition(&leader_name, "has a singular transform"));
    }
    let relative: DMat4 = leader_start.inverse() * scene.world_matrix(follower)?;

    let hold = key_attributes(scene, follower, &FOLLOW_ATTRIBUTES, (start - 1) as f64);
    hold.check(&follower_name)?;
    let mut frames = 1;

    for frame in start..=end {
        let time = frame as f64;
        scene.set_current_time(time);
        let placement = scene.world_matrix(leader)? * relative;
        scene.set_world_matrix(follower, placement)?;
        key_attributes(scene, follower, &FOLLOW_ATTRIBUTES, time).check(&follower_name)?;
        frames += 1;
        debug!(follower = %follower_name, frame, "keyed follow frame");
    }

    info!(
        leader = %leader_name,
        follower = %follower_name,
        start,
        end,
        "baked follow animation"
    );
    Ok(FollowReport {
        leader,
        follower,
        start,
        end,
        frames,
    })
}
