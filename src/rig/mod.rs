//! Pivot offset neutralization and retargeting
//!
//! The stages, in the order an object is prepared:
//! 1. [`unlock`]: free locked pivot attributes
//! 2. [`discovery`] and [`compensation`]: wire pivot-compensating offsets
//! 3. [`anchors`]: create or reuse the object's anchor markers
//! 4. [`gizmo`]: visual feedback
//!
//! [`retarget`] runs later, as a separate action. [`follow`] bakes one
//! object onto another over a frame range and is independent of the rest.

pub mod anchors;
pub mod compensation;
pub mod discovery;
pub mod follow;
pub mod gizmo;
pub mod retarget;
pub mod unlock;

pub use anchors::{AnchorCache, AnchorRole, AnchorSet, MarkerReport};
pub use compensation::{
    neutralize, reaches, CompensationRegistry, ConstraintOutcome, NeutralizeReport,
};
pub use discovery::{find_constraints, ConstraintSlot};
pub use follow::{bake_follow, FollowReport, FOLLOW_ATTRIBUTES};
pub use gizmo::{create_gizmo, gizmo_name, is_gizmo_of, Gizmo};
pub use retarget::{
    key_attributes, retarget_pivot, retarget_to_role, KeyframeReport, RetargetReport,
    KEYED_ATTRIBUTES,
};
pub use unlock::{unlock_pivot_attributes, UnlockReport};
