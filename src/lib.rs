//! Pivot Rig - pivot offset neutralization and retargeting for rigged scenes
//!
//! Moving an object's pivot shifts every constraint that targets it, because
//! constraint offsets are stored relative to the pivot. This library wires
//! compensating offsets into those constraints, keeps a set of anchor markers
//! per object, and moves pivots onto those markers with a keyframe so the
//! animation stays continuous.
//!
//! # Example
//!
//! ```rust
//! use pivot_rig::scene::{ConstraintKind, MemoryScene, NodeKind, Pivot, SceneGraph, Vec3};
//! use pivot_rig::{RigConfig, RigSession};
//!
//! let mut scene = MemoryScene::new();
//! let target = scene.create_node(NodeKind::Transform, "target").unwrap();
//! let follower = scene.create_node(NodeKind::Transform, "follower").unwrap();
//! scene
//!     .create_constraint(ConstraintKind::Point, &[target], follower, true)
//!     .unwrap();
//!
//! let mut session = RigSession::new(RigConfig::default());
//! session.prepare(&mut scene, target).unwrap();
//!
//! let before = scene.world_position(follower).unwrap();
//! for pivot in [Pivot::Rotate, Pivot::Scale] {
//!     scene.set_world_pivot(target, pivot, Vec3::new(2.0, 0.0, 0.0)).unwrap();
//! }
//! let after = scene.world_position(follower).unwrap();
//! assert!((after - before).length() < 1e-9);
//! ```

pub mod config;
pub mod error;
pub mod rig;
pub mod scene;
pub mod script;

pub use config::{ConfigError, GizmoConfig, MarkerConfig, RigConfig};
pub use error::RigError;
pub use rig::{
    AnchorCache, AnchorRole, AnchorSet, CompensationRegistry, ConstraintOutcome, FollowReport,
    Gizmo, MarkerReport, NeutralizeReport, RetargetReport, UnlockReport,
};
pub use scene::{MemoryScene, SceneError, SceneGraph};

use tracing::{info, warn};

use scene::NodeId;

/// Everything that happened while preparing one object
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareReport {
    pub object: NodeId,
    /// Absent when unlocking is disabled
    pub unlock: Option<UnlockReport>,
    /// Absent when neutralizing was skipped with a warning
    pub neutralize: Option<NeutralizeReport>,
    pub markers: MarkerReport,
    /// Absent when disabled or when building it failed
    pub gizmo: Option<Gizmo>,
    pub warnings: Vec<String>,
}

/// Rig state carried across user actions
///
/// Holds the anchor cache and the compensation registry. Both can be lost at
/// any time and rebuilt from the scene with [`RigSession::attach`].
#[derive(Debug, Clone, Default)]
pub struct RigSession {
    pub config: RigConfig,
    anchors: AnchorCache,
    compensation: CompensationRegistry,
}

impl RigSession {
    /// Create a session with empty caches
    pub fn new(config: RigConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Create a session whose caches reflect an existing scene
    pub fn attach(scene: &dyn SceneGraph, config: RigConfig) -> Self {
        let mut session = Self::new(config);
        session.resync(scene);
        session
    }

    /// Rebuild both caches from the scene
    pub fn resync(&mut self, scene: &dyn SceneGraph) {
        self.anchors.rescan(scene);
        self.compensation = CompensationRegistry::rebuild(scene);
    }

    pub fn anchors(&self) -> &AnchorCache {
        &self.anchors
    }

    pub fn compensation(&self) -> &CompensationRegistry {
        &self.compensation
    }

    pub fn unlock(
        &mut self,
        scene: &mut dyn SceneGraph,
        object: NodeId,
    ) -> Result<UnlockReport, RigError> {
        rig::unlock_pivot_attributes(scene, object)
    }

    pub fn neutralize(
        &mut self,
        scene: &mut dyn SceneGraph,
        object: NodeId,
    ) -> Result<NeutralizeReport, RigError> {
        rig::neutralize(scene, &mut self.compensation, object)
    }

    pub fn get_or_create_markers(
        &mut self,
        scene: &mut dyn SceneGraph,
        object: NodeId,
    ) -> Result<MarkerReport, RigError> {
        self.anchors
            .get_or_create(scene, object, &self.config.markers)
    }

    pub fn gizmo(&mut self, scene: &mut dyn SceneGraph, object: NodeId) -> Result<Gizmo, RigError> {
        rig::create_gizmo(scene, object, &self.config.gizmo)
    }

    pub fn prepare(
        &mut self,
        scene: &mut dyn SceneGraph,
        object: NodeId,
    ) -> Result<PrepareReport, RigError> {
        prepare_object(scene, self, object)
    }

    /// Retarget onto the marker playing `role`
    pub fn retarget(
        &mut self,
        scene: &mut dyn SceneGraph,
        object: NodeId,
        role: AnchorRole,
    ) -> Result<RetargetReport, RigError> {
        let require_selection = self.config.require_selection;
        rig::retarget_to_role(scene, &mut self.anchors, object, role, require_selection)
    }

    /// Retarget onto a specific marker node
    pub fn retarget_to_marker(
        &mut self,
        scene: &mut dyn SceneGraph,
        object: NodeId,
        marker: NodeId,
    ) -> Result<RetargetReport, RigError> {
        let require_selection = self.config.require_selection;
        rig::retarget_pivot(scene, &mut self.anchors, object, marker, require_selection)
    }

    /// Key `follower` to move rigidly with `leader` over `start..=end`
    pub fn follow(
        &mut self,
        scene: &mut dyn SceneGraph,
        leader: NodeId,
        follower: NodeId,
        start: i64,
        end: i64,
    ) -> Result<FollowReport, RigError> {
        rig::bake_follow(scene, leader, follower, start, end)
    }

    /// Objects that own anchor markers, for display
    pub fn tracked_objects(&self, scene: &dyn SceneGraph) -> Vec<NodeId> {
        self.anchors.tracked_objects(scene)
    }
}

/// Prepare an object for pivot editing
///
/// Runs unlock (if configured), neutralize, marker creation and the gizmo in
/// that order. An object with no qualifying constraints still gets its
/// markers and gizmo; the neutralize warning is recorded in the report. A
/// failing gizmo is recorded as a warning too.
pub fn prepare_object(
    scene: &mut dyn SceneGraph,
    session: &mut RigSession,
    object: NodeId,
) -> Result<PrepareReport, RigError> {
    let name = scene
        .name(object)
        .map_err(|_| RigError::object_not_found(object.to_string()))?
        .to_string();
    let mut warnings = Vec::new();

    let unlock = if session.config.unlock_before_prepare {
        Some(session.unlock(scene, object)?)
    } else {
        None
    };

    let neutralize = match session.neutralize(scene, object) {
        Ok(report) => Some(report),
        Err(err) if err.is_warning() => {
            warnings.push(err.to_string());
            None
        }
        Err(err) => return Err(err),
    };

    let markers = session.get_or_create_markers(scene, object)?;

    let gizmo = if session.config.gizmo.enabled {
        match session.gizmo(scene, object) {
            Ok(gizmo) => Some(gizmo),
            Err(err) => {
                warn!(object = %name, error = %err, "gizmo not created");
                warnings.push(format!("gizmo: {}", err));
                None
            }
        }
    } else {
        None
    };

    info!(object = %name, warnings = warnings.len(), "prepared object");
    Ok(PrepareReport {
        object,
        unlock,
        neutralize,
        markers,
        gizmo,
        warnings,
    })
}
