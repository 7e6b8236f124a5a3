//! Anchor marker cache
//!
//! Each prepared object owns three locators named `{Role}_{object}`. They are
//! parented under the object and serve as destinations for pivot retargeting.
//! The cache only remembers which nodes those are; the scene stays the source
//! of truth and the cache can be rebuilt from marker names at any time.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MarkerConfig;
use crate::error::RigError;
use crate::scene::{Attr, NodeId, NodeKind, Pivot, Plug, SceneGraph, Vec3};

/// Role of an anchor marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorRole {
    /// Hidden baseline at the original pivot
    Origin,
    PosPivot1,
    PosPivot2,
}

impl AnchorRole {
    pub const ALL: [AnchorRole; 3] = [Self::Origin, Self::PosPivot1, Self::PosPivot2];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Origin => "Origin",
            Self::PosPivot1 => "PosPivot1",
            Self::PosPivot2 => "PosPivot2",
        }
    }

    /// Scene name of this role's marker for an object
    pub fn marker_name(&self, object: &str) -> String {
        format!("{}_{}", self.label(), object)
    }
}

impl fmt::Display for AnchorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three markers of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSet {
    pub origin: NodeId,
    pub pos_pivot1: NodeId,
    pub pos_pivot2: NodeId,
}

impl AnchorSet {
    pub fn get(&self, role: AnchorRole) -> NodeId {
        match role {
            AnchorRole::Origin => self.origin,
            AnchorRole::PosPivot1 => self.pos_pivot1,
            AnchorRole::PosPivot2 => self.pos_pivot2,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnchorRole, NodeId)> + '_ {
        AnchorRole::ALL.into_iter().map(|role| (role, self.get(role)))
    }

    /// Role of `marker` within this set
    pub fn role_of(&self, marker: NodeId) -> Option<AnchorRole> {
        self.iter()
            .find(|&(_, node)| node == marker)
            .map(|(role, _)| role)
    }

    fn all_exist(&self, scene: &dyn SceneGraph) -> bool {
        self.iter().all(|(_, node)| scene.exists(node))
    }
}

/// Outcome of a marker request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerReport {
    pub anchors: AnchorSet,
    /// Markers created by this request
    pub created: usize,
}

/// Object to marker-set cache
#[derive(Debug, Clone, Default)]
pub struct AnchorCache {
    entries: HashMap<NodeId, AnchorSet>,
}

fn find_marker(scene: &dyn SceneGraph, object: &str, role: AnchorRole) -> Option<NodeId> {
    scene
        .find(&role.marker_name(object))
        .filter(|&node| scene.kind(node).is_ok_and(|kind| kind.is_transform()))
}

impl AnchorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and repopulate from marker names in the scene
    pub fn rescan(&mut self, scene: &dyn SceneGraph) {
        self.entries.clear();
        for object in self.tracked_objects(scene) {
            if let Some(anchors) = Self::scan(scene, object) {
                self.entries.insert(object, anchors);
            }
        }
        debug!(objects = self.entries.len(), "rescanned anchor markers");
    }

    fn scan(scene: &dyn SceneGraph, object: NodeId) -> Option<AnchorSet> {
        let name = scene.name(object).ok()?;
        Some(AnchorSet {
            origin: find_marker(scene, name, AnchorRole::Origin)?,
            pos_pivot1: find_marker(scene, name, AnchorRole::PosPivot1)?,
            pos_pivot2: find_marker(scene, name, AnchorRole::PosPivot2)?,
        })
    }

    /// Markers of `object`, from the cache or found in the scene by name
    pub fn lookup(&mut self, scene: &dyn SceneGraph, object: NodeId) -> Option<AnchorSet> {
        if let Some(anchors) = self.entries.get(&object) {
            if anchors.all_exist(scene) {
                return Some(*anchors);
            }
        }
        match Self::scan(scene, object) {
            Some(anchors) => {
                self.entries.insert(object, anchors);
                Some(anchors)
            }
            None => {
                self.entries.remove(&object);
                None
            }
        }
    }

    /// Return the markers of `object`, creating whichever are missing.
    ///
    /// A repeat request creates nothing and returns the same nodes.
    pub fn get_or_create(
        &mut self,
        scene: &mut dyn SceneGraph,
        object: NodeId,
        config: &MarkerConfig,
    ) -> Result<MarkerReport, RigError> {
        let name = scene
            .name(object)
            .map_err(|_| RigError::object_not_found(object.to_string()))?
            .to_string();
        if !scene.kind(object)?.is_transform() {
            return Err(RigError::precondition(&name, "only transforms carry markers"));
        }

        if let Some(anchors) = self.lookup(scene, object) {
            debug!(object = %name, "reusing markers");
            return Ok(MarkerReport {
                anchors,
                created: 0,
            });
        }

        let mut created = 0;
        let mut nodes = [NodeId(0); 3];
        for (slot, role) in nodes.iter_mut().zip(AnchorRole::ALL) {
            *slot = match find_marker(scene, &name, role) {
                Some(existing) => existing,
                None => {
                    created += 1;
                    create_marker(scene, object, &name, role, config)?
                }
            };
        }

        let anchors = AnchorSet {
            origin: nodes[0],
            pos_pivot1: nodes[1],
            pos_pivot2: nodes[2],
        };
        self.entries.insert(object, anchors);
        info!(object = %name, created, "markers ready");
        Ok(MarkerReport { anchors, created })
    }

    /// Transforms that own at least one marker, in scene order
    pub fn tracked_objects(&self, scene: &dyn SceneGraph) -> Vec<NodeId> {
        scene
            .nodes()
            .into_iter()
            .filter(|&node| {
                let Ok(kind) = scene.kind(node) else {
                    return false;
                };
                let Ok(name) = scene.name(node) else {
                    return false;
                };
                kind.is_transform()
                    && AnchorRole::ALL
                        .iter()
                        .any(|&role| find_marker(scene, name, role).is_some())
            })
            .collect()
    }
}

fn create_marker(
    scene: &mut dyn SceneGraph,
    object: NodeId,
    object_name: &str,
    role: AnchorRole,
    config: &MarkerConfig,
) -> Result<NodeId, RigError> {
    let marker = scene.create_node(NodeKind::Locator, &role.marker_name(object_name))?;
    scene.set_parent(marker, Some(object))?;

    // Snap in world space, then zero locally so the marker follows the object.
    let pivot = scene.world_pivot(object, Pivot::Rotate)?;
    scene.set_world_position(marker, pivot)?;
    scene.set(Plug::new(marker, Attr::Translate), Vec3::ZERO.into())?;
    scene.set(Plug::new(marker, Attr::Rotate), Vec3::ZERO.into())?;
    scene.set(Plug::new(marker, Attr::Scale), Vec3::ONE.into())?;

    match role {
        AnchorRole::Origin => {
            scene.set(Plug::new(marker, Attr::Visibility), (!config.hide_origin).into())?;
        }
        AnchorRole::PosPivot1 | AnchorRole::PosPivot2 => {
            let color = if role == AnchorRole::PosPivot1 {
                config.pos_pivot1_color
            } else {
                config.pos_pivot2_color
            };
            scene.set(Plug::new(marker, Attr::OverrideEnabled), true.into())?;
            scene.set(Plug::new(marker, Attr::OverrideColor), color.into())?;
        }
    }
    debug!(object = %object_name, %role, "created marker");
    Ok(marker)
}
