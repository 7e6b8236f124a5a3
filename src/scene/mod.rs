//! Scene graph access
//!
//! The rig engine never talks to a host application directly. Everything it
//! needs from the live scene goes through [`SceneGraph`]: node existence and
//! naming, typed attributes with lock state, dataflow connections, hierarchy,
//! world-space queries, constraints, keyframes and selection.
//! [`MemoryScene`] is a complete in-process implementation.

pub mod error;
pub mod memory;
pub mod transform;
pub mod types;

pub use error::SceneError;
pub use memory::MemoryScene;
pub use transform::TransformChannels;
pub use types::*;

use glam::DMat4;

/// Operations the rig engine consumes from a scene
pub trait SceneGraph {
    /// Whether the node is currently part of the scene
    fn exists(&self, node: NodeId) -> bool;

    /// Unique name of a node
    fn name(&self, node: NodeId) -> Result<&str, SceneError>;

    /// Look a node up by its unique name
    fn find(&self, name: &str) -> Option<NodeId>;

    fn kind(&self, node: NodeId) -> Result<NodeKind, SceneError>;

    /// All nodes in creation order
    fn nodes(&self) -> Vec<NodeId>;

    /// All nodes of one kind in creation order
    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes()
            .into_iter()
            .filter(|&node| self.kind(node).ok() == Some(kind))
            .collect()
    }

    /// Ordered target list of a constraint
    fn constraint_targets(&self, constraint: NodeId) -> Result<Vec<NodeId>, SceneError>;

    /// Node driven by a constraint
    fn constrained_node(&self, constraint: NodeId) -> Result<NodeId, SceneError>;

    /// Whether an attribute exists and can be written
    fn attr_state(&self, plug: Plug) -> AttrState;

    /// Evaluated value of an attribute, pulled through connections
    fn get(&self, plug: Plug) -> Result<Value, SceneError>;

    /// Evaluated vector value of an attribute
    fn get_vec3(&self, plug: Plug) -> Result<Vec3, SceneError> {
        let value = self.get(plug)?;
        value.as_vec3().ok_or_else(|| SceneError::TypeMismatch {
            node: self.name(plug.node).unwrap_or_default().to_string(),
            attr: plug.attr,
            expected: "vector",
            found: value.type_name(),
        })
    }

    /// Store a static value
    fn set(&mut self, plug: Plug, value: Value) -> Result<(), SceneError>;

    fn set_locked(&mut self, plug: Plug, locked: bool) -> Result<(), SceneError>;

    /// Drive `destination` from `source`, replacing any existing input.
    ///
    /// Returns the plug that previously drove `destination`, if any.
    fn connect(&mut self, source: Plug, destination: Plug) -> Result<Option<Plug>, SceneError>;

    /// Plug driving `destination`, if connected
    fn source_of(&self, destination: Plug) -> Option<Plug>;

    /// Plugs driven by `source`
    fn destinations_of(&self, source: Plug) -> Vec<Plug>;

    /// Create a node. The scene may alter `name` to keep names unique.
    fn create_node(&mut self, kind: NodeKind, name: &str) -> Result<NodeId, SceneError>;

    /// Delete a node together with its descendants
    fn delete_node(&mut self, node: NodeId) -> Result<(), SceneError>;

    /// Reparent a transform, keeping its world placement
    fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Object-to-world matrix of a transform
    fn world_matrix(&self, node: NodeId) -> Result<DMat4, SceneError>;

    /// World position of a transform's object-space origin
    fn world_position(&self, node: NodeId) -> Result<Vec3, SceneError> {
        Ok(self.world_matrix(node)?.transform_point3(Vec3::ZERO))
    }

    /// Move a transform so its origin lands on `position`
    fn set_world_position(&mut self, node: NodeId, position: Vec3) -> Result<(), SceneError>;

    /// Set translate, rotate and scale so the object-to-world matrix becomes
    /// `matrix`. Pivots are kept; shear is dropped.
    fn set_world_matrix(&mut self, node: NodeId, matrix: DMat4) -> Result<(), SceneError>;

    /// World position of one of the pivots
    fn world_pivot(&self, node: NodeId, pivot: Pivot) -> Result<Vec3, SceneError>;

    /// Move one pivot to a world position without moving the object
    fn set_world_pivot(
        &mut self,
        node: NodeId,
        pivot: Pivot,
        position: Vec3,
    ) -> Result<(), SceneError>;

    /// Create a constraint driving `constrained` from `targets`
    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        targets: &[NodeId],
        constrained: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError>;

    /// Current timeline position
    fn current_time(&self) -> f64;

    /// Move the timeline. Keyed attributes take their animated value.
    fn set_current_time(&mut self, time: f64);

    /// Record the attribute's current value as a key at `time`
    fn set_keyframe(&mut self, plug: Plug, time: f64) -> Result<(), SceneError>;

    /// Keyed value at exactly `time`, if a key exists there
    fn keyframe_at(&self, plug: Plug, time: f64) -> Option<Value>;

    /// Currently selected nodes, in selection order
    fn selection(&self) -> Vec<NodeId>;

    /// Nodes whose evaluation reads from `node`
    fn dependents(&self, node: NodeId) -> Vec<NodeId>;
}

/// Name of a node for messages, falling back to its id
pub fn display_name(scene: &dyn SceneGraph, node: NodeId) -> String {
    scene
        .name(node)
        .map(str::to_string)
        .unwrap_or_else(|_| node.to_string())
}
