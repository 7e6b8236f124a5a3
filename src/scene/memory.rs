//! In-memory scene graph
//!
//! Nodes live in an id-ordered map, so iteration follows creation order.
//! Attribute values are stored statically and pulled on read: a connected
//! attribute evaluates its source, compute nodes derive `output` from their
//! inputs, and constraints override the translate or rotate channel of the
//! node they drive. Reads carry an evaluation stack so that a value which
//! depends on itself is reported instead of recursing forever.

use std::collections::{BTreeMap, BTreeSet};

use glam::{DMat4, DQuat};
use tracing::debug;

use super::error::SceneError;
use super::transform::{degrees_from_rotation, rotation_from_degrees, TransformChannels};
use super::types::*;
use super::SceneGraph;

const KEY_TIME_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    attrs: BTreeMap<Attr, Value>,
    locked: BTreeSet<Attr>,
    constraint: Option<ConstraintData>,
}

#[derive(Debug, Clone)]
struct ConstraintData {
    targets: Vec<NodeId>,
    constrained: NodeId,
    /// Rotation offset of orient constraints, captured at creation
    rotation_offset: DQuat,
}

/// Single-threaded scene held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u32,
    /// destination -> source
    connections: BTreeMap<Plug, Plug>,
    keys: BTreeMap<Plug, Vec<Keyframe>>,
    selection: Vec<NodeId>,
    time: f64,
}

type EvalStack = Vec<Plug>;

fn default_attrs(kind: NodeKind) -> BTreeMap<Attr, Value> {
    let mut attrs = BTreeMap::new();
    match kind {
        NodeKind::Transform | NodeKind::Locator | NodeKind::Curve => {
            attrs.insert(Attr::Translate, Value::Vector(Vec3::ZERO));
            attrs.insert(Attr::Rotate, Value::Vector(Vec3::ZERO));
            attrs.insert(Attr::Scale, Value::Vector(Vec3::ONE));
            for attr in Attr::PIVOTS {
                attrs.insert(attr, Value::Vector(Vec3::ZERO));
            }
            attrs.insert(Attr::Visibility, Value::Bool(true));
            attrs.insert(Attr::OverrideEnabled, Value::Bool(false));
            attrs.insert(Attr::OverrideColor, Value::Int(0));
            attrs.insert(Attr::OverrideDisplayType, Value::Int(0));
        }
        NodeKind::Constraint(_) => {}
        NodeKind::Multiply => {
            attrs.insert(Attr::Input1, Value::Vector(Vec3::ZERO));
            attrs.insert(Attr::Input2, Value::Vector(Vec3::ONE));
            attrs.insert(Attr::Output, Value::Vector(Vec3::ZERO));
        }
        NodeKind::Sum => {
            attrs.insert(Attr::Input1, Value::Vector(Vec3::ZERO));
            attrs.insert(Attr::Input2, Value::Vector(Vec3::ZERO));
            attrs.insert(Attr::Output, Value::Vector(Vec3::ZERO));
        }
    }
    attrs
}

/// Value of an animation curve at `time`.
///
/// Vector keys interpolate linearly, other values step. The curve holds its
/// first value before the first key and its last value after the last one.
fn sample(keys: &[Keyframe], time: f64) -> Option<Value> {
    let first = keys.first()?;
    if time <= first.time {
        return Some(first.value);
    }
    for pair in keys.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if time < to.time {
            return Some(match (from.value, to.value) {
                (Value::Vector(a), Value::Vector(b)) => {
                    let t = (time - from.time) / (to.time - from.time);
                    Value::Vector(a.lerp(b, t))
                }
                _ => from.value,
            });
        }
    }
    keys.last().map(|key| key.value)
}

fn rotation_of(matrix: DMat4) -> DQuat {
    let (_, rotation, _) = matrix.to_scale_rotation_translation();
    rotation
}

impl MemoryScene {
    /// Create an empty scene at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection. Unknown ids are dropped.
    pub fn select(&mut self, nodes: &[NodeId]) {
        self.selection = nodes
            .iter()
            .copied()
            .filter(|node| self.nodes.contains_key(node))
            .collect();
    }

    /// All keys recorded on a plug, ordered by time
    pub fn keyframes(&self, plug: Plug) -> &[Keyframe] {
        self.keys.get(&plug).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of nodes in the scene
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn transform_node(&self, id: NodeId) -> Result<&Node, SceneError> {
        let node = self.node(id)?;
        if node.kind.is_transform() {
            Ok(node)
        } else {
            Err(SceneError::missing(&node.name, Attr::Translate))
        }
    }

    fn unique_name(&self, base: &str) -> String {
        if self.find(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}{}", base, n))
            .find(|candidate| self.find(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    fn insert_node(&mut self, kind: NodeKind, name: &str, constraint: Option<ConstraintData>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let name = self.unique_name(name);
        debug!(node = %name, ?kind, "creating node");
        self.nodes.insert(
            id,
            Node {
                name,
                kind,
                parent: None,
                attrs: default_attrs(kind),
                locked: BTreeSet::new(),
                constraint,
            },
        );
        id
    }

    /// Write a stored value without lock or connection checks
    fn store(&mut self, plug: Plug, value: Value) -> Result<(), SceneError> {
        let node = self.node_mut(plug.node)?;
        node.attrs.insert(plug.attr, value);
        Ok(())
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut found = vec![root];
        let mut index = 0;
        while index < found.len() {
            let current = found[index];
            found.extend(self.children(current));
            index += 1;
        }
        found
    }

    fn driving_constraint(&self, node: NodeId, attr: Attr) -> Option<(NodeId, ConstraintKind)> {
        self.nodes.iter().find_map(|(&id, candidate)| {
            let data = candidate.constraint.as_ref()?;
            let NodeKind::Constraint(kind) = candidate.kind else {
                return None;
            };
            if data.constrained != node {
                return None;
            }
            let drives = match attr {
                Attr::Translate => matches!(kind, ConstraintKind::Parent | ConstraintKind::Point),
                Attr::Rotate => kind == ConstraintKind::Orient,
                _ => false,
            };
            drives.then_some((id, kind))
        })
    }

    fn evaluate(&self, plug: Plug, stack: &mut EvalStack) -> Result<Value, SceneError> {
        let node = self.node(plug.node)?;
        let stored = *node
            .attrs
            .get(&plug.attr)
            .ok_or_else(|| SceneError::missing(&node.name, plug.attr))?;

        if stack.contains(&plug) {
            return Err(SceneError::EvaluationCycle(format!("{}.{}", node.name, plug.attr)));
        }
        stack.push(plug);
        let result = self.evaluate_driven(node.kind, plug, stored, stack);
        stack.pop();
        result
    }

    fn evaluate_driven(
        &self,
        kind: NodeKind,
        plug: Plug,
        stored: Value,
        stack: &mut EvalStack,
    ) -> Result<Value, SceneError> {
        if let Some(source) = self.connections.get(&plug) {
            return self.evaluate(*source, stack);
        }

        match (kind, plug.attr) {
            (NodeKind::Multiply, Attr::Output) => {
                let a = self.evaluate_vec3(Plug::new(plug.node, Attr::Input1), stack)?;
                let b = self.evaluate_vec3(Plug::new(plug.node, Attr::Input2), stack)?;
                Ok(Value::Vector(a * b))
            }
            (NodeKind::Sum, Attr::Output) => {
                let a = self.evaluate_vec3(Plug::new(plug.node, Attr::Input1), stack)?;
                let b = self.evaluate_vec3(Plug::new(plug.node, Attr::Input2), stack)?;
                Ok(Value::Vector(a + b))
            }
            (kind, Attr::Translate) if kind.is_transform() => {
                match self.driving_constraint(plug.node, Attr::Translate) {
                    Some((constraint, kind)) => self
                        .translation_drive(constraint, kind, plug.node, stack)
                        .map(Value::Vector),
                    None => Ok(stored),
                }
            }
            (kind, Attr::Rotate) if kind.is_transform() => {
                match self.driving_constraint(plug.node, Attr::Rotate) {
                    Some((constraint, _)) => self
                        .rotation_drive(constraint, plug.node, stack)
                        .map(Value::Vector),
                    None => Ok(stored),
                }
            }
            _ => Ok(stored),
        }
    }

    fn evaluate_vec3(&self, plug: Plug, stack: &mut EvalStack) -> Result<Vec3, SceneError> {
        let value = self.evaluate(plug, stack)?;
        value.as_vec3().ok_or_else(|| SceneError::TypeMismatch {
            node: self.name(plug.node).unwrap_or_default().to_string(),
            attr: plug.attr,
            expected: "vector",
            found: value.type_name(),
        })
    }

    fn constraint_data(&self, constraint: NodeId) -> Result<&ConstraintData, SceneError> {
        let node = self.node(constraint)?;
        node.constraint
            .as_ref()
            .ok_or_else(|| SceneError::NotAConstraint(node.name.clone()))
    }

    /// Parent-space translate produced by a point or parent constraint
    fn translation_drive(
        &self,
        constraint: NodeId,
        kind: ConstraintKind,
        constrained: NodeId,
        stack: &mut EvalStack,
    ) -> Result<Vec3, SceneError> {
        let data = self.constraint_data(constraint)?;
        let mut sum = Vec3::ZERO;
        for (index, &target) in data.targets.iter().enumerate() {
            let pivot = self.world_pivot_inner(target, Pivot::Rotate, stack)?;
            let offset = match kind.offset_attr(index) {
                Some(attr) => self.evaluate_vec3(Plug::new(constraint, attr), stack)?,
                None => Vec3::ZERO,
            };
            sum += pivot + offset;
        }
        let world = sum / data.targets.len().max(1) as f64;
        let parent_world = self.parent_world_inner(constrained, stack)?;
        Ok(self.inverse(constrained, parent_world)?.transform_point3(world))
    }

    /// Local rotate produced by an orient constraint
    fn rotation_drive(
        &self,
        constraint: NodeId,
        constrained: NodeId,
        stack: &mut EvalStack,
    ) -> Result<Vec3, SceneError> {
        let data = self.constraint_data(constraint)?;
        let Some(&target) = data.targets.first() else {
            return Err(SceneError::NoTargets(self.name(constrained)?.to_string()));
        };
        let target_rotation = rotation_of(self.world_matrix_inner(target, stack)?);
        let parent_rotation = rotation_of(self.parent_world_inner(constrained, stack)?);
        Ok(degrees_from_rotation(
            parent_rotation.inverse() * target_rotation * data.rotation_offset,
        ))
    }

    fn channels_inner(
        &self,
        node: NodeId,
        stack: &mut EvalStack,
    ) -> Result<TransformChannels, SceneError> {
        self.transform_node(node)?;
        let mut read = |attr| self.evaluate_vec3(Plug::new(node, attr), stack);
        Ok(TransformChannels {
            translate: read(Attr::Translate)?,
            rotate: read(Attr::Rotate)?,
            scale: read(Attr::Scale)?,
            rotate_pivot: read(Attr::RotatePivot)?,
            scale_pivot: read(Attr::ScalePivot)?,
            rotate_pivot_translate: read(Attr::RotatePivotTranslate)?,
            scale_pivot_translate: read(Attr::ScalePivotTranslate)?,
        })
    }

    fn parent_world_inner(&self, node: NodeId, stack: &mut EvalStack) -> Result<DMat4, SceneError> {
        match self.node(node)?.parent {
            Some(parent) => self.world_matrix_inner(parent, stack),
            None => Ok(DMat4::IDENTITY),
        }
    }

    fn world_matrix_inner(&self, node: NodeId, stack: &mut EvalStack) -> Result<DMat4, SceneError> {
        let local = self.channels_inner(node, stack)?.local_matrix();
        Ok(self.parent_world_inner(node, stack)? * local)
    }

    fn world_pivot_inner(
        &self,
        node: NodeId,
        pivot: Pivot,
        stack: &mut EvalStack,
    ) -> Result<Vec3, SceneError> {
        let channels = self.channels_inner(node, stack)?;
        let world = self.parent_world_inner(node, stack)? * channels.local_matrix();
        Ok(world.transform_point3(channels.pivot(pivot)))
    }

    fn channels(&self, node: NodeId) -> Result<TransformChannels, SceneError> {
        self.channels_inner(node, &mut Vec::new())
    }

    fn parent_world(&self, node: NodeId) -> Result<DMat4, SceneError> {
        self.parent_world_inner(node, &mut Vec::new())
    }

    fn inverse(&self, node: NodeId, matrix: DMat4) -> Result<DMat4, SceneError> {
        if matrix.determinant().abs() < f64::EPSILON {
            return Err(SceneError::SingularTransform(self.name(node)?.to_string()));
        }
        Ok(matrix.inverse())
    }

    /// Channels of `node` with translate, rotate and scale chosen so that
    /// its local matrix becomes `local`
    fn channels_matching(&self, node: NodeId, local: DMat4) -> Result<TransformChannels, SceneError> {
        let (scale, rotation, translation) = local.to_scale_rotation_translation();
        let mut channels = self.channels(node)?;
        channels.rotate = degrees_from_rotation(rotation);
        channels.scale = scale;
        channels.translate = translation - channels.origin_offset();
        Ok(channels)
    }

    fn check_writable(&self, plug: Plug) -> Result<(), SceneError> {
        let node = self.node(plug.node)?;
        if !node.attrs.contains_key(&plug.attr) {
            return Err(SceneError::missing(&node.name, plug.attr));
        }
        if node.locked.contains(&plug.attr) {
            return Err(SceneError::locked(&node.name, plug.attr));
        }
        if self.connections.contains_key(&plug)
            || (node.kind.is_compute() && plug.attr == Attr::Output)
        {
            return Err(SceneError::driven(&node.name, plug.attr));
        }
        Ok(())
    }
}

impl SceneGraph for MemoryScene {
    fn exists(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn name(&self, node: NodeId) -> Result<&str, SceneError> {
        Ok(self.node(node)?.name.as_str())
    }

    fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(&id, _)| id)
    }

    fn kind(&self, node: NodeId) -> Result<NodeKind, SceneError> {
        Ok(self.node(node)?.kind)
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    fn constraint_targets(&self, constraint: NodeId) -> Result<Vec<NodeId>, SceneError> {
        Ok(self.constraint_data(constraint)?.targets.clone())
    }

    fn constrained_node(&self, constraint: NodeId) -> Result<NodeId, SceneError> {
        Ok(self.constraint_data(constraint)?.constrained)
    }

    fn attr_state(&self, plug: Plug) -> AttrState {
        match self.nodes.get(&plug.node) {
            Some(node) if node.locked.contains(&plug.attr) => AttrState::Locked,
            Some(node) if node.attrs.contains_key(&plug.attr) => AttrState::Writable,
            _ => AttrState::Absent,
        }
    }

    fn get(&self, plug: Plug) -> Result<Value, SceneError> {
        self.evaluate(plug, &mut Vec::new())
    }

    fn set(&mut self, plug: Plug, value: Value) -> Result<(), SceneError> {
        self.check_writable(plug)?;
        let node = self.node(plug.node)?;
        let current = node.attrs[&plug.attr];
        if !current.same_type(&value) {
            return Err(SceneError::TypeMismatch {
                node: node.name.clone(),
                attr: plug.attr,
                expected: current.type_name(),
                found: value.type_name(),
            });
        }
        self.store(plug, value)
    }

    fn set_locked(&mut self, plug: Plug, locked: bool) -> Result<(), SceneError> {
        let node = self.node_mut(plug.node)?;
        if !node.attrs.contains_key(&plug.attr) {
            return Err(SceneError::missing(&node.name, plug.attr));
        }
        if locked {
            node.locked.insert(plug.attr);
        } else {
            node.locked.remove(&plug.attr);
        }
        Ok(())
    }

    fn connect(&mut self, source: Plug, destination: Plug) -> Result<Option<Plug>, SceneError> {
        let source_node = self.node(source.node)?;
        let source_value = *source_node
            .attrs
            .get(&source.attr)
            .ok_or_else(|| SceneError::missing(&source_node.name, source.attr))?;

        let dest_node = self.node(destination.node)?;
        let dest_value = *dest_node
            .attrs
            .get(&destination.attr)
            .ok_or_else(|| SceneError::missing(&dest_node.name, destination.attr))?;
        if dest_node.locked.contains(&destination.attr) {
            return Err(SceneError::locked(&dest_node.name, destination.attr));
        }
        if dest_node.kind.is_compute() && destination.attr == Attr::Output {
            return Err(SceneError::driven(&dest_node.name, destination.attr));
        }
        if !source_value.same_type(&dest_value) {
            return Err(SceneError::TypeMismatch {
                node: dest_node.name.clone(),
                attr: destination.attr,
                expected: dest_value.type_name(),
                found: source_value.type_name(),
            });
        }

        debug!(%source, %destination, "connecting");
        Ok(self.connections.insert(destination, source))
    }

    fn source_of(&self, destination: Plug) -> Option<Plug> {
        self.connections.get(&destination).copied()
    }

    fn destinations_of(&self, source: Plug) -> Vec<Plug> {
        self.connections
            .iter()
            .filter(|(_, &src)| src == source)
            .map(|(&dest, _)| dest)
            .collect()
    }

    fn create_node(&mut self, kind: NodeKind, name: &str) -> Result<NodeId, SceneError> {
        if let NodeKind::Constraint(_) = kind {
            return Err(SceneError::UnsupportedKind(kind));
        }
        Ok(self.insert_node(kind, name, None))
    }

    fn delete_node(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.node(node)?;
        let mut doomed: BTreeSet<NodeId> = self.descendants(node).into_iter().collect();

        // Constraints go with the nodes they read from or drive.
        let constraints: Vec<NodeId> = self
            .nodes
            .iter()
            .filter_map(|(&id, candidate)| {
                let data = candidate.constraint.as_ref()?;
                let touches = doomed.contains(&data.constrained)
                    || data.targets.iter().any(|target| doomed.contains(target));
                touches.then_some(id)
            })
            .collect();
        doomed.extend(constraints);

        debug!(count = doomed.len(), "deleting nodes");
        self.nodes.retain(|id, _| !doomed.contains(id));
        self.connections
            .retain(|dest, src| !doomed.contains(&dest.node) && !doomed.contains(&src.node));
        self.keys.retain(|plug, _| !doomed.contains(&plug.node));
        self.selection.retain(|id| !doomed.contains(id));
        Ok(())
    }

    fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        let child_name = self.transform_node(child)?.name.clone();
        let parent_world = match parent {
            Some(parent) => {
                let parent_name = self.transform_node(parent)?.name.clone();
                let mut ancestor = Some(parent);
                while let Some(current) = ancestor {
                    if current == child {
                        return Err(SceneError::invalid_parent(
                            child_name,
                            parent_name,
                            "parent is the child or one of its descendants",
                        ));
                    }
                    ancestor = self.node(current)?.parent;
                }
                self.world_matrix(parent)?
            }
            None => DMat4::IDENTITY,
        };

        let world = self.world_matrix(child)?;
        let local = self.inverse(child, parent_world)? * world;
        let channels = self.channels_matching(child, local)?;

        self.store(Plug::new(child, Attr::Translate), channels.translate.into())?;
        self.store(Plug::new(child, Attr::Rotate), channels.rotate.into())?;
        self.store(Plug::new(child, Attr::Scale), channels.scale.into())?;
        self.node_mut(child)?.parent = parent;
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, candidate)| candidate.parent == Some(node))
            .map(|(&id, _)| id)
            .collect()
    }

    fn world_matrix(&self, node: NodeId) -> Result<DMat4, SceneError> {
        self.world_matrix_inner(node, &mut Vec::new())
    }

    fn set_world_position(&mut self, node: NodeId, position: Vec3) -> Result<(), SceneError> {
        let channels = self.channels(node)?;
        let parent_world = self.parent_world(node)?;
        let local_point = self.inverse(node, parent_world)?.transform_point3(position);
        let translate = local_point - channels.origin_offset();
        self.set(Plug::new(node, Attr::Translate), translate.into())
    }

    fn set_world_matrix(&mut self, node: NodeId, matrix: DMat4) -> Result<(), SceneError> {
        for attr in [Attr::Translate, Attr::Rotate, Attr::Scale] {
            self.check_writable(Plug::new(node, attr))?;
        }
        let parent_world = self.parent_world(node)?;
        let local = self.inverse(node, parent_world)? * matrix;
        let channels = self.channels_matching(node, local)?;

        self.set(Plug::new(node, Attr::Translate), channels.translate.into())?;
        self.set(Plug::new(node, Attr::Rotate), channels.rotate.into())?;
        self.set(Plug::new(node, Attr::Scale), channels.scale.into())
    }

    fn world_pivot(&self, node: NodeId, pivot: Pivot) -> Result<Vec3, SceneError> {
        self.world_pivot_inner(node, pivot, &mut Vec::new())
    }

    fn set_world_pivot(
        &mut self,
        node: NodeId,
        pivot: Pivot,
        position: Vec3,
    ) -> Result<(), SceneError> {
        self.check_writable(Plug::new(node, pivot.attr()))?;
        self.check_writable(Plug::new(node, pivot.translate_attr()))?;

        let world = self.world_matrix(node)?;
        let object_space = self.inverse(node, world)?.transform_point3(position);
        let moved = self.channels(node)?.with_pivot(pivot, object_space);
        let pivot_translate = match pivot {
            Pivot::Rotate => moved.rotate_pivot_translate,
            Pivot::Scale => moved.scale_pivot_translate,
        };

        self.set(Plug::new(node, pivot.attr()), object_space.into())?;
        self.set(Plug::new(node, pivot.translate_attr()), pivot_translate.into())
    }

    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        targets: &[NodeId],
        constrained: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError> {
        let constrained_name = self.transform_node(constrained)?.name.clone();
        if targets.is_empty() {
            return Err(SceneError::NoTargets(constrained_name));
        }
        for &target in targets {
            self.transform_node(target)?;
        }

        // Offsets are measured before the new constraint starts driving.
        let mut offsets = Vec::new();
        let mut rotation_offset = DQuat::IDENTITY;
        if maintain_offset {
            let parent_world = self.parent_world(constrained)?;
            match kind {
                ConstraintKind::Point | ConstraintKind::Parent => {
                    let translate = self.get_vec3(Plug::new(constrained, Attr::Translate))?;
                    let current = parent_world.transform_point3(translate);
                    let pivots = targets
                        .iter()
                        .map(|&target| self.world_pivot(target, Pivot::Rotate))
                        .collect::<Result<Vec<_>, _>>()?;
                    if kind == ConstraintKind::Point {
                        let mean = pivots.iter().copied().sum::<Vec3>() / pivots.len() as f64;
                        offsets.push(current - mean);
                    } else {
                        offsets.extend(pivots.iter().map(|pivot| current - *pivot));
                    }
                }
                ConstraintKind::Orient => {
                    let rotate = self.get_vec3(Plug::new(constrained, Attr::Rotate))?;
                    let target_rotation = rotation_of(self.world_matrix(targets[0])?);
                    let base = rotation_of(parent_world).inverse() * target_rotation;
                    rotation_offset = base.inverse() * rotation_from_degrees(rotate);
                }
            }
        }

        let name = format!("{}_{}1", constrained_name, kind.host_name());
        let id = self.insert_node(
            NodeKind::Constraint(kind),
            &name,
            Some(ConstraintData {
                targets: targets.to_vec(),
                constrained,
                rotation_offset,
            }),
        );

        let slots: Vec<Attr> = match kind {
            ConstraintKind::Point => vec![Attr::Offset],
            ConstraintKind::Parent => (0..targets.len()).map(Attr::TargetOffset).collect(),
            ConstraintKind::Orient => vec![],
        };
        for (index, attr) in slots.into_iter().enumerate() {
            let offset = offsets.get(index).copied().unwrap_or(Vec3::ZERO);
            self.store(Plug::new(id, attr), offset.into())?;
        }
        Ok(id)
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_current_time(&mut self, time: f64) {
        self.time = time;
        let animated: Vec<(Plug, Value)> = self
            .keys
            .iter()
            .filter_map(|(&plug, keys)| Some((plug, sample(keys, time)?)))
            .collect();
        for (plug, value) in animated {
            if let Some(node) = self.nodes.get_mut(&plug.node) {
                node.attrs.insert(plug.attr, value);
            }
        }
    }

    fn set_keyframe(&mut self, plug: Plug, time: f64) -> Result<(), SceneError> {
        let node = self.node(plug.node)?;
        if node.locked.contains(&plug.attr) {
            return Err(SceneError::locked(&node.name, plug.attr));
        }
        let value = self.get(plug)?;
        let keys = self.keys.entry(plug).or_default();
        keys.retain(|key| (key.time - time).abs() > KEY_TIME_EPSILON);
        keys.push(Keyframe { time, value });
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(())
    }

    fn keyframe_at(&self, plug: Plug, time: f64) -> Option<Value> {
        self.keyframes(plug)
            .iter()
            .find(|key| (key.time - time).abs() <= KEY_TIME_EPSILON)
            .map(|key| key.value)
    }

    fn selection(&self) -> Vec<NodeId> {
        self.selection.clone()
    }

    fn dependents(&self, node: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut push = |id: NodeId| {
            if !found.contains(&id) {
                found.push(id);
            }
        };

        for (dest, src) in &self.connections {
            if src.node == node {
                push(dest.node);
            }
        }
        for (&id, candidate) in &self.nodes {
            if candidate.parent == Some(node) {
                push(id);
            }
            if let Some(data) = &candidate.constraint {
                if id == node {
                    push(data.constrained);
                }
                if data.targets.contains(&node) {
                    push(id);
                }
            }
        }
        found
    }
}
