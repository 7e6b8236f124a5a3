//! Compensation subgraph synthesis
//!
//! Constraint offsets are stored relative to the target's pivot, so moving
//! the pivot shifts every constrained result. Neutralizing an object wires
//!
//! ```text
//! object.scalePivot -> reverse (x -1) -> offset-sum (+ captured offset) -> constraint offset
//! ```
//!
//! for each constraint that targets it. One reverse node serves all of an
//! object's constraints; each (object, constraint) pair gets one offset-sum.
//! Node identity is tracked structurally in a [`CompensationRegistry`], never
//! derived from names.
//!
//! The reverse node negates the object-space scale pivot. A pivot move on an
//! object with its own rotation or non-unit scale (or under such a parent)
//! shifts the world pivot by a different vector, and the constrained result
//! drifts by that difference.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::error::RigError;
use crate::scene::{
    display_name, Attr, AttrState, ConstraintKind, NodeId, NodeKind, Plug, SceneGraph, Vec3,
};

use super::discovery::{find_constraints, ConstraintSlot};

/// Association of objects and constraints to their compensation nodes
#[derive(Debug, Clone, Default)]
pub struct CompensationRegistry {
    reverse: HashMap<NodeId, NodeId>,
    offset_sums: HashMap<(NodeId, NodeId), NodeId>,
}

/// Object whose scale pivot feeds a multiply node, if any
fn reverse_source(scene: &dyn SceneGraph, multiply: NodeId) -> Option<NodeId> {
    let source = scene.source_of(Plug::new(multiply, Attr::Input1))?;
    (source.attr == Attr::ScalePivot).then_some(source.node)
}

impl CompensationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct the registry from the wiring present in the scene
    pub fn rebuild(scene: &dyn SceneGraph) -> Self {
        let mut registry = Self::new();
        for multiply in scene.nodes_of_kind(NodeKind::Multiply) {
            if let Some(object) = reverse_source(scene, multiply) {
                registry.reverse.entry(object).or_insert(multiply);
            }
        }

        let owners: HashMap<NodeId, NodeId> = registry
            .reverse
            .iter()
            .map(|(&object, &reverse)| (reverse, object))
            .collect();
        for sum in scene.nodes_of_kind(NodeKind::Sum) {
            let Some(source) = scene.source_of(Plug::new(sum, Attr::Input1)) else {
                continue;
            };
            let Some(&object) = owners.get(&source.node) else {
                continue;
            };
            for destination in scene.destinations_of(Plug::new(sum, Attr::Output)) {
                if let Ok(NodeKind::Constraint(_)) = scene.kind(destination.node) {
                    registry
                        .offset_sums
                        .entry((object, destination.node))
                        .or_insert(sum);
                }
            }
        }
        debug!(
            reverse = registry.reverse.len(),
            offset_sums = registry.offset_sums.len(),
            "rebuilt compensation registry"
        );
        registry
    }

    /// Reverse node of `object`, if it still exists and still reads its pivot
    pub fn reverse_node(&self, scene: &dyn SceneGraph, object: NodeId) -> Option<NodeId> {
        self.reverse
            .get(&object)
            .copied()
            .filter(|&node| reverse_source(scene, node) == Some(object))
    }

    /// Offset-sum node of an (object, constraint) pair, if both still exist
    pub fn offset_sum(
        &self,
        scene: &dyn SceneGraph,
        object: NodeId,
        constraint: NodeId,
    ) -> Option<NodeId> {
        self.offset_sums
            .get(&(object, constraint))
            .copied()
            .filter(|&node| scene.exists(node) && scene.exists(constraint))
    }

    /// Forget entries whose nodes left the scene.
    ///
    /// An offset-sum node whose constraint was deleted and which no longer
    /// drives anything is deleted too. Returns the deleted nodes.
    pub fn prune(&mut self, scene: &mut dyn SceneGraph) -> Result<Vec<NodeId>, RigError> {
        let stale: Vec<((NodeId, NodeId), NodeId)> = self
            .offset_sums
            .iter()
            .filter(|(key, sum)| !scene.exists(key.1) || !scene.exists(**sum))
            .map(|(&key, &sum)| (key, sum))
            .collect();

        let mut deleted = Vec::new();
        for (key, sum) in stale {
            self.offset_sums.remove(&key);
            if scene.exists(sum) && scene.destinations_of(Plug::new(sum, Attr::Output)).is_empty() {
                scene.delete_node(sum)?;
                deleted.push(sum);
            }
        }
        self.reverse.retain(|_, reverse| scene.exists(*reverse));
        deleted.sort();
        if !deleted.is_empty() {
            debug!(count = deleted.len(), "deleted orphaned offset-sum nodes");
        }
        Ok(deleted)
    }

    /// All offset-sum nodes registered for `object`, keyed by constraint
    pub fn offset_sums_for(&self, object: NodeId) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<_> = self
            .offset_sums
            .iter()
            .filter(|((owner, _), _)| *owner == object)
            .map(|(&(_, constraint), &sum)| (constraint, sum))
            .collect();
        pairs.sort();
        pairs
    }

    pub fn reverse_count(&self) -> usize {
        self.reverse.len()
    }

    pub fn offset_sum_count(&self) -> usize {
        self.offset_sums.len()
    }
}

/// What happened to one constraint during neutralization
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintOutcome {
    /// Newly wired through an offset-sum node
    Compensated { offset_sum: NodeId, static_offset: Vec3 },
    /// Offset already driven by this object's offset-sum node
    AlreadyCompensated { offset_sum: NodeId },
    /// Left untouched
    Skipped { reason: String },
}

/// Result of neutralizing one object
#[derive(Debug, Clone, PartialEq)]
pub struct NeutralizeReport {
    pub object: NodeId,
    /// Reverse node serving the object, absent when nothing needed wiring
    pub reverse_node: Option<NodeId>,
    pub reverse_created: bool,
    pub constraints: Vec<(ConstraintSlot, ConstraintOutcome)>,
}

impl NeutralizeReport {
    /// Number of constraints wired by this call
    pub fn compensated(&self) -> usize {
        self.constraints
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ConstraintOutcome::Compensated { .. }))
            .count()
    }

    /// Number of constraints that were left untouched
    pub fn skipped(&self) -> usize {
        self.constraints
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ConstraintOutcome::Skipped { .. }))
            .count()
    }
}

/// Whether `to` is reachable from `from` along evaluation dependencies
pub fn reaches(scene: &dyn SceneGraph, from: NodeId, to: NodeId) -> bool {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        if node == to {
            return true;
        }
        if seen.insert(node) {
            queue.extend(scene.dependents(node));
        }
    }
    false
}

fn ensure_acyclic(scene: &dyn SceneGraph, source: NodeId, constraint: NodeId) -> Result<(), RigError> {
    if reaches(scene, constraint, source) {
        return Err(RigError::CycleRejected {
            source_node: display_name(scene, source),
            constraint: display_name(scene, constraint),
        });
    }
    Ok(())
}

/// Decide whether a slot needs wiring. `None` means it does.
fn guard(
    scene: &dyn SceneGraph,
    registry: &CompensationRegistry,
    object: NodeId,
    reverse: Option<NodeId>,
    slot: &ConstraintSlot,
) -> Option<ConstraintOutcome> {
    let plug = slot.offset_plug();
    match scene.attr_state(plug) {
        AttrState::Absent => {
            return Some(ConstraintOutcome::Skipped {
                reason: format!("'{}' has no '{}' attribute", display_name(scene, plug.node), plug.attr),
            })
        }
        AttrState::Locked => {
            return Some(ConstraintOutcome::Skipped {
                reason: format!("'{}.{}' is locked", display_name(scene, plug.node), plug.attr),
            })
        }
        AttrState::Writable => {}
    }

    if slot.kind == ConstraintKind::Point {
        let targets = scene
            .constraint_targets(slot.constraint)
            .map(|targets| targets.len())
            .unwrap_or(1);
        if targets > 1 {
            return Some(ConstraintOutcome::Skipped {
                reason: format!(
                    "point constraint averages {} targets into one shared offset",
                    targets
                ),
            });
        }
    }

    let source = scene.source_of(plug)?;
    let registered = registry.offset_sum(scene, object, slot.constraint);
    let fed_by_reverse = reverse.is_some()
        && scene
            .source_of(Plug::new(source.node, Attr::Input1))
            .map(|input| input.node)
            == reverse;
    if source.attr == Attr::Output && (registered == Some(source.node) || fed_by_reverse) {
        return Some(ConstraintOutcome::AlreadyCompensated {
            offset_sum: source.node,
        });
    }
    Some(ConstraintOutcome::Skipped {
        reason: format!(
            "offset already driven by '{}.{}'",
            display_name(scene, source.node),
            source.attr
        ),
    })
}

fn create_reverse(scene: &mut dyn SceneGraph, object: NodeId, name: &str) -> Result<NodeId, RigError> {
    let reverse = scene.create_node(NodeKind::Multiply, &format!("{}_multReversePivot", name))?;
    scene.set(Plug::new(reverse, Attr::Input2), Vec3::NEG_ONE.into())?;
    scene.connect(
        Plug::new(object, Attr::ScalePivot),
        Plug::new(reverse, Attr::Input1),
    )?;
    debug!(object = %name, reverse = %display_name(scene, reverse), "created reverse node");
    Ok(reverse)
}

fn compensate(
    scene: &mut dyn SceneGraph,
    registry: &mut CompensationRegistry,
    object: NodeId,
    reverse: NodeId,
    slot: &ConstraintSlot,
) -> Result<ConstraintOutcome, RigError> {
    let plug = slot.offset_plug();
    ensure_acyclic(scene, reverse, slot.constraint)?;

    // Captured before rewiring so it never includes a prior compensation.
    let static_offset = scene.get_vec3(plug)?;

    let offset_sum = match registry.offset_sum(scene, object, slot.constraint) {
        Some(existing) => existing,
        None => {
            let name = format!("{}_addOffset", display_name(scene, slot.constraint));
            scene.create_node(NodeKind::Sum, &name)?
        }
    };
    registry
        .offset_sums
        .insert((object, slot.constraint), offset_sum);

    ensure_acyclic(scene, offset_sum, slot.constraint)?;
    scene.connect(
        Plug::new(reverse, Attr::Output),
        Plug::new(offset_sum, Attr::Input1),
    )?;
    scene.set(Plug::new(offset_sum, Attr::Input2), static_offset.into())?;
    scene.connect(Plug::new(offset_sum, Attr::Output), plug)?;

    debug!(
        constraint = %display_name(scene, slot.constraint),
        offset_sum = %display_name(scene, offset_sum),
        ?static_offset,
        "compensated constraint"
    );
    Ok(ConstraintOutcome::Compensated {
        offset_sum,
        static_offset,
    })
}

/// Wire every parent or point constraint targeting `object` through a
/// pivot-compensating offset.
///
/// Fails with [`RigError::NoQualifyingConstraints`] and creates nothing when
/// no constraint targets the object. Constraints that are locked, driven by
/// something else or already compensated are reported and left alone, and so
/// are point constraints with several targets: their single offset follows
/// the mean of all target pivots. A failure while wiring one constraint is
/// logged and does not stop the others.
///
/// Compensation is exact for objects without rotation or scale of their own;
/// see the module documentation.
pub fn neutralize(
    scene: &mut dyn SceneGraph,
    registry: &mut CompensationRegistry,
    object: NodeId,
) -> Result<NeutralizeReport, RigError> {
    let name = scene
        .name(object)
        .map_err(|_| RigError::object_not_found(object.to_string()))?
        .to_string();

    registry.prune(scene)?;
    let slots = find_constraints(scene, object)?;
    if slots.is_empty() {
        warn!(object = %name, "no parent or point constraint targets this object");
        return Err(RigError::NoQualifyingConstraints { object: name });
    }

    if registry.reverse_node(scene, object).is_none() {
        *registry = CompensationRegistry::rebuild(scene);
    }
    let existing = registry.reverse_node(scene, object);

    let mut constraints = Vec::with_capacity(slots.len());
    let mut pending = Vec::new();
    for slot in slots {
        match guard(scene, registry, object, existing, &slot) {
            Some(outcome) => constraints.push((slot, outcome)),
            None => pending.push(slot),
        }
    }

    let mut report = NeutralizeReport {
        object,
        reverse_node: existing,
        reverse_created: false,
        constraints,
    };
    if pending.is_empty() {
        info!(object = %name, "nothing to compensate");
        return Ok(report);
    }

    let reverse = match existing {
        Some(reverse) => reverse,
        None => {
            let reverse = create_reverse(scene, object, &name)?;
            report.reverse_created = true;
            reverse
        }
    };
    registry.reverse.insert(object, reverse);
    report.reverse_node = Some(reverse);

    for slot in pending {
        let outcome = match compensate(scene, registry, object, reverse, &slot) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    object = %name,
                    constraint = %display_name(scene, slot.constraint),
                    error = %err,
                    "skipping constraint"
                );
                ConstraintOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
        };
        report.constraints.push((slot, outcome));
    }

    info!(
        object = %name,
        compensated = report.compensated(),
        skipped = report.skipped(),
        "neutralized pivot offsets"
    );
    Ok(report)
}
