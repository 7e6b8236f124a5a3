//! Scene files for the command-line driver
//!
//! A scene file describes transforms, constraints, selection and time, then
//! lists the actions to run against it:
//!
//! ```toml
//! current_time = 12.0
//! selection = ["target"]
//!
//! [[transform]]
//! name = "target"
//! translate = [5.0, 0.0, 0.0]
//!
//! [[transform]]
//! name = "follower"
//!
//! [[constraint]]
//! kind = "point"
//! targets = ["target"]
//! constrained = "follower"
//! offsets = [[1.0, 0.0, 0.0]]
//!
//! [[action]]
//! op = "prepare"
//! object = "target"
//!
//! [[action]]
//! op = "retarget"
//! object = "target"
//! anchor = "pos_pivot1"
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::RigError;
use crate::rig::{AnchorRole, ConstraintOutcome};
use crate::scene::{
    display_name, Attr, ConstraintKind, MemoryScene, NodeId, NodeKind, Pivot, Plug, SceneError,
    SceneGraph, Vec3,
};
use crate::RigSession;

/// Errors that can occur when loading a scene file
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to read scene file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scene TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{context} refers to unknown node '{name}'")]
    UnknownNode { name: String, context: String },
    #[error("node '{0}' is declared twice")]
    DuplicateNode(String),
    #[error("constraint on '{constrained}' has {given} offsets for {slots} slots")]
    OffsetCount {
        constrained: String,
        given: usize,
        slots: usize,
    },
    #[error("scene setup failed: {0}")]
    Scene(#[from] SceneError),
}

impl ScriptError {
    fn unknown(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownNode {
            name: name.into(),
            context: context.into(),
        }
    }
}

/// A transform declared in a scene file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformSpec {
    pub name: String,
    pub parent: Option<String>,
    pub translate: Option<Vec3>,
    pub rotate: Option<Vec3>,
    pub scale: Option<Vec3>,
    pub rotate_pivot: Option<Vec3>,
    pub scale_pivot: Option<Vec3>,
    /// Attributes locked once the scene is built
    #[serde(default)]
    pub locked: Vec<Attr>,
}

/// A constraint declared in a scene file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintSpec {
    pub kind: ConstraintKind,
    pub targets: Vec<String>,
    pub constrained: String,
    #[serde(default)]
    pub maintain_offset: bool,
    /// Explicit offsets, one per offset slot
    #[serde(default)]
    pub offsets: Vec<Vec3>,
    #[serde(default)]
    pub lock_offsets: bool,
}

/// An animation key declared in a scene file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeySpec {
    pub node: String,
    pub attr: Attr,
    pub time: f64,
    pub value: Vec3,
}

/// One step of a scene file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Unlock { object: String },
    Neutralize { object: String },
    Markers { object: String },
    Gizmo { object: String },
    Prepare { object: String },
    Select { objects: Vec<String> },
    SetTime { time: f64 },
    /// Move both pivots without keying, as an artist would by hand
    MovePivot { object: String, position: Vec3 },
    Translate { node: String, value: Vec3 },
    Retarget { object: String, anchor: AnchorRole },
    /// Key `follower` to move with `leader` from `start` to `end`
    Follow {
        leader: String,
        follower: String,
        start: i64,
        end: i64,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlock { object } => write!(f, "unlock {}", object),
            Self::Neutralize { object } => write!(f, "neutralize {}", object),
            Self::Markers { object } => write!(f, "markers {}", object),
            Self::Gizmo { object } => write!(f, "gizmo {}", object),
            Self::Prepare { object } => write!(f, "prepare {}", object),
            Self::Select { objects } => write!(f, "select {}", objects.join(", ")),
            Self::SetTime { time } => write!(f, "set_time {}", time),
            Self::MovePivot { object, position } => {
                write!(f, "move_pivot {} {}", object, format_vec(*position))
            }
            Self::Translate { node, value } => {
                write!(f, "translate {} {}", node, format_vec(*value))
            }
            Self::Retarget { object, anchor } => write!(f, "retarget {} {}", object, anchor),
            Self::Follow {
                leader,
                follower,
                start,
                end,
            } => write!(f, "follow {} {} {}..{}", follower, leader, start, end),
        }
    }
}

/// A parsed scene file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptFile {
    #[serde(default)]
    pub current_time: f64,
    #[serde(default)]
    pub selection: Vec<String>,
    #[serde(default, rename = "transform")]
    pub transforms: Vec<TransformSpec>,
    #[serde(default, rename = "constraint")]
    pub constraints: Vec<ConstraintSpec>,
    #[serde(default, rename = "key")]
    pub keys: Vec<KeySpec>,
    #[serde(default, rename = "action")]
    pub actions: Vec<Action>,
}

fn lookup(scene: &MemoryScene, name: &str, context: &str) -> Result<NodeId, ScriptError> {
    scene
        .find(name)
        .ok_or_else(|| ScriptError::unknown(name, context))
}

impl ScriptFile {
    /// Load a scene file from disk
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a scene file from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ScriptError> {
        Ok(toml::from_str(content)?)
    }

    /// Build the declared scene.
    ///
    /// Hierarchy comes first so that channel values are read as local
    /// values, then keys, constraints and locks. The timeline is moved to
    /// `current_time` last, so keyed channels start at their animated value.
    pub fn build_scene(&self) -> Result<MemoryScene, ScriptError> {
        let mut scene = MemoryScene::new();

        for spec in &self.transforms {
            if scene.find(&spec.name).is_some() {
                return Err(ScriptError::DuplicateNode(spec.name.clone()));
            }
            scene.create_node(NodeKind::Transform, &spec.name)?;
        }

        for spec in &self.transforms {
            if let Some(parent) = &spec.parent {
                let child = lookup(&scene, &spec.name, "transform")?;
                let parent = lookup(&scene, parent, &format!("parent of '{}'", spec.name))?;
                scene.set_parent(child, Some(parent))?;
            }
        }

        for spec in &self.transforms {
            let node = lookup(&scene, &spec.name, "transform")?;
            let channels = [
                (Attr::Translate, spec.translate),
                (Attr::Rotate, spec.rotate),
                (Attr::Scale, spec.scale),
                (Attr::RotatePivot, spec.rotate_pivot),
                (Attr::ScalePivot, spec.scale_pivot),
            ];
            for (attr, value) in channels {
                if let Some(value) = value {
                    scene.set(Plug::new(node, attr), value.into())?;
                }
            }
        }

        for spec in &self.keys {
            let node = lookup(&scene, &spec.node, &format!("key at time {}", spec.time))?;
            let plug = Plug::new(node, spec.attr);
            scene.set(plug, spec.value.into())?;
            scene.set_keyframe(plug, spec.time)?;
        }

        for spec in &self.constraints {
            let context = format!("constraint on '{}'", spec.constrained);
            let constrained = lookup(&scene, &spec.constrained, &context)?;
            let targets = spec
                .targets
                .iter()
                .map(|name| lookup(&scene, name, &context))
                .collect::<Result<Vec<_>, _>>()?;
            let constraint =
                scene.create_constraint(spec.kind, &targets, constrained, spec.maintain_offset)?;

            let slots: Vec<Attr> = match spec.kind {
                ConstraintKind::Point => vec![Attr::Offset],
                ConstraintKind::Parent => (0..targets.len()).map(Attr::TargetOffset).collect(),
                ConstraintKind::Orient => vec![],
            };
            if !spec.offsets.is_empty() && spec.offsets.len() != slots.len() {
                return Err(ScriptError::OffsetCount {
                    constrained: spec.constrained.clone(),
                    given: spec.offsets.len(),
                    slots: slots.len(),
                });
            }
            for (&attr, &offset) in slots.iter().zip(&spec.offsets) {
                scene.set(Plug::new(constraint, attr), offset.into())?;
            }
            if spec.lock_offsets {
                for &attr in &slots {
                    scene.set_locked(Plug::new(constraint, attr), true)?;
                }
            }
        }

        for spec in &self.transforms {
            let node = lookup(&scene, &spec.name, "transform")?;
            for &attr in &spec.locked {
                scene.set_locked(Plug::new(node, attr), true)?;
            }
        }

        let selection = self
            .selection
            .iter()
            .map(|name| lookup(&scene, name, "selection"))
            .collect::<Result<Vec<_>, _>>()?;
        scene.select(&selection);
        scene.set_current_time(self.current_time);
        Ok(scene)
    }
}

/// Result of one action
#[derive(Debug)]
pub struct ActionOutcome {
    pub action: Action,
    pub result: Result<String, RigError>,
}

impl ActionOutcome {
    /// One-line rendering: `ok`, `warning` or `error`, then the message
    pub fn line(&self) -> String {
        match &self.result {
            Ok(message) => format!("ok       {}: {}", self.action, message),
            Err(err) if err.is_warning() => format!("warning  {}: {}", self.action, err),
            Err(err) => format!("error    {}: {}", self.action, err),
        }
    }
}

fn format_vec(v: Vec3) -> String {
    // Adding zero turns -0.0 into 0.0.
    let v = v + Vec3::ZERO;
    format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
}

fn resolve(scene: &MemoryScene, name: &str) -> Result<NodeId, RigError> {
    scene
        .find(name)
        .ok_or_else(|| RigError::object_not_found(name))
}

/// Run actions in order. A failing action does not stop the ones after it.
pub fn run_actions(
    scene: &mut MemoryScene,
    session: &mut RigSession,
    actions: &[Action],
) -> Vec<ActionOutcome> {
    actions
        .iter()
        .map(|action| ActionOutcome {
            action: action.clone(),
            result: run_action(scene, session, action),
        })
        .collect()
}

fn run_action(
    scene: &mut MemoryScene,
    session: &mut RigSession,
    action: &Action,
) -> Result<String, RigError> {
    match action {
        Action::Unlock { object } => {
            let node = resolve(scene, object)?;
            let report = session.unlock(scene, node)?;
            Ok(format!("{} pivot attribute(s) unlocked", report.unlocked.len()))
        }
        Action::Neutralize { object } => {
            let node = resolve(scene, object)?;
            let report = session.neutralize(scene, node)?;
            Ok(describe_neutralize(scene, &report))
        }
        Action::Markers { object } => {
            let node = resolve(scene, object)?;
            let report = session.get_or_create_markers(scene, node)?;
            Ok(format!("{} marker(s) created", report.created))
        }
        Action::Gizmo { object } => {
            let node = resolve(scene, object)?;
            let gizmo = session.gizmo(scene, node)?;
            Ok(format!("created {}", display_name(scene, gizmo.group)))
        }
        Action::Prepare { object } => {
            let node = resolve(scene, object)?;
            let report = session.prepare(scene, node)?;
            let mut parts = Vec::new();
            if let Some(neutralize) = &report.neutralize {
                parts.push(describe_neutralize(scene, neutralize));
            }
            parts.push(format!("{} marker(s) created", report.markers.created));
            if report.gizmo.is_some() {
                parts.push("gizmo built".to_string());
            }
            parts.extend(report.warnings.iter().map(|w| format!("warning: {}", w)));
            Ok(parts.join("; "))
        }
        Action::Select { objects } => {
            let nodes = objects
                .iter()
                .map(|name| resolve(scene, name))
                .collect::<Result<Vec<_>, _>>()?;
            scene.select(&nodes);
            Ok(format!("{} selected", nodes.len()))
        }
        Action::SetTime { time } => {
            scene.set_current_time(*time);
            Ok(format!("time is {}", time))
        }
        Action::MovePivot { object, position } => {
            let node = resolve(scene, object)?;
            scene.set_world_pivot(node, Pivot::Rotate, *position)?;
            scene.set_world_pivot(node, Pivot::Scale, *position)?;
            Ok(format!("pivots at {}", format_vec(*position)))
        }
        Action::Translate { node, value } => {
            let id = resolve(scene, node)?;
            scene.set(Plug::new(id, Attr::Translate), (*value).into())?;
            Ok(format!("translate {}", format_vec(*value)))
        }
        Action::Retarget { object, anchor } => {
            let node = resolve(scene, object)?;
            let report = session.retarget(scene, node, *anchor)?;
            report.keyframes.check(object)?;
            Ok(format!(
                "pivots at {}, {} keys at time {}",
                format_vec(report.position),
                report.keyframes.keyed.len(),
                report.keyframes.time
            ))
        }
        Action::Follow {
            leader,
            follower,
            start,
            end,
        } => {
            let leader = resolve(scene, leader)?;
            let follower = resolve(scene, follower)?;
            let report = session.follow(scene, leader, follower, *start, *end)?;
            Ok(format!("{} frame(s) keyed", report.frames))
        }
    }
}

fn describe_neutralize(scene: &dyn SceneGraph, report: &crate::rig::NeutralizeReport) -> String {
    let mut compensated = 0;
    let mut already = 0;
    let mut skipped = Vec::new();
    for (slot, outcome) in &report.constraints {
        match outcome {
            ConstraintOutcome::Compensated { .. } => compensated += 1,
            ConstraintOutcome::AlreadyCompensated { .. } => already += 1,
            ConstraintOutcome::Skipped { reason } => {
                skipped.push(format!("{} ({})", display_name(scene, slot.constraint), reason))
            }
        }
    }
    let mut text = format!(
        "{} compensated, {} already compensated",
        compensated, already
    );
    if !skipped.is_empty() {
        text.push_str(&format!(", skipped {}", skipped.join(", ")));
    }
    text
}

/// Closing summary: constrained positions, compensation nodes, tracked objects
pub fn summarize(scene: &MemoryScene, session: &RigSession) -> String {
    let mut lines = vec!["constrained positions:".to_string()];
    let mut constrained: Vec<NodeId> = Vec::new();
    for kind in [ConstraintKind::Parent, ConstraintKind::Point, ConstraintKind::Orient] {
        for constraint in scene.nodes_of_kind(NodeKind::Constraint(kind)) {
            if let Ok(node) = scene.constrained_node(constraint) {
                if !constrained.contains(&node) {
                    constrained.push(node);
                }
            }
        }
    }
    constrained.sort();
    for node in constrained {
        let position = match scene.world_position(node) {
            Ok(position) => format_vec(position),
            Err(err) => format!("<{}>", err),
        };
        lines.push(format!("  {:<24} {}", display_name(scene, node), position));
    }

    let rebuilt = crate::rig::CompensationRegistry::rebuild(scene);
    lines.push(format!(
        "compensation: {} reverse node(s), {} offset-sum node(s)",
        rebuilt.reverse_count(),
        rebuilt.offset_sum_count()
    ));

    let tracked: Vec<String> = session
        .tracked_objects(scene)
        .into_iter()
        .map(|node| display_name(scene, node))
        .collect();
    lines.push(format!("tracked objects: {}", tracked.join(", ")));
    lines.join("\n")
}
