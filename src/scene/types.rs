//! Core types for addressing nodes and attributes in a scene

use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Three-component vector used for positions, pivots and offsets
pub type Vec3 = DVec3;

/// Stable identity of a node inside a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Constraint node flavours known to the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Parent,
    Point,
    Orient,
}

impl ConstraintKind {
    /// Node type name as the host application spells it
    pub fn host_name(&self) -> &'static str {
        match self {
            Self::Parent => "parentConstraint",
            Self::Point => "pointConstraint",
            Self::Orient => "orientConstraint",
        }
    }

    /// Attribute holding the translation offset for the target at `index`.
    ///
    /// Point constraints share one offset across targets, parent constraints
    /// keep one per target slot. Orient constraints carry no translation offset.
    pub fn offset_attr(&self, index: usize) -> Option<Attr> {
        match self {
            Self::Parent => Some(Attr::TargetOffset(index)),
            Self::Point => Some(Attr::Offset),
            Self::Orient => None,
        }
    }
}

/// Kind of a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Plain transform (also used for empty groups)
    Transform,
    /// Transform with a locator shape
    Locator,
    /// Transform with a curve shape
    Curve,
    /// Constraint node
    Constraint(ConstraintKind),
    /// Component-wise `input1 * input2`
    Multiply,
    /// Component-wise `input1 + input2`
    Sum,
}

impl NodeKind {
    /// Whether nodes of this kind carry transform channels
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform | Self::Locator | Self::Curve)
    }

    /// Whether nodes of this kind compute an `output` from their inputs
    pub fn is_compute(&self) -> bool {
        matches!(self, Self::Multiply | Self::Sum)
    }
}

/// Typed attribute name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attr {
    Translate,
    Rotate,
    Scale,
    RotatePivot,
    ScalePivot,
    RotatePivotTranslate,
    ScalePivotTranslate,
    Visibility,
    OverrideEnabled,
    OverrideColor,
    OverrideDisplayType,
    /// Shared translation offset of a point constraint
    Offset,
    /// Per-target translation offset of a parent constraint
    TargetOffset(usize),
    Input1,
    Input2,
    Output,
}

impl Attr {
    /// The pivot channels of a transform
    pub const PIVOTS: [Attr; 4] = [
        Attr::RotatePivot,
        Attr::ScalePivot,
        Attr::RotatePivotTranslate,
        Attr::ScalePivotTranslate,
    ];
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Translate => "translate",
            Self::Rotate => "rotate",
            Self::Scale => "scale",
            Self::RotatePivot => "rotatePivot",
            Self::ScalePivot => "scalePivot",
            Self::RotatePivotTranslate => "rotatePivotTranslate",
            Self::ScalePivotTranslate => "scalePivotTranslate",
            Self::Visibility => "visibility",
            Self::OverrideEnabled => "overrideEnabled",
            Self::OverrideColor => "overrideColor",
            Self::OverrideDisplayType => "overrideDisplayType",
            Self::Offset => "offset",
            Self::TargetOffset(index) => return write!(f, "targetOffset[{}]", index),
            Self::Input1 => "input1",
            Self::Input2 => "input2",
            Self::Output => "output",
        };
        f.write_str(name)
    }
}

/// Error returned when an attribute name cannot be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown attribute '{0}'")]
pub struct ParseAttrError(pub String);

impl FromStr for Attr {
    type Err = ParseAttrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(index) = s
            .strip_prefix("targetOffset[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return index
                .parse()
                .map(Attr::TargetOffset)
                .map_err(|_| ParseAttrError(s.to_string()));
        }

        let attr = match s {
            "translate" => Self::Translate,
            "rotate" => Self::Rotate,
            "scale" => Self::Scale,
            "rotatePivot" => Self::RotatePivot,
            "scalePivot" => Self::ScalePivot,
            "rotatePivotTranslate" => Self::RotatePivotTranslate,
            "scalePivotTranslate" => Self::ScalePivotTranslate,
            "visibility" => Self::Visibility,
            "overrideEnabled" => Self::OverrideEnabled,
            "overrideColor" => Self::OverrideColor,
            "overrideDisplayType" => Self::OverrideDisplayType,
            "offset" => Self::Offset,
            "input1" => Self::Input1,
            "input2" => Self::Input2,
            "output" => Self::Output,
            _ => return Err(ParseAttrError(s.to_string())),
        };
        Ok(attr)
    }
}

impl Serialize for Attr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Attr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// A single attribute on a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Plug {
    pub node: NodeId,
    pub attr: Attr,
}

impl Plug {
    pub fn new(node: NodeId, attr: Attr) -> Self {
        Self { node, attr }
    }
}

impl fmt::Display for Plug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attr)
    }
}

/// Attribute value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Vector(Vec3),
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Short name of the value type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Vector(_) => "vector",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
        }
    }

    /// Whether `other` may be stored where `self` lives
    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Self::Vector(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// Capability of an attribute on a given node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrState {
    Absent,
    Writable,
    Locked,
}

/// The two pivots of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pivot {
    Rotate,
    Scale,
}

impl Pivot {
    /// Object-space pivot position attribute
    pub fn attr(&self) -> Attr {
        match self {
            Self::Rotate => Attr::RotatePivot,
            Self::Scale => Attr::ScalePivot,
        }
    }

    /// Compensating pivot-translate attribute
    pub fn translate_attr(&self) -> Attr {
        match self {
            Self::Rotate => Attr::RotatePivotTranslate,
            Self::Scale => Attr::ScalePivotTranslate,
        }
    }
}

/// Display mode used by `overrideDisplayType`: unselectable reference drawing
pub const DISPLAY_REFERENCE: i64 = 2;

/// A recorded animation key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f64,
    pub value: Value,
}
