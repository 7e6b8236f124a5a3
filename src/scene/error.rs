//! Error types for scene access

use thiserror::Error;

use super::types::{Attr, NodeId, NodeKind};

/// Errors reported by a scene accessor
#[derive(Debug, Error)]
pub enum SceneError {
    /// Node id no longer (or never) present in the scene
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// No node carries the requested name
    #[error("no node named '{0}'")]
    UnknownName(String),

    /// Attribute lookup on a node that does not have it
    #[error("node '{node}' has no attribute '{attr}'")]
    MissingAttribute { node: String, attr: Attr },

    /// Write or connection into a locked attribute
    #[error("attribute '{node}.{attr}' is locked")]
    LockedAttribute { node: String, attr: Attr },

    /// Direct write into an attribute driven by a connection or computed
    #[error("attribute '{node}.{attr}' is driven and cannot be set")]
    DrivenAttribute { node: String, attr: Attr },

    /// Value of the wrong type for the attribute
    #[error("attribute '{node}.{attr}' expects a {expected} value, got {found}")]
    TypeMismatch {
        node: String,
        attr: Attr,
        expected: &'static str,
        found: &'static str,
    },

    /// Constraint query on something that is not a constraint
    #[error("node '{0}' is not a constraint")]
    NotAConstraint(String),

    /// Node kind that cannot be created through the requested call
    #[error("cannot create a {0:?} node this way")]
    UnsupportedKind(NodeKind),

    /// Constraint request without any target
    #[error("constraint on '{0}' needs at least one target")]
    NoTargets(String),

    /// A value depends on itself
    #[error("evaluation cycle through '{0}'")]
    EvaluationCycle(String),

    /// Parenting request that would break the hierarchy
    #[error("cannot parent '{child}' under '{parent}': {reason}")]
    InvalidParent {
        child: String,
        parent: String,
        reason: String,
    },

    /// World transform that cannot be inverted
    #[error("world transform of '{0}' is singular")]
    SingularTransform(String),
}

impl SceneError {
    pub fn missing(node: impl Into<String>, attr: Attr) -> Self {
        Self::MissingAttribute {
            node: node.into(),
            attr,
        }
    }

    pub fn locked(node: impl Into<String>, attr: Attr) -> Self {
        Self::LockedAttribute {
            node: node.into(),
            attr,
        }
    }

    pub fn driven(node: impl Into<String>, attr: Attr) -> Self {
        Self::DrivenAttribute {
            node: node.into(),
            attr,
        }
    }

    pub fn invalid_parent(
        child: impl Into<String>,
        parent: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParent {
            child: child.into(),
            parent: parent.into(),
            reason: reason.into(),
        }
    }
}
