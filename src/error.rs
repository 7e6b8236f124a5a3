//! Error types for the rig engine

use thiserror::Error;

use crate::scene::{Attr, SceneError};

/// Errors raised by rig operations
#[derive(Debug, Error)]
pub enum RigError {
    /// Object or marker missing from the scene
    #[error("{what} '{name}' not found")]
    NotFound { what: &'static str, name: String },

    /// Discovery found no parent or point constraint targeting the object
    #[error("no parent or point constraint targets '{object}'")]
    NoQualifyingConstraints { object: String },

    /// Operation refused before mutating anything
    #[error("cannot operate on '{object}': {reason}")]
    PreconditionFailed { object: String, reason: String },

    /// Some writes of a batch landed, others did not
    #[error(
        "only {succeeded} of {attempted} writes on '{object}' succeeded ({})",
        format_failures(failures)
    )]
    PartialWrite {
        object: String,
        succeeded: usize,
        attempted: usize,
        failures: Vec<(Attr, String)>,
    },

    /// Wiring refused because the source is reachable from the constraint
    #[error("wiring '{source_node}' into '{constraint}' would create a cycle")]
    CycleRejected {
        source_node: String,
        constraint: String,
    },

    /// Scene accessor failure
    #[error(transparent)]
    Scene(#[from] SceneError),
}

fn format_failures(failures: &[(Attr, String)]) -> String {
    failures
        .iter()
        .map(|(attr, reason)| format!("{}: {}", attr, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RigError {
    /// Create a not-found error for an object
    pub fn object_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            what: "object",
            name: name.into(),
        }
    }

    /// Create a not-found error for a marker
    pub fn marker_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            what: "marker",
            name: name.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error is surfaced as a warning rather than a failure
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::NoQualifyingConstraints { .. }
                | Self::PreconditionFailed { .. }
                | Self::PartialWrite { .. }
        )
    }
}
