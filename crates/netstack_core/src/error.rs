//! Error types for stack synthesis.

use thiserror::Error;

use crate::validator::ValidationReport;

/// Result type alias for stack operations.
pub type StackResult<T> = Result<T, StackError>;

/// Errors that can occur while building, validating or resolving a stack.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Construction failed for '{node}': {reason}")]
    Construction { node: String, reason: String },

    #[error("Duplicate resource name: {0}")]
    DuplicateNode(String),

    #[error("Resource '{node}' declares kind {declared} but carries {actual} attributes")]
    KindMismatch {
        node: String,
        declared: String,
        actual: String,
    },

    #[error("Validation failed with {} violation(s)", .0.len())]
    Validation(ValidationReport),

    #[error("Dependency cycle detected among: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Unknown dependency '{dependency}' referenced by '{node}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A builder could not produce a structurally valid node. Fatal.
    Construction,
    /// The finished graph breaks one or more invariants.
    Invariant,
    /// No valid creation order exists. Fatal.
    Cycle,
    /// Reading or writing a configuration document failed.
    Io,
}

impl StackError {
    pub(crate) fn construction(node: impl Into<String>, reason: impl Into<String>) -> Self {
        StackError::Construction {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StackError::InvalidConfig(_)
            | StackError::Construction { .. }
            | StackError::DuplicateNode(_)
            | StackError::KindMismatch { .. } => ErrorKind::Construction,
            StackError::Validation(_) => ErrorKind::Invariant,
            StackError::Cycle(_) | StackError::UnknownDependency { .. } => ErrorKind::Cycle,
            StackError::Io(_)
            | StackError::Yaml(_)
            | StackError::Json(_)
            | StackError::Toml(_) => ErrorKind::Io,
        }
    }

    /// Whether the error aborts synthesis outright.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Invariant)
    }
}
