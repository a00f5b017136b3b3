//! Error types for the engine module.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while handing a plan to an engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine rejected plan: {0}")]
    Rejected(String),

    #[error("Apply failed at '{node}': {reason}")]
    ApplyFailed { node: String, reason: String },

    #[error("Unsupported plan format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
