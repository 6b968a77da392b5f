// Typed errors with thiserror. Only the edges (config, wire payloads, target registry) can fail;
// the per-tick core degrades instead of erroring.

use thiserror::Error;

use crate::types::TargetId;

/// Engine error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sample payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown target {}", .0.as_u32())]
    UnknownTarget(TargetId),

    #[error("Target {} is already registered", .0.as_u32())]
    DuplicateTarget(TargetId),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
