//! Error types for Thermal Comfort

use thiserror::Error;

/// Errors surfaced to callers of the engine.
///
/// Bad or vanished readings are not errors; they are tracked as
/// [`Validity`](crate::types::Validity) and absorbed by the coordinator.
#[derive(Debug, Error)]
pub enum ComfortError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unresolvable source: {0}")]
    UnresolvableSource(String),

    #[error("Identifier conflict: {0}")]
    IdentifierConflict(String),

    #[error("Unknown index kind: {0}")]
    UnknownKind(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Group task failed: {0}")]
    TaskFailed(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
