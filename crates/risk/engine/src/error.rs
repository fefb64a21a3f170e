//! Error types for the risk engine.

use risk_storage::StorageError;
use risk_types::{RiskId, RiskStatus};
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The snapshot could not be loaded; the run was aborted before any write.
    #[error("snapshot unavailable: {0}")]
    Snapshot(#[source] StorageError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("risk not found: {0}")]
    NotFound(RiskId),

    #[error("invalid transition: risks cannot be moved to `{to}` manually")]
    InvalidTransition { to: RiskStatus },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert() {
        let err: EngineError = StorageError::Backend("boom".to_string()).into();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn invalid_transition_names_target() {
        let err = EngineError::InvalidTransition {
            to: RiskStatus::Open,
        };
        assert!(err.to_string().contains("`open`"));
    }
}
