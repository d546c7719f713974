use crate::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Precondition failed; nothing was applied or sent.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The gateway call failed and the optimistic change was rolled back.
    #[error("Could not {action}: {source}")]
    RemoteFailure {
        action: String,
        #[source]
        source: GatewayError,
    },

    /// The target is missing from the local copy, which is stale.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// Another change to the same field is still in flight.
    #[error("Busy: {0} is already being updated")]
    Busy(String),

    /// The view owning the engine was closed.
    #[error("View closed")]
    Closed,
}

impl SyncError {
    /// True when the error left an optimistic change rolled back.
    pub fn is_rollback(&self) -> bool {
        matches!(self, SyncError::RemoteFailure { .. })
    }
}
