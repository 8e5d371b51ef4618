use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The (state, transition) pair has no row in the transition table.
    #[error("Illegal transition: {transition} is not allowed from {state}")]
    IllegalTransition {
        state: String,
        transition: &'static str,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A concurrent commit invalidated the loaded request; reload and retry.
    #[error("Conflicting transition: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The club provisioner failed after the approval committed.
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the caller can safely retry after reloading current state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}
