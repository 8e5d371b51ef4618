use clubflow_core::error::CoreError;

/// Error type returned by the engine and the store implementations.
///
/// Domain failures (illegal transition, forbidden, validation, conflict)
/// arrive as [`CoreError`]; raw storage failures keep their `sqlx` cause.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// Only lost races are worth retrying, after reloading the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Core(core) => core.is_retryable(),
            WorkflowError::Database(_) => false,
        }
    }

    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            WorkflowError::Core(core) => Some(core),
            WorkflowError::Database(_) => None,
        }
    }
}

/// Map a sqlx error from inside a transition commit.
///
/// Lock contention and serialization failures mean a concurrent transition
/// won the race, so they surface as [`CoreError::Conflict`].
pub(crate) fn classify_sqlx_error(err: sqlx::Error) -> WorkflowError {
    if clubflow_db::is_conflict_error(&err) || clubflow_db::is_unique_violation(&err) {
        tracing::debug!(error = %err, "Commit lost a race");
        return CoreError::Conflict(
            "request was modified by a concurrent transition; reload and retry".into(),
        )
        .into();
    }
    WorkflowError::Database(err)
}
