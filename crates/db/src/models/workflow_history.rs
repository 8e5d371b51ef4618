//! Audit trail rows.

use clubflow_core::error::CoreError;
use clubflow_core::replay::HistoryStep;
use clubflow_core::types::{DbId, Timestamp};
use clubflow_core::workflow::{RequestState, Transition};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `workflow_history` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct WorkflowHistoryEntry {
    pub id: DbId,
    pub request_id: DbId,
    pub actor_id: DbId,
    pub transition: String,
    /// `None` only for the entry written by `create`.
    pub from_state: Option<String>,
    pub to_state: String,
    pub note: Option<String>,
    pub acted_at: Timestamp,
}

impl WorkflowHistoryEntry {
    /// Parse the entry into a replayable step.
    pub fn to_step(&self) -> Result<HistoryStep, CoreError> {
        let unknown = |what: &str, value: &str| {
            CoreError::Internal(format!(
                "workflow_history {} has unknown {what} '{value}'",
                self.id
            ))
        };

        let transition =
            Transition::from_str(&self.transition).ok_or_else(|| unknown("transition", &self.transition))?;
        let from_state = self
            .from_state
            .as_deref()
            .map(|s| RequestState::from_str(s).ok_or_else(|| unknown("from_state", s)))
            .transpose()?;
        let to_state =
            RequestState::from_str(&self.to_state).ok_or_else(|| unknown("to_state", &self.to_state))?;

        Ok(HistoryStep {
            transition,
            from_state,
            to_state,
        })
    }
}

/// DTO for appending an audit entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateHistoryEntry {
    pub request_id: DbId,
    pub actor_id: DbId,
    pub transition: Transition,
    pub from_state: Option<RequestState>,
    pub to_state: RequestState,
    pub note: Option<String>,
}
