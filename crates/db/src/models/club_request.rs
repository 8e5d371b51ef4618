//! Club-establishment request rows.

use clubflow_core::error::CoreError;
use clubflow_core::types::{DbId, Timestamp};
use clubflow_core::workflow::{DefenseOutcome, RequestState};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `club_requests` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ClubRequest {
    pub id: DbId,
    pub creator_id: DbId,
    pub reviewer_id: Option<DbId>,
    pub state: String,
    pub club_name: String,
    pub club_code: String,
    pub rejection_reason: Option<String>,
    pub defense_outcome: Option<String>,
    pub defense_feedback: Option<String>,
    pub deadline_at: Option<Timestamp>,
    /// Incremented on every committed mutation; the optimistic-lock token.
    pub lock_version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ClubRequest {
    /// Parsed workflow state.
    pub fn workflow_state(&self) -> Result<RequestState, CoreError> {
        RequestState::from_str(&self.state).ok_or_else(|| {
            CoreError::Internal(format!(
                "club_request {} has unknown state '{}'",
                self.id, self.state
            ))
        })
    }

    /// Parsed defense outcome, if a defense has been completed.
    pub fn outcome(&self) -> Result<Option<DefenseOutcome>, CoreError> {
        self.defense_outcome
            .as_deref()
            .map(|raw| {
                DefenseOutcome::from_str(raw).ok_or_else(|| {
                    CoreError::Internal(format!(
                        "club_request {} has unknown defense outcome '{raw}'",
                        self.id
                    ))
                })
            })
            .transpose()
    }
}

/// DTO for creating a new DRAFT request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClubRequest {
    pub creator_id: DbId,
    pub club_name: String,
    pub club_code: String,
}

/// Full set of workflow-owned columns written by a transition.
///
/// Every field is written as-is (including `None`), so the engine computes
/// the complete post-transition aggregate before persisting it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyTransition {
    pub state: RequestState,
    pub reviewer_id: Option<DbId>,
    pub club_name: String,
    pub club_code: String,
    pub rejection_reason: Option<String>,
    pub defense_outcome: Option<DefenseOutcome>,
    pub defense_feedback: Option<String>,
    pub deadline_at: Option<Timestamp>,
}
